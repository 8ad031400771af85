mod common;

use std::collections::BTreeSet;

use common::{FakeRemote, clone_into_tempdir};
use vt::api::Remote;
use vt::item::{ItemType, ItemWarning};
use vt::ops;
use vt::status::{RENAME_DETECTION_THRESHOLD, Status};

fn push_tree(
    remote: &FakeRemote,
    tree: &mut common::ClonedTree,
    dry_run: bool,
) -> vt::status::ItemStatusManager {
    let root = tree.root().to_path_buf();
    ops::push(
        remote,
        &root,
        &mut tree.state,
        &tree.rules,
        RENAME_DETECTION_THRESHOLD,
        dry_run,
    )
    .unwrap()
}

#[test]
fn modify_and_push_round_trips() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) =
        remote.seed_val("alice", "project", &[("a.tsx", Some("// a")), ("dir/b", Some("b"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    tree.write("a.tsx", "// a2");
    let manager = push_tree(&remote, &mut tree, false);

    assert_eq!(manager.changes(), 1);
    assert_eq!(remote.content_at(&val_id, &branch_id, "a.tsx").as_deref(), Some("// a2"));

    // The base version advanced; a fresh status is clean
    let after = ops::status(
        &remote,
        tree.root(),
        &tree.state,
        &tree.rules,
        RENAME_DETECTION_THRESHOLD,
    )
    .unwrap();
    assert_eq!(after.changes(), 0);
}

#[test]
fn rename_keeps_the_remote_id() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) =
        remote.seed_val("alice", "project", &[("a.tsx", Some("// a")), ("dir/b", Some("b"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    let old_id = remote.item_at(&val_id, &branch_id, "dir/b").unwrap().id;

    tree.remove("dir/b");
    tree.write("dir/c", "b");

    let manager = push_tree(&remote, &mut tree, false);
    let entry = manager.get("dir/c").unwrap();
    assert!(matches!(
        &entry.status,
        Status::Renamed { old_path, similarity } if old_path == "dir/b" && *similarity == 1.0
    ));

    assert!(remote.item_at(&val_id, &branch_id, "dir/b").is_none());
    let new_item = remote.item_at(&val_id, &branch_id, "dir/c").unwrap();
    assert_eq!(new_item.id, old_id, "a rename preserves the item's identity");
}

#[test]
fn empty_directory_round_trips() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) = remote.seed_val("alice", "project", &[("a.tsx", Some("// a"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    tree.mkdir("dir2");
    push_tree(&remote, &mut tree, false);

    let item = remote.item_at(&val_id, &branch_id, "dir2").unwrap();
    assert_eq!(item.kind, ItemType::Directory);

    let after = ops::status(
        &remote,
        tree.root(),
        &tree.state,
        &tree.rules,
        RENAME_DETECTION_THRESHOLD,
    )
    .unwrap();
    assert_eq!(after.changes(), 0);
}

#[test]
fn binary_file_is_reported_but_not_uploaded() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) = remote.seed_val("alice", "project", &[("a.tsx", Some("// a"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    std::fs::write(tree.root().join("bin"), [0x00u8, 0x01]).unwrap();
    let manager = push_tree(&remote, &mut tree, false);

    let entry = manager.get("bin").unwrap();
    assert_eq!(entry.status, Status::Created);
    assert!(entry.warnings.contains(&ItemWarning::Binary));
    assert!(remote.item_at(&val_id, &branch_id, "bin").is_none());
}

#[test]
fn nested_creations_build_parents_first() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) = remote.seed_val("alice", "project", &[("a.tsx", Some("// a"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    tree.write("deep/nested/leaf.ts", "export {}");
    push_tree(&remote, &mut tree, false);

    // The fake rejects children of missing directories, so reaching here
    // means the ordering held
    let paths = remote.paths_at_latest(&val_id, &branch_id);
    assert!(paths.contains(&"deep".to_string()));
    assert!(paths.contains(&"deep/nested".to_string()));
    assert!(paths.contains(&"deep/nested/leaf.ts".to_string()));
}

#[test]
fn local_deletion_deletes_remotely() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) =
        remote.seed_val("alice", "project", &[("a.tsx", Some("// a")), ("dir/b", Some("b"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    tree.remove("a.tsx");
    push_tree(&remote, &mut tree, false);

    assert!(remote.item_at(&val_id, &branch_id, "a.tsx").is_none());
}

#[test]
fn dry_run_predicts_exactly_what_push_applies() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) =
        remote.seed_val("alice", "project", &[("a.tsx", Some("// a")), ("dir/b", Some("b"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    tree.write("a.tsx", "// a2");
    tree.write("new.ts", "export {}");
    tree.remove("dir/b");

    let predicted = push_tree(&remote, &mut tree, true);
    let predicted_changes: BTreeSet<(String, &'static str)> = predicted
        .entries(true)
        .into_iter()
        .filter(|e| e.status != Status::NotModified)
        .map(|e| (e.path.clone(), e.status.marker()))
        .collect();

    // The dry run touched neither side
    assert_eq!(remote.content_at(&val_id, &branch_id, "a.tsx").as_deref(), Some("// a"));

    let applied = push_tree(&remote, &mut tree, false);
    let applied_changes: BTreeSet<(String, &'static str)> = applied
        .entries(true)
        .into_iter()
        .filter(|e| e.status != Status::NotModified)
        .map(|e| (e.path.clone(), e.status.marker()))
        .collect();

    assert_eq!(predicted_changes, applied_changes);
    assert_eq!(remote.content_at(&val_id, &branch_id, "a.tsx").as_deref(), Some("// a2"));
    assert_eq!(remote.content_at(&val_id, &branch_id, "new.ts").as_deref(), Some("export {}"));
    assert!(remote.item_at(&val_id, &branch_id, "dir/b").is_none());
}

#[test]
fn per_item_failure_becomes_a_warning_not_an_abort() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) = remote.seed_val("alice", "project", &[("a.tsx", Some("// a"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    tree.write("good.ts", "fine");
    tree.write("doomed.ts", "never arrives");
    remote.fail_writes_on("doomed.ts");

    let manager = push_tree(&remote, &mut tree, false);

    // The healthy item landed
    assert_eq!(remote.content_at(&val_id, &branch_id, "good.ts").as_deref(), Some("fine"));
    // The failed item stayed in the collection with an unknown: warning
    assert!(remote.item_at(&val_id, &branch_id, "doomed.ts").is_none());
    let doomed = manager.get("doomed.ts").unwrap();
    assert!(
        doomed
            .warnings
            .iter()
            .any(|w| matches!(w, ItemWarning::Unknown(msg) if msg.contains("500"))),
        "expected an unknown: warning, got {:?}",
        doomed.warnings
    );
}

#[test]
fn push_with_no_changes_is_a_no_op() {
    let remote = FakeRemote::new();
    let (val_id, branch_id) = remote.seed_val("alice", "project", &[("a.tsx", Some("// a"))]);
    let mut tree = clone_into_tempdir(&remote, &val_id, &branch_id);

    let before = remote.latest_version(&val_id, &branch_id).unwrap();
    let manager = push_tree(&remote, &mut tree, false);

    assert_eq!(manager.changes(), 0);
    assert_eq!(remote.latest_version(&val_id, &branch_id).unwrap(), before);
}
