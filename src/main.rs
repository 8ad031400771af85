use std::path::PathBuf;
use std::process;

use clap::Parser;

use vt::VtError;
use vt::styling::{eprintln, error_message};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // FORCE_COLOR enables ANSI output even when stdout is not a TTY
    if std::env::var_os("FORCE_COLOR").is_some() {
        anstream::ColorChoice::Always.write_global();
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "off" }),
    )
    .init();

    // dunce avoids Windows verbatim paths (\\?\) that confuse display
    let cwd = cli.directory.clone().unwrap_or_else(|| PathBuf::from("."));
    let cwd = dunce::canonicalize(&cwd).unwrap_or(cwd);

    if let Err(err) = run(&cwd, cli) {
        // Engine errors carry their own styling; anything else gets the
        // standard error wrapper.
        match err.downcast_ref::<VtError>() {
            Some(e) => eprintln!("{e}"),
            None => eprintln!("{}", error_message(format!("{err:#}"))),
        }
        process::exit(1);
    }
}

fn run(cwd: &std::path::Path, cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Clone {
            val_uri,
            dir,
            branch,
            dry_run,
        } => commands::handle_clone(cwd, &val_uri, dir, branch, dry_run),

        Commands::Pull { force, dry_run } => commands::handle_pull(cwd, force, dry_run),

        Commands::Push { dry_run } => commands::handle_push(cwd, dry_run),

        Commands::Status => commands::handle_status(cwd),

        Commands::Branch => commands::handle_branch(cwd),

        Commands::Checkout {
            name,
            new_branch,
            force,
            dry_run,
        } => commands::handle_checkout(cwd, name, new_branch, force, dry_run),

        Commands::Create {
            name,
            dir,
            privacy,
            description,
            upload_existing,
            no_editor_files,
        } => commands::handle_create(
            cwd,
            name,
            dir,
            privacy.privacy(),
            description,
            upload_existing,
            no_editor_files,
        ),

        Commands::Remix {
            src_uri,
            new_name,
            dir,
            privacy,
            description,
        } => commands::handle_remix(cwd, src_uri, new_name, dir, privacy.privacy(), description),

        Commands::Watch { interval } => commands::handle_watch(cwd, interval),
    }
}
