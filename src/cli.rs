//! CLI surface: argument parsing and val-URI handling.

use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Args, Parser, Subcommand};

use vt::api::Privacy;

/// Custom styles for help output
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

#[derive(Parser, Debug)]
#[command(
    name = "vt",
    version,
    about = "Sync a local directory with a Val Town val",
    styles = help_styles(),
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Run as if vt was started in this directory
    #[arg(short = 'C', long = "directory", global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Enable debug logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone a val into a local directory
    Clone {
        /// `username/valName` or a canonical web URL
        val_uri: String,
        /// Target directory (defaults to the val's name)
        dir: Option<PathBuf>,
        /// Branch to clone (defaults to main)
        branch: Option<String>,
        /// Show what would be written without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Update the working tree to the branch's latest version
    Pull {
        /// Discard local changes instead of refusing a dirty tree
        #[arg(short, long)]
        force: bool,
        /// Show what would change without changing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Upload local changes to the remote branch
    Push {
        /// Show what would be uploaded without uploading it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the working tree's status against the base version
    Status,

    /// List the val's branches
    Branch,

    /// Switch branches, or fork a new one with -b
    Checkout {
        /// Branch to switch to
        #[arg(required_unless_present = "new_branch", conflicts_with = "new_branch")]
        name: Option<String>,
        /// Fork a new branch off the current one
        #[arg(short = 'b', value_name = "NEW")]
        new_branch: Option<String>,
        /// Switch even when the working tree is dirty
        #[arg(short, long)]
        force: bool,
        /// Show what would change without changing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a new val from this directory
    Create {
        /// Name of the new val
        name: String,
        /// Target directory (defaults to the current directory)
        dir: Option<PathBuf>,
        #[command(flatten)]
        privacy: PrivacyArgs,
        /// Val description
        #[arg(long, value_name = "TEXT")]
        description: Option<String>,
        /// Upload files already present in the directory
        #[arg(long)]
        upload_existing: bool,
        /// Skip writing editor template files
        #[arg(long)]
        no_editor_files: bool,
    },

    /// Fork a val into a new one owned by you
    Remix {
        /// Source val (defaults to the current working tree's val)
        src_uri: Option<String>,
        /// Name for the new val (defaults to `<source>_remix_<n>`)
        new_name: Option<String>,
        /// Target directory (defaults to the new val's name)
        dir: Option<PathBuf>,
        #[command(flatten)]
        privacy: PrivacyArgs,
        /// Val description
        #[arg(long, value_name = "TEXT")]
        description: Option<String>,
    },

    /// Watch the directory and push on every change
    Watch {
        /// Also push every N seconds regardless of activity
        #[arg(long, value_name = "SECONDS")]
        interval: Option<u64>,
    },
}

/// `--public` / `--unlisted` / `--private`, mutually exclusive.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct PrivacyArgs {
    /// Anyone can see and run the val (default)
    #[arg(long, conflicts_with_all = ["unlisted", "private"])]
    pub public: bool,

    /// Reachable by link only
    #[arg(long, conflicts_with = "private")]
    pub unlisted: bool,

    /// Only you can see the val
    #[arg(long)]
    pub private: bool,
}

impl PrivacyArgs {
    pub fn privacy(self) -> Privacy {
        if self.private {
            Privacy::Private
        } else if self.unlisted {
            Privacy::Unlisted
        } else {
            Privacy::Public
        }
    }
}

/// Parse a val reference: `username/valName` or
/// `https://www.val.town/x/<user>/<name>`.
pub fn parse_val_uri(uri: &str) -> Result<(String, String), String> {
    let spec = if let Some(rest) = uri
        .strip_prefix("https://www.val.town/x/")
        .or_else(|| uri.strip_prefix("http://www.val.town/x/"))
        .or_else(|| uri.strip_prefix("https://val.town/x/"))
    {
        rest.trim_end_matches('/')
    } else if uri.contains("://") {
        return Err(format!("unrecognized val URL: {uri}"));
    } else {
        uri
    };

    match spec.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(format!(
            "expected username/valName or a val.town URL, got {uri:?}"
        )),
    }
}
