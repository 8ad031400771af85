//! Terminal styling for user-facing output.
//!
//! Uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - Semantic style constants for domain-specific use
//!
//! ## stdout vs stderr principle
//!
//! - **stdout**: primary data output (status listings, branch tables)
//! - **stderr**: status messages (progress, success, errors, hints)
//!
//! This separation allows piping (`vt status | grep foo`) without status
//! messages interfering. Use `println!` for primary output, `eprintln!` for
//! status messages.

use anstyle::{AnsiColor, Color, Style};

// Re-exports from anstream (auto-detecting output)
pub use anstream::{eprint, eprintln, print, println, stderr, stdout};

// ============================================================================
// Semantic Style Constants
// ============================================================================

/// Error style (red) - use as `{ERROR}text{ERROR:#}`
pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Error bold style, for the subject inside an error message
pub const ERROR_BOLD: Style = Style::new()
    .fg_color(Some(Color::Ansi(AnsiColor::Red)))
    .bold();

/// Warning style (yellow) - use as `{WARNING}text{WARNING:#}`
pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Hint style (dimmed) - use as `{HINT}text{HINT:#}`
pub const HINT: Style = Style::new().dimmed();

/// Addition style for status listings (green)
pub const ADDITION: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Deletion style for status listings (red)
pub const DELETION: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Modification style for status listings (yellow)
pub const MODIFICATION: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Rename style for status listings (cyan)
pub const RENAME: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

/// Current-branch marker style (magenta + bold)
pub const CURRENT: Style = Style::new()
    .bold()
    .fg_color(Some(Color::Ansi(AnsiColor::Magenta)));

/// Cyan style - use as `{CYAN}text{CYAN:#}`
pub const CYAN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

/// Green style - use as `{GREEN}text{GREEN:#}`
pub const GREEN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Green bold style - use as `{GREEN_BOLD}text{GREEN_BOLD:#}`
pub const GREEN_BOLD: Style = Style::new()
    .fg_color(Some(Color::Ansi(AnsiColor::Green)))
    .bold();

// ============================================================================
// Message Emojis
// ============================================================================

/// Success emoji - use with GREEN style: `eprintln!("{SUCCESS_EMOJI} {GREEN}message{GREEN:#}")`
pub const SUCCESS_EMOJI: &str = "✅";

/// Error emoji - use with ERROR style: `eprintln!("{ERROR_EMOJI} {ERROR}message{ERROR:#}")`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji - use with WARNING style: `eprintln!("{WARNING_EMOJI} {WARNING}message{WARNING:#}")`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji - use with HINT style: `eprintln!("{HINT_EMOJI} {HINT}message{HINT:#}")`
pub const HINT_EMOJI: &str = "💡";

// ============================================================================
// Message Formatting Functions
// ============================================================================

/// Format a success message with emoji and green styling.
pub fn success_message(content: impl AsRef<str>) -> String {
    format!("{SUCCESS_EMOJI} {GREEN}{}{GREEN:#}", content.as_ref())
}

/// Format an error message with emoji and red styling.
pub fn error_message(content: impl AsRef<str>) -> String {
    format!("{ERROR_EMOJI} {ERROR}{}{ERROR:#}", content.as_ref())
}

/// Format a warning message with emoji and yellow styling.
pub fn warning_message(content: impl AsRef<str>) -> String {
    format!("{WARNING_EMOJI} {WARNING}{}{WARNING:#}", content.as_ref())
}

/// Format a hint message with emoji and dim styling.
pub fn hint_message(content: impl AsRef<str>) -> String {
    format!("{HINT_EMOJI} {HINT}{}{HINT:#}", content.as_ref())
}
