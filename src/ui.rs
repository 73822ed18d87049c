//! Operator-facing output.
//!
//! Progress goes to stdout, problems to stderr. Styling comes from `console`,
//! which drops colors automatically when the stream is not a terminal.

use crate::boundary::BoundaryWarning;
use crate::domain::Version;
use console::style;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Print a skipped step in dim text.
pub fn display_skipped(message: &str) {
    println!("{} {}", style("-").dim(), style(message).dim());
}

/// Bold header marking the start of a pipeline stage.
pub fn display_stage(index: usize, total: usize, name: &str) {
    println!("\n{}", style(format!("[{}/{}] {}", index, total, name)).bold());
}

pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Show how the next version was derived.
///
/// * `last` - Previous release version, `None` when no tag existed
/// * `next` - The resolved version
/// * `bumped` - Whether `next` was computed rather than given explicitly
pub fn display_resolution(last: Option<&Version>, next: &Version, bumped: bool) {
    match (last, bumped) {
        (Some(last), true) => {
            println!("  From: {}", style(last).red());
            println!("  To:   {}", style(next).green());
        }
        (None, true) => {
            println!("  Initial version: {}", style(next).green());
        }
        (_, false) => {
            println!("  Explicit version: {}", style(next).green());
        }
    }
}

pub fn display_artifacts(artifacts: &[String]) {
    for artifact in artifacts {
        println!("  {}", style(artifact).cyan());
    }
}
