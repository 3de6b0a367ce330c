//! Console reporting: colored status lines and the aggregate status table.

use std::io::{self, Write};

use colored::Colorize;

use crate::state::{GroupStatus, StateDocument};

const RULE_WIDTH: usize = 60;

fn emit(line: &str) {
    writeln!(io::stdout(), "{line}").ok();
}

/// Prints a section banner.
pub fn banner(text: &str) {
    emit(&format!("{}", format!("=== {text} ===").bold()));
}

/// Prints a plain progress line.
pub fn progress(text: &str) {
    emit(text);
}

/// Prints a de-emphasised informational line.
pub fn note(text: &str) {
    emit(&format!("{}", text.dimmed()));
}

/// Prints a success line.
pub fn success(text: &str) {
    emit(&format!("{} {text}", "✓".green()));
}

/// Prints a warning line.
pub fn warn(text: &str) {
    emit(&format!("{} {text}", "!".yellow()));
}

/// Prints a failure line to stderr.
pub fn failure(text: &str) {
    writeln!(io::stderr(), "{} {text}", "✗".red()).ok();
}

/// Reprints the aggregate deployment status table from the document.
pub fn status_table(state: &StateDocument) {
    let rule = "=".repeat(RULE_WIDTH);
    emit(&rule);
    emit("DEPLOYMENT STATUS");
    emit(&rule);
    for (key, status) in state.deployment_status.entries() {
        let label = format!("{}: {}", key.describe(), status.as_str().to_uppercase());
        let line = match status {
            GroupStatus::Completed => format!("{} {}", "✓".green(), label.green()),
            GroupStatus::Failed => format!("{} {}", "✗".red(), label.red()),
            GroupStatus::Deleted => format!("{} {}", "-".dimmed(), label.dimmed()),
            GroupStatus::Pending => format!("{} {}", "○".yellow(), label.yellow()),
        };
        emit(&line);
    }
    emit(&rule);
}
