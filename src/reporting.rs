use chrono::format::{DelayedFormat, StrftimeItems};
use chrono::Local;
use std::path::Path;

/// Module tag shown in every console line.
const MODULE_TAG: &str = "md2anki";

/// Formats a console line with a timestamp, level and module prefix.
fn format_line(timestamp: &DelayedFormat<StrftimeItems<'_>>, level: &str, message: &str) -> String {
    format!("{} [{}] ({}): {}", timestamp, level, MODULE_TAG, message)
}

fn info(message: &str) {
    let now = Local::now();
    let timestamp = now.format("%Y-%m-%d %H:%M:%S");
    eprintln!("{}", format_line(&timestamp, "INFO", message));
}

/// Announces that a document is about to be processed.
pub fn report_processing(file_name: &str) {
    info(&format!("Processing {}...", file_name));
}

/// Prints the outcome of a run: where the log and package went and how many
/// cards were written.
///
/// `log_path` is `None` when no flat log was written (imports).
pub fn report_summary(log_path: Option<&Path>, package_path: &Path, total_cards: usize) {
    if let Some(log_path) = log_path {
        info(&format!("Flat log created: {}", log_path.display()));
    }
    info(&format!("Package created: {}", package_path.display()));
    info(&format!("Total cards: {}", total_cards));
}
