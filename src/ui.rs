use apmkit::{Error, Outcome, PackageStatus};
use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print an apm error followed by advice for its category
pub fn apm_error(err: &Error) {
    error(&err.to_string());
    dim(err.category().advice());
}

/// Print a reconciliation outcome
pub fn outcome(outcome: &Outcome, check_mode: bool) {
    if outcome.failed {
        error(&outcome.msg);
    } else if outcome.changed && check_mode {
        println!("{} {}", "~".yellow(), outcome.msg);
    } else if outcome.changed {
        success(&outcome.msg);
    } else {
        println!("{} {}", "=".dimmed(), outcome.msg);
    }
}

/// Format one package status as a single line
pub fn status_line(status: &PackageStatus) -> String {
    let state = match (status.installed, status.outdated) {
        (false, _) => "absent".red(),
        (true, true) => "outdated".yellow(),
        (true, false) => "current".green(),
    };
    format!("{:<32} {}", status.name, state)
}
