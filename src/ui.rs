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

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{}/{}]", num, total).blue().bold(), msg);
}

/// Pad `text` to `width` columns, truncating with an ellipsis when longer.
pub fn fit(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len <= width {
        format!("{:<width$}", text, width = width)
    } else if width <= 1 {
        "…".repeat(width)
    } else {
        let kept: String = text.chars().take(width - 1).collect();
        format!("{}…", kept)
    }
}

/// Render an optional age in days for listings.
pub fn format_age(days: Option<i64>) -> String {
    match days {
        Some(0) => "today".to_string(),
        Some(1) => "1 day".to_string(),
        Some(d) => format!("{} days", d),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_pads_short_text() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("exact", 5), "exact");
    }

    #[test]
    fn test_fit_truncates_long_text() {
        assert_eq!(fit("qa-bot-20261017093000", 8), "qa-bot-…");
        assert_eq!(fit("long", 1), "…");
        assert_eq!(fit("long", 0), "");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Some(0)), "today");
        assert_eq!(format_age(Some(1)), "1 day");
        assert_eq!(format_age(Some(12)), "12 days");
        assert_eq!(format_age(None), "unknown");
    }
}
