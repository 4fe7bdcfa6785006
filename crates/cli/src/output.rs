//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tuner_lib::units::format_size;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a byte count, "unlimited" for zero
pub fn format_limit(bytes: u64) -> String {
    if bytes == 0 {
        "unlimited".dimmed().to_string()
    } else {
        format_size(bytes)
    }
}

/// Format millicores as a CPU count
pub fn format_cpu(millicores: u64) -> String {
    if millicores == 0 {
        "unlimited".dimmed().to_string()
    } else if millicores % 1000 == 0 {
        format!("{}", millicores / 1000)
    } else {
        format!("{:.2}", millicores as f64 / 1000.0)
    }
}

/// Color a yes/no flag
pub fn color_flag(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".dimmed().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cpu() {
        colored::control::set_override(false);
        assert_eq!(format_cpu(4000), "4");
        assert_eq!(format_cpu(1500), "1.50");
        assert_eq!(format_cpu(0), "unlimited");
    }

    #[test]
    fn test_format_limit() {
        colored::control::set_override(false);
        assert_eq!(format_limit(2 * 1024 * 1024 * 1024), "2GB");
        assert_eq!(format_limit(0), "unlimited");
    }
}
