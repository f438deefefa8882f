//! Output formatting for CLI commands.

use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// Raw JSON of the return value.
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        }
    }
}

/// Print rows in the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", format_json(data)),
    }
}

/// Print a single value in the specified format.
pub fn print_single<T: Serialize>(data: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => match serde_json::to_value(data) {
            Ok(serde_json::Value::String(s)) => println!("{s}"),
            _ => println!("{}", format_json(data)),
        },
        OutputFormat::Json => println!("{}", format_json(data)),
    }
}

/// Print a success message, or `true` as JSON.
pub fn print_done(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{} {}", "Success:".green().bold(), message),
        OutputFormat::Json => println!("true"),
    }
}

fn format_json<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "null".to_string())
}

/// One-column row for plain name listings.
#[derive(Debug, Clone, Serialize, Tabled)]
#[serde(transparent)]
pub struct NameRow {
    #[tabled(rename = "Name")]
    pub name: String,
}

impl NameRow {
    pub fn rows(names: Vec<String>) -> Vec<Self> {
        names.into_iter().map(|name| Self { name }).collect()
    }
}

pub fn display_option(opt: &Option<String>) -> String {
    opt.as_deref().unwrap_or("-").to_string()
}
