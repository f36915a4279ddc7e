//! Table and JSON output for CLI commands.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use fcpmgr_core::error::AppError;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print rows as a table, or the JSON value as-is.
pub fn print_list<T, J>(rows: &[T], json: &J, format: OutputFormat) -> Result<(), AppError>
where
    T: Tabled,
    J: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table if rows.is_empty() => println!("No results found."),
        OutputFormat::Table => println!("{}", Table::new(rows).with(Style::sharp())),
        OutputFormat::Json => print_json(json)?,
    }
    Ok(())
}

/// Print key/value pairs, or the JSON value as-is.
pub fn print_item<J>(pairs: &[(&str, String)], json: &J, format: OutputFormat) -> Result<(), AppError>
where
    J: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => {
            for (key, value) in pairs {
                print_kv(key, value);
            }
        }
        OutputFormat::Json => print_json(json)?,
    }
    Ok(())
}

/// Pretty-printed JSON on stdout.
pub fn print_json<J: Serialize + ?Sized>(value: &J) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<26} {}", format!("{key}:"), value);
}

/// Ask before a destructive operation unless `force` is set.
pub fn confirm(prompt: &str, force: bool) -> Result<bool, AppError> {
    if force {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))?;
    if !confirmed {
        println!("Cancelled.");
    }
    Ok(confirmed)
}
