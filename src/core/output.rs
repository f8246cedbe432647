//! Compact output rendering helpers for CLI surfaces.

use crate::core::error::TeamError;
use serde::Serialize;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TeamError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Collapse whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// `"none"` for an absent value, the value otherwise.
pub fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("none")
}
