//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{HnswkitArgs, OutputFormat};
use crate::data::SearchPayload;
use crate::error::Result;

/// Result structure for an insert.
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertResult {
    pub word: String,
    pub label: u32,
    pub elements: usize,
    pub saved_to: String,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &HnswkitArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output a search payload, listing hits in human mode.
pub fn output_search(payload: &SearchPayload, args: &HnswkitArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => output_json(payload, args),
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!(
                    "Search Results ({} hits, {:?}):",
                    payload.size, payload.search_type
                );
                println!("═══════════════");
            }
            for (rank, detail) in payload.details.iter().enumerate() {
                println!(
                    "{:>3}. {:<24} {:>12.6}  (label {})",
                    rank + 1,
                    detail.label,
                    detail.distance,
                    detail.index
                );
            }
            Ok(())
        }
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &HnswkitArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    output_value(&value, 0);
    Ok(())
}

fn output_value(value: &serde_json::Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                if val.is_object() {
                    println!("{indent}{key}:");
                    output_value(val, depth + 1);
                } else {
                    println!("{indent}{key}: {}", format_value(val));
                }
            }
        }
        _ => println!("{indent}{}", format_value(value)),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &HnswkitArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&serde_json::json!("a")), "a");
        assert_eq!(format_value(&serde_json::json!([1, 2])), "[1, 2]");
        assert_eq!(format_value(&serde_json::json!(null)), "null");
        assert_eq!(format_value(&serde_json::json!({"a": 1})), "[object]");
    }
}
