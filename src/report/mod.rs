//! Report rendering.
//!
//! Markdown reports for the trend and activity tasks, the plain-text issue
//! report, and JSON output for task results.

pub mod activity;
pub mod issues;
pub mod trend;

use anyhow::Result;
use serde::Serialize;

/// Pretty-printed JSON for any serializable result.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(value)?;
    Ok(json)
}
