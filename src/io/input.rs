use std::path::Path;

use anyhow::{Context, Result};

use crate::models::RunSnapshot;

/// Load a run snapshot from a JSON file
pub async fn load_snapshot(path: &Path) -> Result<RunSnapshot> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_snapshot_json(&content).with_context(|| format!("Invalid run snapshot: {:?}", path))
}

/// Parse a run snapshot from a JSON string
pub fn parse_snapshot_json(json: &str) -> Result<RunSnapshot> {
    let snapshot: RunSnapshot =
        serde_json::from_str(json).context("Failed to parse run snapshot JSON")?;
    Ok(snapshot)
}
