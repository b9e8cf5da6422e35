//! Client exports file (`aws-exports.js`)
//!
//! A JavaScript module the web client imports to find the user pool and
//! the GraphQL endpoint of the deployed stack.

use anyhow::{Context, Result};
use resource_graph::Properties;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Render the exports module
///
/// Null values are left out.
pub fn render(values: &Properties) -> Result<String> {
    let kept: serde_json::Map<String, Value> = values
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let body = serde_json::to_string_pretty(&kept).context("Failed to serialize exports")?;

    Ok(format!(
        "// This file is generated by nuage. Changes will be overwritten.\n\n\
         const awsmobile = {body};\n\n\
         export default awsmobile;\n"
    ))
}

/// Write the exports module, creating parent directories
pub fn write(path: &Path, values: &Properties) -> Result<()> {
    let content = render(values)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("Wrote client exports to {}", path.display());
    Ok(())
}
