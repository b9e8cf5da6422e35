//! GraphQL schema file handling
//!
//! The schema text is passed to the API resource verbatim; the only thing
//! read out of it is the list of `@model` types.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static MODEL_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*type\s+([A-Za-z_][A-Za-z0-9_]*)[^{]*@model\b")
        .expect("model type pattern is valid")
});

/// A schema definition read from disk
#[derive(Debug, Clone)]
pub struct Schema {
    pub path: PathBuf,
    pub text: String,
}

impl Schema {
    /// Read a schema file, failing if it is missing
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read schema file: {}", path.display()))?;
        log::debug!("Read schema {} ({} bytes)", path.display(), text.len());
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    /// Names of the types annotated with `@model`, in declaration order
    pub fn model_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for caps in MODEL_TYPE.captures_iter(&self.text) {
            let name = caps[1].to_string();
            if !types.contains(&name) {
                types.push(name);
            }
        }
        types
    }

    /// Types to back with tables: the configured ones, or every `@model` type
    pub fn table_types(&self, configured: &[String]) -> Vec<String> {
        if configured.is_empty() {
            self.model_types()
        } else {
            configured.to_vec()
        }
    }
}
