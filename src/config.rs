//! Stack configuration (`nuage.toml`)

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

/// Config file name looked up in the config dir and the current directory
pub const CONFIG_FILE: &str = "nuage.toml";

/// Deploy to a local stack when set to `true`
pub const ENV_LOCAL_AWS: &str = "NUAGE_LOCAL_AWS";

/// Custom endpoint for the table API of a local stack
pub const ENV_DYNAMO_ENDPOINT: &str = "NUAGE_DYNAMO_ENDPOINT";

/// GraphQL endpoint served by the local AppSync simulator
pub const LOCAL_GRAPHQL_ENDPOINT: &str = "http://localhost:62225/graphql";

// ============================================================================
// Config Schema
// ============================================================================

/// Configuration of one deployable API stack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NuageConfig {
    /// API name; prefixes every stack resource
    pub api_name: String,

    /// Stack name (e.g. "dev", "prod"); overridden by `--stack`
    pub stack: String,

    /// Region written into ARNs and the client exports
    pub region: String,

    /// Account written into ARNs
    pub account_id: String,

    /// GraphQL types backed by a table; empty means every `@model` type
    pub graphql_types: Vec<String>,

    /// API build output holding `schema.graphql` and `resolvers/`
    /// (default: `amplify/backend/api/<api_name>/build`)
    pub build_dir: Option<String>,

    /// Client exports file written after `up`
    pub exports_file: String,

    /// Directory the local provider materializes resources into
    /// (default: `<state dir>/<stack>-resources`)
    pub resources_dir: Option<String>,

    /// Local stack settings
    pub local: LocalConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    root: PathBuf,
}

/// Settings for deploying to local simulators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Deploy locally; also enabled by `NUAGE_LOCAL_AWS=true`
    pub enabled: bool,

    /// Table API endpoint; also set by `NUAGE_DYNAMO_ENDPOINT`
    pub dynamo_endpoint: Option<String>,

    /// GraphQL endpoint written to the client exports
    pub graphql_endpoint: Option<String>,
}

impl Default for NuageConfig {
    fn default() -> Self {
        Self {
            api_name: "notespulumi".to_string(),
            stack: "dev".to_string(),
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            graphql_types: Vec::new(),
            build_dir: None,
            exports_file: "src/aws-exports.js".to_string(),
            resources_dir: None,
            local: LocalConfig::default(),
            root: PathBuf::from("."),
        }
    }
}

impl NuageConfig {
    /// Load the stack config
    ///
    /// Lookup order:
    /// 1. `explicit` path (from `--config`)
    /// 2. `$NUAGE_CONFIG_DIR/nuage.toml`
    /// 3. `./nuage.toml`
    /// 4. Built-in defaults rooted at the current directory
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match find_config(explicit)? {
            Some(path) => Self::from_file(&path)?,
            None => {
                log::debug!("No {CONFIG_FILE} found, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; relative paths resolve against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;

        config.root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment flags
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(ENV_LOCAL_AWS).as_deref() == Some("true") {
            self.local.enabled = true;
        }
        if let Some(endpoint) = lookup(ENV_DYNAMO_ENDPOINT).filter(|e| !e.is_empty()) {
            self.local.dynamo_endpoint = Some(endpoint);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.api_name) {
            bail!(
                "Invalid api_name '{}': use letters, digits and '_'",
                self.api_name
            );
        }
        if !is_identifier(&self.stack) {
            bail!("Invalid stack '{}': use letters, digits and '_'", self.stack);
        }
        if self.region.trim().is_empty() {
            bail!("region must not be empty");
        }
        for name in &self.graphql_types {
            if !name.chars().all(|c| c.is_ascii_alphabetic()) || name.is_empty() {
                bail!("Invalid GraphQL type '{name}': use letters only");
            }
        }
        Ok(())
    }

    /// Select another stack
    pub fn with_stack(mut self, stack: Option<&str>) -> Result<Self> {
        if let Some(stack) = stack {
            self.stack = stack.to_string();
            self.validate()?;
        }
        Ok(self)
    }

    /// `<api_name>_<stack>`, the prefix of every resource
    pub fn stack_name(&self) -> String {
        format!("{}_{}", self.api_name, self.stack)
    }

    pub fn is_local(&self) -> bool {
        self.local.enabled
    }

    /// GraphQL endpoint of the local simulator
    pub fn local_graphql_endpoint(&self) -> &str {
        self.local
            .graphql_endpoint
            .as_deref()
            .unwrap_or(LOCAL_GRAPHQL_ENDPOINT)
    }

    pub fn build_dir(&self) -> PathBuf {
        match &self.build_dir {
            Some(dir) => self.resolve(dir),
            None => self
                .root
                .join("amplify")
                .join("backend")
                .join("api")
                .join(&self.api_name)
                .join("build"),
        }
    }

    pub fn schema_path(&self) -> PathBuf {
        self.build_dir().join("schema.graphql")
    }

    pub fn resolvers_dir(&self) -> PathBuf {
        self.build_dir().join("resolvers")
    }

    pub fn exports_path(&self) -> PathBuf {
        self.resolve(&self.exports_file)
    }

    /// Where the local provider keeps resource documents
    pub fn resources_dir(&self, state_dir: &Path) -> PathBuf {
        match &self.resources_dir {
            Some(dir) => self.resolve(dir),
            None => state_dir.join(format!("{}-resources", self.stack)),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let expanded = paths::expand(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.root.join(expanded)
        }
    }
}

fn find_config(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Some(dir) = paths::config_dir_override() {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            bail!(
                "{} is set but {} does not exist",
                paths::ENV_CONFIG_DIR,
                path.display()
            );
        }
        return Ok(Some(path));
    }

    let local = PathBuf::from(CONFIG_FILE);
    Ok(local.exists().then_some(local))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Tests
// ============================================================================
