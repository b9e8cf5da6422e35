//! Local provider - materializes resources as JSON documents
//!
//! Each resource becomes `<root>/<type>/<name>.json` holding its inputs and
//! outputs. Identifiers and ARNs are derived from a blake3 hash of the
//! resource type and logical name, so they are stable across runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use resource_graph::{ApplyContext, Properties, Provider, ResolvedResource, ResourceRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    DATA_SOURCE, GRAPHQL_API, ProviderError, RESOLVER, ROLE, ROLE_POLICY, TABLE, USER_POOL,
    USER_POOL_CLIENT,
};
use crate::config::NuageConfig;

/// A materialized resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub resource_type: String,
    pub inputs: Properties,
    pub outputs: Properties,
    pub updated_at: DateTime<Utc>,
}

/// Provider writing resources to a local directory
#[derive(Debug, Clone)]
pub struct LocalProvider {
    root: PathBuf,
    region: String,
    account_id: String,
    dynamo_endpoint: Option<String>,
}

impl LocalProvider {
    pub fn new(
        root: impl Into<PathBuf>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            region: region.into(),
            account_id: account_id.into(),
            dynamo_endpoint: None,
        }
    }

    /// Provider for a configured stack
    pub fn from_config(config: &NuageConfig, state_dir: &Path) -> Self {
        Self::new(
            config.resources_dir(state_dir),
            &config.region,
            &config.account_id,
        )
        .with_dynamo_endpoint(
            config
                .is_local()
                .then(|| config.local.dynamo_endpoint.clone())
                .flatten(),
        )
    }

    /// Point tables at a custom endpoint
    pub fn with_dynamo_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.dynamo_endpoint = endpoint;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self, resource_type: &str, name: &str) -> PathBuf {
        self.root
            .join(resource_type.replace([':', '/'], "_"))
            .join(format!("{name}.json"))
    }

    /// Read a materialized resource, if present
    pub fn read_document(&self, resource_type: &str, name: &str) -> Result<Option<Document>> {
        let path = self.document_path(resource_type, name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let doc = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(doc))
    }

    fn write_document(&self, resource: &ResolvedResource<'_>, outputs: &Properties) -> Result<()> {
        let path = self.document_path(resource.resource_type, resource.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let doc = Document {
            name: resource.name.to_string(),
            resource_type: resource.resource_type.to_string(),
            inputs: resource.inputs.clone(),
            outputs: outputs.clone(),
            updated_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&doc)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Outputs of a resource: its inputs plus identifiers
    fn outputs(&self, resource: &ResolvedResource<'_>, id: Option<String>) -> Properties {
        let mut outputs = resource.inputs.clone();
        let hash = hash_hex(resource.resource_type, resource.name);
        let name = resource.inputs.get("name").and_then(Value::as_str).unwrap_or(resource.name);
        let (region, account) = (&self.region, &self.account_id);

        let id = id.unwrap_or_else(|| match resource.resource_type {
            USER_POOL => format!("{region}_{}", &hash[..9]),
            USER_POOL_CLIENT | GRAPHQL_API => hash[..26].to_string(),
            TABLE | ROLE => name.to_string(),
            ROLE_POLICY => format!("{}:{name}", str_input(resource, "role")),
            DATA_SOURCE => format!("{}:{name}", str_input(resource, "api_id")),
            RESOLVER => format!(
                "{}:{}:{}",
                str_input(resource, "api_id"),
                str_input(resource, "type"),
                str_input(resource, "field")
            ),
            _ => hash[..16].to_string(),
        });

        let arn = match resource.resource_type {
            USER_POOL => Some(format!("arn:aws:cognito-idp:{region}:{account}:userpool/{id}")),
            GRAPHQL_API => Some(format!("arn:aws:appsync:{region}:{account}:apis/{id}")),
            TABLE => Some(format!("arn:aws:dynamodb:{region}:{account}:table/{name}")),
            ROLE => Some(format!("arn:aws:iam::{account}:role/{name}")),
            DATA_SOURCE => Some(format!(
                "arn:aws:appsync:{region}:{account}:apis/{}/datasources/{name}",
                str_input(resource, "api_id")
            )),
            RESOLVER => Some(format!(
                "arn:aws:appsync:{region}:{account}:apis/{}/types/{}/resolvers/{}",
                str_input(resource, "api_id"),
                str_input(resource, "type"),
                str_input(resource, "field")
            )),
            _ => None,
        };

        if resource.resource_type == GRAPHQL_API {
            outputs.insert(
                "uris".to_string(),
                json!({
                    "GRAPHQL": format!("https://{id}.appsync-api.{region}.amazonaws.com/graphql")
                }),
            );
        }
        if resource.resource_type == TABLE
            && let Some(endpoint) = &self.dynamo_endpoint
        {
            outputs.insert("endpoint".to_string(), json!(endpoint));
        }
        if let Some(arn) = arn {
            outputs.insert("arn".to_string(), json!(arn));
        }
        outputs.insert("id".to_string(), json!(id));
        outputs
    }
}

impl Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn replace_keys(&self, resource_type: &str) -> &[&str] {
        match resource_type {
            TABLE => &["name", "hash_key"],
            DATA_SOURCE => &["name"],
            RESOLVER => &["field", "type"],
            _ => &[],
        }
    }

    fn check(&self, resource: &ResolvedResource<'_>) -> Result<()> {
        for property in required_properties(resource.resource_type)? {
            let present = match resource.inputs.get(*property) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(ProviderError::MissingProperty {
                    resource: resource.name.to_string(),
                    property: (*property).to_string(),
                }
                .into());
            }
        }

        match resource.resource_type {
            ROLE => check_json(resource, "assume_role_policy")?,
            ROLE_POLICY => check_json(resource, "policy")?,
            TABLE => check_hash_key(resource)?,
            _ => {}
        }
        Ok(())
    }

    fn create(&self, ctx: &ApplyContext, resource: &ResolvedResource<'_>) -> Result<Properties> {
        let path = self.document_path(resource.resource_type, resource.name);
        if path.exists() {
            log::warn!("{} already exists, taking it over", resource.name);
        }

        let outputs = self.outputs(resource, None);
        self.write_document(resource, &outputs)?;

        if ctx.verbose {
            log::info!("Created {} at {}", resource.name, path.display());
        }
        Ok(outputs)
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        resource: &ResolvedResource<'_>,
        previous: &ResourceRecord,
    ) -> Result<Properties> {
        if self
            .read_document(&previous.resource_type, &previous.name)?
            .is_none()
        {
            return Err(ProviderError::NotFound(previous.name.clone()).into());
        }

        let id = previous
            .outputs
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let outputs = self.outputs(resource, id);
        self.write_document(resource, &outputs)?;

        if ctx.verbose {
            log::info!("Updated {}", resource.name);
        }
        Ok(outputs)
    }

    fn delete(&self, ctx: &ApplyContext, record: &ResourceRecord) -> Result<()> {
        let path = self.document_path(&record.resource_type, &record.name);
        if !path.exists() {
            log::warn!("{} is already gone", record.name);
            return Ok(());
        }

        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;

        if ctx.verbose {
            log::info!("Deleted {}", record.name);
        }
        Ok(())
    }
}

fn required_properties(resource_type: &str) -> Result<&'static [&'static str]> {
    let required: &'static [&'static str] = match resource_type {
        USER_POOL => &["name"],
        USER_POOL_CLIENT => &["name", "user_pool_id"],
        GRAPHQL_API => &["name", "authentication_type", "schema"],
        TABLE => &["name", "hash_key", "attributes", "billing_mode"],
        ROLE => &["name", "assume_role_policy"],
        ROLE_POLICY => &["role", "name", "policy"],
        DATA_SOURCE => &["api_id", "name", "type", "service_role_arn"],
        RESOLVER => &[
            "api_id",
            "data_source",
            "field",
            "type",
            "request_template",
            "response_template",
        ],
        other => return Err(ProviderError::UnsupportedType(other.to_string()).into()),
    };
    Ok(required)
}

fn check_json(resource: &ResolvedResource<'_>, property: &str) -> Result<()> {
    let text = str_input(resource, property);
    serde_json::from_str::<Value>(text).map_err(|source| ProviderError::InvalidJson {
        resource: resource.name.to_string(),
        property: property.to_string(),
        source,
    })?;
    Ok(())
}

/// The hash key must be one of the declared attributes
fn check_hash_key(resource: &ResolvedResource<'_>) -> Result<()> {
    let hash_key = str_input(resource, "hash_key");
    let declared = resource
        .inputs
        .get("attributes")
        .and_then(Value::as_array)
        .is_some_and(|attrs| {
            attrs
                .iter()
                .any(|a| a.get("name").and_then(Value::as_str) == Some(hash_key))
        });

    if !declared {
        return Err(ProviderError::Invalid {
            resource: resource.name.to_string(),
            message: format!("hash key '{hash_key}' is not a declared attribute"),
        }
        .into());
    }
    Ok(())
}

fn str_input<'a>(resource: &ResolvedResource<'a>, key: &str) -> &'a str {
    resource
        .inputs
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn hash_hex(resource_type: &str, name: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(resource_type.as_bytes());
    hasher.update(&[0]);
    hasher.update(name.as_bytes());
    hasher.finalize().to_hex().to_string()
}
