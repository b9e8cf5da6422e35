//! Resource providers
//!
//! Resource type names follow the `package:module/kind` form of the cloud
//! resources the notes backend is made of.

pub mod local;

pub use local::LocalProvider;

use thiserror::Error;

pub const USER_POOL: &str = "aws:cognito/userPool";
pub const USER_POOL_CLIENT: &str = "aws:cognito/userPoolClient";
pub const GRAPHQL_API: &str = "aws:appsync/graphQLApi";
pub const TABLE: &str = "aws:dynamodb/table";
pub const ROLE: &str = "aws:iam/role";
pub const ROLE_POLICY: &str = "aws:iam/rolePolicy";
pub const DATA_SOURCE: &str = "aws:appsync/dataSource";
pub const RESOLVER: &str = "aws:appsync/resolver";

/// Every resource type the providers know about
pub const RESOURCE_TYPES: &[&str] = &[
    USER_POOL,
    USER_POOL_CLIENT,
    GRAPHQL_API,
    TABLE,
    ROLE,
    ROLE_POLICY,
    DATA_SOURCE,
    RESOLVER,
];

/// Reasons a provider rejects a resource definition
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("unsupported resource type '{0}'")]
    UnsupportedType(String),

    #[error("{resource}: missing required property '{property}'")]
    MissingProperty { resource: String, property: String },

    #[error("{resource}: property '{property}' is not valid JSON: {source}")]
    InvalidJson {
        resource: String,
        property: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{resource}: {message}")]
    Invalid { resource: String, message: String },

    #[error("{0} does not exist; it was removed outside of nuage")]
    NotFound(String),
}

/// Human-readable group name for a resource type
pub fn type_label(resource_type: &str) -> &str {
    match resource_type {
        USER_POOL => "User pools",
        USER_POOL_CLIENT => "User pool clients",
        GRAPHQL_API => "GraphQL APIs",
        TABLE => "Tables",
        ROLE => "IAM roles",
        ROLE_POLICY => "IAM role policies",
        DATA_SOURCE => "Data sources",
        RESOLVER => "Resolvers",
        other => other,
    }
}
