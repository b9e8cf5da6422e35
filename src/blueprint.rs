//! Notes backend declaration
//!
//! Declares the user directory, the GraphQL API and one table per GraphQL
//! type, with the IAM role, data source and resolvers that connect each
//! table to the API. Local stacks only get the user directory and the
//! tables; the local AppSync simulator is configured separately.

use anyhow::{Context, Result};
use rayon::prelude::*;
use resource_graph::{Properties, ResourceDecl, escape_literal};
use serde_json::{Value, json};

use crate::config::NuageConfig;
use crate::provider::{
    DATA_SOURCE, GRAPHQL_API, RESOLVER, ROLE, ROLE_POLICY, TABLE, USER_POOL, USER_POOL_CLIENT,
};
use crate::resolvers::{self, ResolverTemplate};
use crate::schema::Schema;

pub const USER_POOL_NAME: &str = "MyUserPool";
pub const USER_POOL_CLIENT_NAME: &str = "MyUserPoolClient";

const AUTH_TYPE: &str = "AMAZON_COGNITO_USER_POOLS";

/// Actions the data source role may perform on its table
const TABLE_ACTIONS: [&str; 8] = [
    "dynamodb:BatchGetItem",
    "dynamodb:BatchWriteItem",
    "dynamodb:PutItem",
    "dynamodb:DeleteItem",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:Query",
    "dynamodb:UpdateItem",
];

/// Everything one stack declares
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub resources: Vec<ResourceDecl>,
    /// Stack exports, may reference resource outputs
    pub exports: Properties,
    /// Values of the client exports file, may reference resource outputs
    pub client_config: Properties,
}

/// Declare the notes backend for `config`
///
/// Reads the schema and, for cloud stacks, the resolver templates from the
/// API build directory.
pub fn notes_backend(config: &NuageConfig) -> Result<Blueprint> {
    let schema = Schema::load(&config.schema_path())?;
    let types = schema.table_types(&config.graphql_types);
    if types.is_empty() {
        log::warn!(
            "No GraphQL types configured and no @model types in {}",
            schema.path.display()
        );
    }

    let templates: Vec<Vec<ResolverTemplate>> = if config.is_local() {
        vec![Vec::new(); types.len()]
    } else {
        let dir = config.resolvers_dir();
        types
            .par_iter()
            .map(|t| {
                resolvers::scan(&dir, t)
                    .with_context(|| format!("Failed to scan resolvers for {t}"))
            })
            .collect::<Result<_>>()?
    };

    Ok(declare(config, &schema, &types, &templates))
}

/// Build the declarations from already-loaded inputs
pub fn declare(
    config: &NuageConfig,
    schema: &Schema,
    types: &[String],
    templates: &[Vec<ResolverTemplate>],
) -> Blueprint {
    let stack = config.stack_name();
    let api = format!("{stack}_graphql_api");
    let local = config.is_local();

    let mut resources = vec![
        ResourceDecl::new(USER_POOL_NAME, USER_POOL).property("name", format!("{stack}_user_pool")),
        ResourceDecl::new(USER_POOL_CLIENT_NAME, USER_POOL_CLIENT)
            .property("name", format!("{stack}_user_pool_client"))
            .property("user_pool_id", reference(USER_POOL_NAME, "id")),
    ];

    if !local {
        resources.push(
            ResourceDecl::new(&api, GRAPHQL_API)
                .property("name", api.clone())
                .property("authentication_type", AUTH_TYPE)
                .property(
                    "user_pool_config",
                    json!({
                        "default_action": "ALLOW",
                        "user_pool_id": reference(USER_POOL_NAME, "id"),
                        "app_id_client_regex": reference(USER_POOL_CLIENT_NAME, "id"),
                        "aws_region": config.region,
                    }),
                )
                .property("schema", escape_literal(&schema.text)),
        );
    }

    for (i, type_name) in types.iter().enumerate() {
        let type_templates = templates.get(i).map_or(&[][..], Vec::as_slice);
        resources.extend(data_source(config, &api, type_name, type_templates));
    }

    let mut exports = Properties::new();
    if !local {
        exports.insert(
            "graphql_api_uri".to_string(),
            Value::String(reference(&api, "uris.GRAPHQL")),
        );
    }
    exports.insert(
        "user_pool_id".to_string(),
        Value::String(reference(USER_POOL_NAME, "id")),
    );
    exports.insert(
        "user_pool_client_id".to_string(),
        Value::String(reference(USER_POOL_CLIENT_NAME, "id")),
    );

    let endpoint = if local {
        config.local_graphql_endpoint().to_string()
    } else {
        reference(&api, "uris.GRAPHQL")
    };
    let mut client_config: Properties = [
        ("aws_project_region", json!(config.region)),
        ("aws_cognito_region", json!(config.region)),
        ("aws_user_pools_id", json!(reference(USER_POOL_NAME, "id"))),
        (
            "aws_user_pools_web_client_id",
            json!(reference(USER_POOL_CLIENT_NAME, "id")),
        ),
        ("aws_appsync_graphqlEndpoint", json!(endpoint)),
        ("aws_appsync_region", json!(config.region)),
        ("aws_appsync_authenticationType", json!(AUTH_TYPE)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    if local {
        client_config.insert(
            "aws_appsync_dangerously_connect_to_http_endpoint_for_testing".to_string(),
            json!(true),
        );
    }

    Blueprint {
        resources,
        exports,
        client_config,
    }
}

/// Table for one GraphQL type; for cloud stacks also its role, policy,
/// data source and resolvers
fn data_source(
    config: &NuageConfig,
    api: &str,
    type_name: &str,
    templates: &[ResolverTemplate],
) -> Vec<ResourceDecl> {
    let stack = config.stack_name();
    let table = format!("{stack}_{type_name}_table");

    let mut decls = vec![
        ResourceDecl::new(&table, TABLE)
            .property("name", format!("{stack}.{type_name}"))
            .property("hash_key", "id")
            .property("attributes", json!([{ "name": "id", "type": "S" }]))
            .property("billing_mode", "PAY_PER_REQUEST"),
    ];

    if config.is_local() {
        return decls;
    }

    let role = format!("{stack}_{type_name}_role");
    let policy = format!("{stack}_{type_name}_role_policy");
    let source = format!("{stack}_{type_name}_data_source");

    let assume_role_policy = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "appsync.amazonaws.com" },
            "Action": "sts:AssumeRole",
        }],
    });

    let table_arn = format!(
        "arn:aws:dynamodb:{}:{}:table/{}",
        config.region,
        config.account_id,
        reference(&table, "name")
    );
    let access_policy = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": TABLE_ACTIONS,
            "Resource": [table_arn.clone(), format!("{table_arn}/*")],
        }],
    });

    decls.push(
        ResourceDecl::new(&role, ROLE)
            .property("name", role.clone())
            .property("assume_role_policy", pretty(&assume_role_policy)),
    );
    decls.push(
        ResourceDecl::new(&policy, ROLE_POLICY)
            .property("role", reference(&role, "name"))
            .property("name", "MyDynamoDBAccess")
            .property("policy", pretty(&access_policy)),
    );
    decls.push(
        ResourceDecl::new(&source, DATA_SOURCE)
            .property("api_id", reference(api, "id"))
            .property("name", format!("{type_name}TableDataSource"))
            .property("type", "AMAZON_DYNAMODB")
            .property("service_role_arn", reference(&role, "arn"))
            .property(
                "dynamodb_config",
                json!({ "table_name": reference(&table, "name") }),
            )
            .depends_on(&role),
    );

    for template in templates {
        decls.push(
            ResourceDecl::new(
                format!("{stack}_{}_resolver", template.operation_name),
                RESOLVER,
            )
            .property("api_id", reference(api, "id"))
            .property("data_source", reference(&source, "name"))
            .property("field", template.operation_name.clone())
            .property("type", template.operation_type.clone())
            .property("request_template", escape_literal(&template.request))
            .property("response_template", escape_literal(&template.response)),
        );
    }

    decls
}

/// `${resource.path}`
fn reference(resource: &str, path: &str) -> String {
    format!("${{{resource}.{path}}}")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
