//! Error types for the resource-graph crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, planning, or applying a resource graph
#[derive(Error, Debug)]
pub enum Error {
    /// Two declarations share a logical name
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),

    /// Logical name contains characters that cannot appear in a reference
    #[error("invalid resource name '{0}': use letters, digits, '_' or '-'")]
    InvalidName(String),

    /// A dependency or reference names a resource that was never declared
    #[error("resource '{resource}' depends on undeclared resource '{dependency}'")]
    UnknownDependency { resource: String, dependency: String },

    /// A resource lists itself as a dependency
    #[error("resource '{0}' depends on itself")]
    SelfDependency(String),

    /// The dependency graph is not acyclic
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// A `${...}` expression could not be parsed
    #[error("invalid reference '{reference}' in resource '{resource}': {reason}")]
    InvalidReference {
        resource: String,
        reference: String,
        reason: String,
    },

    /// A reference points at an output that does not exist (yet)
    #[error("unresolved reference '${{{reference}}}' in resource '{resource}'")]
    UnresolvedReference { resource: String, reference: String },

    /// Deletion of a protected resource was planned
    #[error("resource '{0}' is protected and cannot be deleted")]
    Protected(String),

    /// Target filter names nothing in the plan
    #[error("target '{0}' does not match any declared or recorded resource")]
    UnknownTarget(String),

    /// A delete was planned for a resource missing from state
    #[error("resource '{0}' is not in state")]
    NotInState(String),

    /// Confirmation prompt failed
    #[error("confirmation failed: {0}")]
    Confirm(String),

    /// State file was written by an incompatible version
    #[error("state file {} has version {found}, expected {expected}", .path.display())]
    StateVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// Failed to read or write the state file
    #[error("state file {}: {source}", .path.display())]
    StateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be created
    #[error("failed to create apply thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for resource-graph operations
pub type Result<T> = std::result::Result<T, Error>;
