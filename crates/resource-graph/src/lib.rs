//! # Resource Graph
//!
//! Declarative reconciliation of named resources against last-applied state.
//!
//! ## Core Concepts
//!
//! - **ResourceDecl**: A named, typed resource with properties. String
//!   properties may reference other resources' outputs as `${name.output}`.
//! - **ResourceGraph**: Validated declarations with dependency levels
//! - **Snapshot**: Last-applied records and stack exports, persisted by a [`StateStore`]
//! - **Plan**: Create/update/replace/delete steps that converge state to the graph
//! - **Executor**: Applies a plan wave by wave, in parallel where possible
//!
//! ## Example
//!
//! ```ignore
//! use resource_graph::{
//!     ExecuteOptions, FileStore, Plan, ResourceDecl, ResourceGraph, StateStore,
//!     execute_simple,
//! };
//!
//! let graph = ResourceGraph::build(vec![
//!     ResourceDecl::new("pool", "user_pool").property("name", "notes"),
//!     ResourceDecl::new("client", "user_pool_client")
//!         .property("user_pool_id", "${pool.id}"),
//! ])?;
//!
//! let mut store = FileStore::for_stack(state_dir, "dev");
//! let mut snapshot = store.load()?;
//! let plan = Plan::build(&graph, &snapshot, &provider)?;
//! let opts = ExecuteOptions::default();
//! let summary = execute_simple(&plan, &mut snapshot, &provider, &mut store, &opts)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`Provider`]: Creates, updates and deletes resources of a backend
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This keeps the crate free of any backend or UI dependency.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod reference;
pub mod state;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
    Provider, ResolvedResource,
};
pub use diff::{DiffSummary, ResourceDiff, group_by_type};
pub use error::{Error, Result};
pub use executor::{execute, execute_simple};
pub use graph::ResourceGraph;
pub use planner::{Plan, Step};
pub use reference::{Reference, escape_literal, referenced_resources, resolve_properties};
pub use state::{FileStore, MemoryStore, STATE_VERSION, Snapshot, StateStore};
pub use types::{
    ApplyResult, ExecuteOptions, ExecuteSummary, OpKind, Properties, ResourceDecl, ResourceRecord,
};
