//! Apply context and provider traits
//!
//! These traits let the engine drive any backend and any UI without
//! depending on them.

use crate::types::{ApplyResult, OpKind, Properties, ResourceRecord};
use anyhow::Result;

/// A resource with references resolved, ready to hand to a provider
#[derive(Debug, Clone, Copy)]
pub struct ResolvedResource<'a> {
    pub name: &'a str,
    pub resource_type: &'a str,
    pub inputs: &'a Properties,
}

/// Backend that actually creates, updates and deletes resources
///
/// Implementations must be thread-safe: independent resources are applied
/// concurrently.
pub trait Provider: Send + Sync {
    /// Provider name, for logs
    fn name(&self) -> &str;

    /// Property keys whose change forces delete-then-create
    fn replace_keys(&self, _resource_type: &str) -> &[&str] {
        &[]
    }

    /// Reject a definition before anything is changed
    fn check(&self, _resource: &ResolvedResource<'_>) -> Result<()> {
        Ok(())
    }

    /// Create a resource, returning its outputs
    fn create(&self, ctx: &ApplyContext, resource: &ResolvedResource<'_>) -> Result<Properties>;

    /// Update a resource in place, returning its new outputs
    fn update(
        &self,
        ctx: &ApplyContext,
        resource: &ResolvedResource<'_>,
        previous: &ResourceRecord,
    ) -> Result<Properties>;

    /// Delete a previously applied resource
    fn delete(&self, ctx: &ApplyContext, record: &ResourceRecord) -> Result<()>;
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a wave of independent operations
    fn on_batch_start(&mut self, count: usize, deleting: bool);

    /// Called when an operation is about to run
    fn on_resource_start(&mut self, name: &str, kind: OpKind);

    /// Called when an operation completes
    fn on_resource_complete(&mut self, name: &str, result: &ApplyResult);

    /// Called when a wave completes
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize, _deleting: bool) {}
    fn on_resource_start(&mut self, _name: &str, _kind: OpKind) {}
    fn on_resource_complete(&mut self, _name: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to provider operations
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
}

impl ApplyContext {
    pub fn new(dry_run: bool, verbose: bool) -> Self {
        Self { dry_run, verbose }
    }
}
