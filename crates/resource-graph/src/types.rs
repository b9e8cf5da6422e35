//! Core types for resource-graph reconciliation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Property bag of a resource (declared inputs or provider outputs)
pub type Properties = BTreeMap<String, Value>;

/// A resource as declared by a program
///
/// String property values may contain `${name.output}` references to the
/// outputs of other resources. Every reference implies a dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Logical name, unique within a declaration set
    pub name: String,
    /// Provider resource type (e.g. "aws:dynamodb/table")
    pub resource_type: String,
    /// Declared properties, unresolved
    #[serde(default)]
    pub properties: Properties,
    /// Explicit dependencies in addition to the ones implied by references
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Refuse to delete this resource
    #[serde(default)]
    pub protect: bool,
}

impl ResourceDecl {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            properties: Properties::new(),
            depends_on: Vec::new(),
            protect: false,
        }
    }

    /// Set a property
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add an explicit dependency
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.depends_on.contains(&name) {
            self.depends_on.push(name);
        }
        self
    }

    /// Mark the resource as protected from deletion
    pub fn protected(mut self) -> Self {
        self.protect = true;
        self
    }
}

/// Last-applied state of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    pub resource_type: String,
    /// Properties as declared (references unresolved), used for diffing
    #[serde(default)]
    pub declared: Properties,
    /// Properties as sent to the provider (references resolved)
    #[serde(default)]
    pub inputs: Properties,
    /// Values reported by the provider
    #[serde(default)]
    pub outputs: Properties,
    /// Resources this one depended on when it was applied
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub protect: bool,
    pub updated_at: DateTime<Utc>,
}

/// Kind of operation planned for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    /// Resource is new
    Create,
    /// Resource changes in place
    Update,
    /// Resource must be deleted and created again
    Replace,
    /// Resource is no longer declared
    Delete,
    /// Nothing to do
    Same,
}

impl OpKind {
    /// Diff marker used in plan output
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "+-",
            Self::Delete => "-",
            Self::Same => " ",
        }
    }

    /// Check if the operation changes anything
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Same)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Same => "same",
        };
        f.write_str(label)
    }
}

/// Result of applying one planned operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was updated in place
    Updated,
    /// Resource was deleted and created again
    Replaced,
    /// Resource was deleted
    Deleted,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Updated | Self::Replaced | Self::Deleted
        )
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
    /// Failed resources with their error message
    #[serde(default)]
    pub failures: Vec<(String, String)>,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of operations processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.no_change
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.replaced += other.replaced;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.no_change += other.no_change;
        self.failures.extend(other.failures.iter().cloned());
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, name: &str, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Updated => self.updated += 1,
            ApplyResult::Replaced => self.replaced += 1,
            ApplyResult::Deleted => self.deleted += 1,
            ApplyResult::Failed { error } => {
                self.failed += 1;
                self.failures.push((name.to_string(), error.clone()));
            }
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just report the plan
    pub dry_run: bool,
    /// Number of parallel jobs per wave
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
    /// Keep applying independent resources after a failure
    pub continue_on_error: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
            continue_on_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decl_builder() {
        let decl = ResourceDecl::new("table", "aws:dynamodb/table")
            .property("hash_key", "id")
            .property("attributes", json!([{ "name": "id", "type": "S" }]))
            .depends_on("role")
            .depends_on("role")
            .protected();

        assert_eq!(decl.properties["hash_key"], json!("id"));
        assert_eq!(decl.depends_on, vec!["role".to_string()]);
        assert!(decl.protect);
    }

    #[test]
    fn test_summary_counts_failures() {
        let mut summary = ExecuteSummary::default();
        summary.add_result("a", &ApplyResult::Created);
        summary.add_result("b", &ApplyResult::Replaced);
        summary.add_result(
            "c",
            &ApplyResult::Failed {
                error: "rejected".into(),
            },
        );
        summary.add_result(
            "d",
            &ApplyResult::Skipped {
                reason: "dependency failed".into(),
            },
        );

        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.total(), 4);
        assert!(!summary.is_success());
        assert_eq!(
            summary.failures,
            vec![("c".to_string(), "rejected".to_string())]
        );
    }

    #[test]
    fn test_summary_merge() {
        let mut a = ExecuteSummary::default();
        a.add_result("x", &ApplyResult::Deleted);
        let mut b = ExecuteSummary::default();
        b.add_result("y", &ApplyResult::NoChange);
        b.add_result("z", &ApplyResult::Failed { error: "e".into() });

        a.merge(&b);
        assert_eq!(a.deleted, 1);
        assert_eq!(a.no_change, 1);
        assert_eq!(a.failures.len(), 1);
    }

    #[test]
    fn test_op_kind_display() {
        assert_eq!(OpKind::Replace.to_string(), "replace");
        assert_eq!(OpKind::Replace.symbol(), "+-");
        assert!(!OpKind::Same.is_change());
    }
}
