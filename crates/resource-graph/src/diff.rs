//! Diff computation between declarations and last-applied state

use crate::types::{OpKind, Properties, ResourceDecl, ResourceRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Difference between a declaration and its state record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Logical name of the resource
    pub name: String,
    /// Type of the resource (declared type, or recorded type for deletes)
    pub resource_type: String,
    /// Operation needed to converge
    pub kind: OpKind,
    /// Property keys whose declared values differ
    pub changed_keys: Vec<String>,
    /// Subset of `changed_keys` that force replacement
    pub replace_keys: Vec<String>,
}

impl ResourceDiff {
    /// Compare one declaration with its record
    ///
    /// `replace_on` lists the keys the provider cannot change in place.
    pub fn compute(
        decl: Option<&ResourceDecl>,
        record: Option<&ResourceRecord>,
        replace_on: &[&str],
    ) -> Option<Self> {
        match (decl, record) {
            (None, None) => None,
            (Some(decl), None) => Some(Self {
                name: decl.name.clone(),
                resource_type: decl.resource_type.clone(),
                kind: OpKind::Create,
                changed_keys: decl.properties.keys().cloned().collect(),
                replace_keys: Vec::new(),
            }),
            (None, Some(record)) => Some(Self {
                name: record.name.clone(),
                resource_type: record.resource_type.clone(),
                kind: OpKind::Delete,
                changed_keys: Vec::new(),
                replace_keys: Vec::new(),
            }),
            (Some(decl), Some(record)) => {
                let changed_keys = changed_keys(&record.declared, &decl.properties);

                let (kind, replace_keys) = if decl.resource_type != record.resource_type {
                    (OpKind::Replace, vec!["type".to_string()])
                } else {
                    let forced: Vec<String> = changed_keys
                        .iter()
                        .filter(|k| replace_on.contains(&k.as_str()))
                        .cloned()
                        .collect();
                    if !forced.is_empty() {
                        (OpKind::Replace, forced)
                    } else if changed_keys.is_empty() {
                        (OpKind::Same, Vec::new())
                    } else {
                        (OpKind::Update, Vec::new())
                    }
                };

                Some(Self {
                    name: decl.name.clone(),
                    resource_type: decl.resource_type.clone(),
                    kind,
                    changed_keys,
                    replace_keys,
                })
            }
        }
    }

    pub fn is_addition(&self) -> bool {
        self.kind == OpKind::Create
    }

    pub fn is_removal(&self) -> bool {
        self.kind == OpKind::Delete
    }

    pub fn is_modification(&self) -> bool {
        matches!(self.kind, OpKind::Update | OpKind::Replace)
    }
}

/// Keys present in either bag whose values differ, sorted
pub fn changed_keys(old: &Properties, new: &Properties) -> Vec<String> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| old.get(*k) != new.get(*k))
        .cloned()
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub creates: usize,
    pub updates: usize,
    pub replaces: usize,
    pub deletes: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs<'a>(diffs: impl IntoIterator<Item = &'a ResourceDiff>) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            summary.add(diff.kind);
        }
        summary
    }

    pub fn add(&mut self, kind: OpKind) {
        match kind {
            OpKind::Create => self.creates += 1,
            OpKind::Update => self.updates += 1,
            OpKind::Replace => self.replaces += 1,
            OpKind::Delete => self.deletes += 1,
            OpKind::Same => self.unchanged += 1,
        }
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.replaces + self.deletes
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type
pub fn group_by_type<'a>(
    diffs: impl IntoIterator<Item = &'a ResourceDiff>,
) -> HashMap<String, Vec<&'a ResourceDiff>> {
    let mut groups: HashMap<String, Vec<&ResourceDiff>> = HashMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record_of(decl: &ResourceDecl) -> ResourceRecord {
        ResourceRecord {
            name: decl.name.clone(),
            resource_type: decl.resource_type.clone(),
            declared: decl.properties.clone(),
            inputs: decl.properties.clone(),
            outputs: Properties::new(),
            dependencies: Vec::new(),
            protect: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_delete() {
        let decl = ResourceDecl::new("t", "table").property("hash_key", "id");
        let create = ResourceDiff::compute(Some(&decl), None, &[]).unwrap();
        assert!(create.is_addition());
        assert_eq!(create.changed_keys, vec!["hash_key"]);

        let record = record_of(&decl);
        let delete = ResourceDiff::compute(None, Some(&record), &[]).unwrap();
        assert!(delete.is_removal());
        assert!(ResourceDiff::compute(None, None, &[]).is_none());
    }

    #[test]
    fn test_same_update_replace() {
        let old = ResourceDecl::new("t", "table")
            .property("name", "notes.Note")
            .property("billing_mode", "PROVISIONED");
        let record = record_of(&old);

        let same = ResourceDiff::compute(Some(&old), Some(&record), &["name"]).unwrap();
        assert_eq!(same.kind, OpKind::Same);

        let billing = old.clone().property("billing_mode", "PAY_PER_REQUEST");
        let update = ResourceDiff::compute(Some(&billing), Some(&record), &["name"]).unwrap();
        assert_eq!(update.kind, OpKind::Update);
        assert_eq!(update.changed_keys, vec!["billing_mode"]);

        let renamed = old.clone().property("name", "notes.Other");
        let replace = ResourceDiff::compute(Some(&renamed), Some(&record), &["name"]).unwrap();
        assert_eq!(replace.kind, OpKind::Replace);
        assert_eq!(replace.replace_keys, vec!["name"]);
    }

    #[test]
    fn test_type_change_replaces() {
        let old = ResourceDecl::new("t", "table");
        let record = record_of(&old);
        let new = ResourceDecl::new("t", "bucket");
        let diff = ResourceDiff::compute(Some(&new), Some(&record), &[]).unwrap();
        assert_eq!(diff.kind, OpKind::Replace);
    }

    #[test]
    fn test_changed_keys_covers_removed_keys() {
        let old: Properties = serde_json::from_value(json!({ "a": 1, "b": 2 })).unwrap();
        let new: Properties = serde_json::from_value(json!({ "a": 1, "c": 3 })).unwrap();
        assert_eq!(changed_keys(&old, &new), vec!["b", "c"]);
    }

    #[test]
    fn test_summary_and_grouping() {
        let a = ResourceDecl::new("a", "table");
        let b = ResourceDecl::new("b", "role");
        let diffs: Vec<ResourceDiff> = [&a, &b]
            .into_iter()
            .filter_map(|d| ResourceDiff::compute(Some(d), None, &[]))
            .collect();

        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.creates, 2);
        assert!(summary.has_changes());

        let groups = group_by_type(&diffs);
        assert_eq!(groups["table"].len(), 1);
        assert_eq!(groups["role"].len(), 1);
    }
}
