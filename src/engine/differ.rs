//! Plan display

use colored::{ColoredString, Colorize};
use resource_graph::{OpKind, Plan, Properties, Snapshot, group_by_type};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::provider::{RESOURCE_TYPES, type_label};
use crate::ui;

/// One changed property of an update or replace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyChange {
    /// Short values, shown inline
    Inline {
        key: String,
        old: String,
        new: String,
    },
    /// Multi-line text, shown as a line diff
    Text {
        key: String,
        lines: Vec<(ChangeTag, String)>,
    },
}

/// Describe how `keys` changed between two property bags
pub fn property_changes(
    old: &Properties,
    new: &Properties,
    keys: &[String],
) -> Vec<PropertyChange> {
    keys.iter()
        .map(|key| {
            let before = old.get(key);
            let after = new.get(key);
            match (before, after) {
                (Some(Value::String(a)), Some(Value::String(b)))
                    if a.contains('\n') || b.contains('\n') =>
                {
                    PropertyChange::Text {
                        key: key.clone(),
                        lines: text_diff(a, b),
                    }
                }
                _ => PropertyChange::Inline {
                    key: key.clone(),
                    old: before.map_or_else(|| "(unset)".to_string(), |v| ui::short_value(v, 40)),
                    new: after.map_or_else(|| "(unset)".to_string(), |v| ui::short_value(v, 40)),
                },
            }
        })
        .collect()
}

/// Inserted and deleted lines between two texts
pub fn text_diff(old: &str, new: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.value().trim_end_matches('\n').to_string()))
        .collect()
}

fn symbol(kind: OpKind) -> ColoredString {
    match kind {
        OpKind::Create => kind.symbol().green(),
        OpKind::Update => kind.symbol().yellow(),
        OpKind::Replace => kind.symbol().magenta(),
        OpKind::Delete => kind.symbol().red(),
        OpKind::Same => kind.symbol().dimmed(),
    }
}

/// Display a plan in a user-friendly format
///
/// With `verbose`, unchanged resources and per-property changes are shown.
pub fn display_plan(plan: &Plan, snapshot: &Snapshot, verbose: bool) {
    let summary = plan.summary();

    if !summary.has_changes() && !verbose {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    let groups = group_by_type(
        plan.steps()
            .iter()
            .filter(|s| verbose || s.kind().is_change())
            .map(|s| &s.diff),
    );

    // Known types in declaration order, then anything else by name
    let mut types: Vec<&String> = groups.keys().collect();
    types.sort_by_key(|t| {
        (
            RESOURCE_TYPES
                .iter()
                .position(|known| *known == t.as_str())
                .unwrap_or(usize::MAX),
            (*t).clone(),
        )
    });

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Stack Changes".bold()
    );
    println!("│");

    for resource_type in types {
        println!("│ {}", type_label(resource_type).bold());

        for diff in &groups[resource_type] {
            let detail = match diff.kind {
                OpKind::Update => format!("({})", diff.changed_keys.join(", ")),
                OpKind::Replace => format!("(replace: {})", diff.replace_keys.join(", ")),
                OpKind::Delete => "(will delete)".to_string(),
                OpKind::Create | OpKind::Same => String::new(),
            };
            println!(
                "│   {:<2} {:<44} {}",
                symbol(diff.kind),
                diff.name,
                detail.dimmed()
            );

            if verbose && diff.is_modification() {
                display_property_changes(plan, snapshot, &diff.name, &diff.changed_keys);
            }
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to update, {} to replace, {} to delete",
        summary.creates.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.replaces.to_string().magenta(),
        summary.deletes.to_string().red()
    );
    if summary.unchanged > 0 {
        println!("│          {} unchanged", summary.unchanged.to_string().dimmed());
    }
    println!("└─────────────────────────────────────────────────────┘");
}

fn display_property_changes(plan: &Plan, snapshot: &Snapshot, name: &str, keys: &[String]) {
    let (Some(record), Some(decl)) = (
        snapshot.get(name),
        plan.get(name).and_then(|s| s.decl.as_ref()),
    ) else {
        return;
    };

    for change in property_changes(&record.declared, &decl.properties, keys) {
        match change {
            PropertyChange::Inline { key, old, new } => {
                println!("│       {}: {} → {}", key.dimmed(), old.red(), new.green());
            }
            PropertyChange::Text { key, lines } => {
                println!("│       {}:", key.dimmed());
                for (tag, line) in lines {
                    match tag {
                        ChangeTag::Delete => println!("│         {}", format!("- {line}").red()),
                        ChangeTag::Insert => println!("│         {}", format!("+ {line}").green()),
                        ChangeTag::Equal => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_inline_changes() {
        let old = props(json!({ "billing_mode": "PROVISIONED", "gone": 1 }));
        let new = props(json!({ "billing_mode": "PAY_PER_REQUEST" }));
        let changes = property_changes(
            &old,
            &new,
            &["billing_mode".to_string(), "gone".to_string()],
        );

        assert_eq!(
            changes,
            vec![
                PropertyChange::Inline {
                    key: "billing_mode".to_string(),
                    old: "PROVISIONED".to_string(),
                    new: "PAY_PER_REQUEST".to_string(),
                },
                PropertyChange::Inline {
                    key: "gone".to_string(),
                    old: "1".to_string(),
                    new: "(unset)".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_multiline_strings_use_line_diff() {
        let old = props(json!({ "schema": "type Note @model {\n  id: ID!\n}\n" }));
        let new = props(json!({ "schema": "type Note @model {\n  id: ID!\n  name: String\n}\n" }));
        let changes = property_changes(&old, &new, &["schema".to_string()]);

        let PropertyChange::Text { lines, .. } = &changes[0] else {
            panic!("expected a text diff");
        };
        assert_eq!(lines, &vec![(ChangeTag::Insert, "  name: String".to_string())]);
    }

    #[test]
    fn test_text_diff_reports_both_sides() {
        let lines = text_diff("a\nb\n", "a\nc\n");
        assert_eq!(
            lines,
            vec![
                (ChangeTag::Delete, "b".to_string()),
                (ChangeTag::Insert, "c".to_string()),
            ]
        );
    }
}
