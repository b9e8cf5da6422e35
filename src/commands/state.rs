//! `nuage state` - inspect or edit the recorded state

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use resource_graph::{Snapshot, StateStore};

use crate::Context;
use crate::cli::StateCommand;
use crate::engine::Stack;
use crate::provider::type_label;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    let mut stack = Stack::open(ctx)?;

    match cmd {
        StateCommand::List => list(&stack),
        StateCommand::Show { name } => show(&stack, &name),
        StateCommand::Rm { name, yes } => rm(&mut stack, &name, yes),
    }
}

fn list(stack: &Stack) -> Result<()> {
    let snapshot = &stack.snapshot;

    if snapshot.is_empty() {
        ui::info(&format!("No resources recorded for {}", stack.config.stack_name()));
        return Ok(());
    }

    ui::header(&format!(
        "{} ({})",
        stack.config.stack_name(),
        ui::plural(snapshot.len(), "resource")
    ));

    for record in snapshot.resources.values() {
        let protect = if record.protect { " [protected]" } else { "" };
        println!(
            "  {:<48} {}{}",
            record.name,
            type_label(&record.resource_type).dimmed(),
            protect.yellow()
        );
    }

    println!();
    ui::dim(&format!(
        "Last updated {}",
        snapshot.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    Ok(())
}

fn show(stack: &Stack, name: &str) -> Result<()> {
    let record = stack
        .snapshot
        .get(name)
        .with_context(|| format!("Resource '{name}' is not in state"))?;

    ui::header(name);
    ui::kv("Type", &record.resource_type);
    ui::kv("Updated", &record.updated_at.to_rfc3339());
    if !record.dependencies.is_empty() {
        ui::kv("Depends on", &record.dependencies.join(", "));
    }
    if record.protect {
        ui::kv("Protected", "yes");
    }

    ui::section("Inputs");
    println!(
        "{}",
        serde_json::to_string_pretty(&record.inputs).context("Failed to serialize inputs")?
    );
    ui::section("Outputs");
    println!(
        "{}",
        serde_json::to_string_pretty(&record.outputs).context("Failed to serialize outputs")?
    );
    Ok(())
}

fn rm(stack: &mut Stack, name: &str, yes: bool) -> Result<()> {
    if stack.snapshot.get(name).is_none() {
        bail!("Resource '{name}' is not in state");
    }

    let dependents = dependents_of(&stack.snapshot, name);
    if !dependents.is_empty() {
        ui::warn(&format!(
            "Still referenced by: {}",
            dependents.join(", ")
        ));
    }

    if !yes {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Forget '{name}'? The resource itself is left in place"
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            ui::dim("Aborted");
            return Ok(());
        }
    }

    forget(stack, name)?;
    ui::success(&format!("Removed '{name}' from state"));
    Ok(())
}

/// Recorded resources that depended on `name` when they were applied
fn dependents_of(snapshot: &Snapshot, name: &str) -> Vec<String> {
    snapshot
        .resources
        .values()
        .filter(|r| r.dependencies.iter().any(|d| d == name))
        .map(|r| r.name.clone())
        .collect()
}

fn forget(stack: &mut Stack, name: &str) -> Result<()> {
    stack.snapshot.remove(name);
    stack.store.save(&stack.snapshot)?;
    log::info!("Forgot {name} in {}", stack.store.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use resource_graph::{Properties, ResourceRecord};

    fn record(name: &str, dependencies: &[&str]) -> ResourceRecord {
        ResourceRecord {
            name: name.to_string(),
            resource_type: "aws:dynamodb/table".to_string(),
            declared: Properties::new(),
            inputs: Properties::new(),
            outputs: Properties::new(),
            dependencies: dependencies.iter().map(ToString::to_string).collect(),
            protect: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_dependents_of() {
        let mut snapshot = Snapshot::default();
        snapshot.record(record("table", &[]));
        snapshot.record(record("policy", &["table", "role"]));
        snapshot.record(record("source", &["policy"]));

        assert_eq!(dependents_of(&snapshot, "table"), vec!["policy"]);
        assert_eq!(dependents_of(&snapshot, "policy"), vec!["source"]);
        assert!(dependents_of(&snapshot, "source").is_empty());
    }

    #[test]
    fn test_forget_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nuage.toml");
        std::fs::write(&path, "stack = \"test\"\n").unwrap();
        let config = crate::config::NuageConfig::from_file(&path).unwrap();
        let mut stack = Stack::with_state_dir(config, dir.path().join("state")).unwrap();

        stack.snapshot.record(record("table", &[]));
        stack.snapshot.record(record("other", &[]));
        stack.store.save(&stack.snapshot).unwrap();

        forget(&mut stack, "table").unwrap();

        let reloaded = stack.store.load().unwrap();
        assert!(reloaded.get("table").is_none());
        assert!(reloaded.get("other").is_some());
    }
}
