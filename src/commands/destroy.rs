//! `nuage destroy` - delete every resource of the stack

use anyhow::{Result, bail};
use resource_graph::{ExecuteOptions, Properties, StateStore};

use crate::Context;
use crate::engine::{self, Stack, display_plan};
use crate::ui;

pub fn run(ctx: &Context, yes: bool) -> Result<()> {
    let mut stack = Stack::open(ctx)?;

    if !ctx.quiet {
        ui::header(&format!("Destroying {}", stack.config.stack_name()));
    }

    if stack.snapshot.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }

    let plan = stack.destroy_plan()?;
    display_plan(&plan, &stack.snapshot, ctx.verbose > 0);

    let opts = ExecuteOptions {
        verbose: ctx.verbose > 0,
        ..Default::default()
    };
    let summary = engine::apply(&mut stack, &plan, &opts, yes)?;

    if engine::was_declined(&summary) {
        return Ok(());
    }

    engine::print_summary(&summary);

    if !summary.is_success() {
        bail!(
            "{} could not be deleted",
            ui::plural(summary.failed, "resource")
        );
    }

    clear_outputs(&mut stack)
}

/// Forget the stack exports once nothing is left
fn clear_outputs(stack: &mut Stack) -> Result<()> {
    if stack.snapshot.is_empty() && !stack.snapshot.outputs.is_empty() {
        stack.snapshot.set_outputs(Properties::new());
        stack.store.save(&stack.snapshot)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NuageConfig;
    use resource_graph::{AutoConfirm, NoProgress, ResourceDecl};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_destroy_empties_state_and_outputs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nuage.toml");
        fs::write(&path, "[local]\nenabled = true\n").unwrap();
        let config = NuageConfig::from_file(&path).unwrap();
        let mut stack = Stack::with_state_dir(config, dir.path().join("state")).unwrap();

        let blueprint = crate::blueprint::Blueprint {
            resources: vec![
                ResourceDecl::new("pool", crate::provider::USER_POOL).property("name", "pool"),
            ],
            exports: Properties::new(),
            client_config: Properties::new(),
        };
        let (_, plan) = stack.plan(&blueprint, &[]).unwrap();
        resource_graph::execute_simple(
            &plan,
            &mut stack.snapshot,
            &stack.provider,
            &mut stack.store,
            &ExecuteOptions::default(),
        )
        .unwrap();
        stack
            .snapshot
            .set_outputs([("user_pool_id".to_string(), "x".into())].into_iter().collect());

        let plan = stack.destroy_plan().unwrap();
        let summary = resource_graph::execute(
            &plan,
            &mut stack.snapshot,
            &stack.provider,
            &mut stack.store,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(summary.deleted, 1);

        clear_outputs(&mut stack).unwrap();
        let reloaded = stack.store.load().unwrap();
        assert!(reloaded.is_empty());
        assert!(reloaded.outputs.is_empty());
    }
}
