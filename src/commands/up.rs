//! `nuage up` - create or update the stack

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use resource_graph::{ExecuteOptions, Properties, StateStore};

use crate::Context;
use crate::blueprint::Blueprint;
use crate::cli::UpArgs;
use crate::engine::{self, Stack, display_plan};
use crate::exports;
use crate::ui;

pub fn run(ctx: &Context, args: UpArgs) -> Result<()> {
    let mut stack = Stack::open(ctx)?;

    if !ctx.quiet {
        ui::header(&format!("Updating {}", stack.config.stack_name()));
    }

    let blueprint = super::load_blueprint(&stack, ctx.quiet)?;
    let (_, plan) = stack.plan(&blueprint, &args.target)?;
    display_plan(&plan, &stack.snapshot, ctx.verbose > 0);

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
        verbose: ctx.verbose > 0,
        continue_on_error: args.continue_on_error,
    };
    let summary = engine::apply(&mut stack, &plan, &opts, args.yes)?;

    if opts.dry_run || engine::was_declined(&summary) {
        return Ok(());
    }

    if summary.total_changes() > 0 || !summary.is_success() {
        engine::print_summary(&summary);
    }

    if !summary.is_success() {
        bail!(
            "{} failed to apply",
            ui::plural(summary.failed, "resource")
        );
    }

    match publish(&mut stack, &blueprint) {
        Ok(outputs) => {
            if !ctx.quiet {
                print_outputs(&outputs);
                ui::dim(&format!(
                    "Client exports written to {}",
                    stack.config.exports_path().display()
                ));
            }
            Ok(())
        }
        // A targeted update may leave exported resources unapplied
        Err(e) if !args.target.is_empty() => {
            ui::warn(&format!("Stack exports not updated: {e:#}"));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Record the stack exports in state and write the client exports file
pub fn publish(stack: &mut Stack, blueprint: &Blueprint) -> Result<Properties> {
    let outputs = stack
        .snapshot
        .resolve_exports(&blueprint.exports)
        .context("Failed to resolve stack exports")?;
    let client = stack
        .snapshot
        .resolve_exports(&blueprint.client_config)
        .context("Failed to resolve client exports")?;

    stack.snapshot.set_outputs(outputs.clone());
    stack.store.save(&stack.snapshot)?;

    exports::write(&stack.config.exports_path(), &client)?;

    Ok(outputs)
}

fn print_outputs(outputs: &Properties) {
    if outputs.is_empty() {
        return;
    }
    ui::section("Outputs");
    for (key, value) in outputs {
        ui::kv(key, &ui::short_value(value, 80).green().to_string());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NuageConfig;
    use resource_graph::{AutoConfirm, NoProgress};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn local_stack(root: &Path) -> Stack {
        let build = root.join("amplify/backend/api/notespulumi/build");
        fs::create_dir_all(&build).unwrap();
        fs::write(
            build.join("schema.graphql"),
            "type Note @model {\n  id: ID!\n  name: String!\n}\n",
        )
        .unwrap();

        let path = root.join("nuage.toml");
        fs::write(&path, "[local]\nenabled = true\n").unwrap();
        let config = NuageConfig::from_file(&path).unwrap();
        Stack::with_state_dir(config, root.join("state")).unwrap()
    }

    fn apply_all(stack: &mut Stack, blueprint: &Blueprint) {
        let (_, plan) = stack.plan(blueprint, &[]).unwrap();
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
        assert!(summary.is_success());
    }

    #[test]
    fn test_publish_writes_exports_and_state() {
        let dir = TempDir::new().unwrap();
        let mut stack = local_stack(dir.path());
        let blueprint = stack.blueprint().unwrap();
        apply_all(&mut stack, &blueprint);

        let outputs = publish(&mut stack, &blueprint).unwrap();
        let pool_id = stack.snapshot.outputs_of("MyUserPool").unwrap()["id"].clone();
        assert_eq!(outputs["user_pool_id"], pool_id);
        assert!(!outputs.contains_key("graphql_api_uri"));

        let module = fs::read_to_string(dir.path().join("src/aws-exports.js")).unwrap();
        assert!(module.contains("http://localhost:62225/graphql"));
        assert!(module.contains(pool_id.as_str().unwrap()));
        assert!(module.contains("aws_appsync_dangerously_connect_to_http_endpoint_for_testing"));

        // Outputs survive a reload
        let reopened =
            Stack::with_state_dir(stack.config.clone(), dir.path().join("state")).unwrap();
        assert_eq!(reopened.snapshot.outputs, outputs);
    }

    #[test]
    fn test_publish_before_apply_fails() {
        let dir = TempDir::new().unwrap();
        let mut stack = local_stack(dir.path());
        let blueprint = stack.blueprint().unwrap();

        assert!(publish(&mut stack, &blueprint).is_err());
        assert!(!dir.path().join("src/aws-exports.js").exists());
    }
}
