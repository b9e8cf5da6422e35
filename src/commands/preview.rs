//! `nuage preview` - show what `up` would change

use anyhow::Result;

use crate::Context;
use crate::engine::{Stack, display_plan};
use crate::ui;

pub fn run(ctx: &Context, targets: &[String]) -> Result<()> {
    let stack = Stack::open(ctx)?;

    if !ctx.quiet {
        ui::header(&format!("Previewing {}", stack.config.stack_name()));
    }

    let blueprint = super::load_blueprint(&stack, ctx.quiet)?;
    let (graph, plan) = stack.plan(&blueprint, targets)?;
    log::debug!(
        "{} declared, {} planned steps",
        ui::plural(graph.len(), "resource"),
        plan.steps().len()
    );

    display_plan(&plan, &stack.snapshot, ctx.verbose > 0);

    if plan.has_changes() && !ctx.quiet {
        println!();
        ui::dim("Run 'nuage up' to apply these changes");
    }

    Ok(())
}
