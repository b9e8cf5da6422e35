//! `nuage outputs` - show the stack exports of the last apply

use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::engine::Stack;
use crate::ui;

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let stack = Stack::open(ctx)?;
    let outputs = &stack.snapshot.outputs;

    if json {
        let text = serde_json::to_string_pretty(outputs).context("Failed to serialize outputs")?;
        println!("{text}");
        return Ok(());
    }

    if outputs.is_empty() {
        ui::info(&format!(
            "No outputs recorded for {}; run 'nuage up' first",
            stack.config.stack_name()
        ));
        return Ok(());
    }

    ui::header(&format!("Outputs of {}", stack.config.stack_name()));
    for (key, value) in outputs {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        ui::kv(key, &text);
    }

    Ok(())
}
