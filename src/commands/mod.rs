//! Subcommand implementations

pub mod destroy;
pub mod outputs;
pub mod preview;
pub mod resolvers;
pub mod state;
pub mod up;

use anyhow::Result;

use crate::blueprint::Blueprint;
use crate::engine::Stack;
use crate::progress;
use crate::ui;

/// Declare the stack behind a spinner
fn load_blueprint(stack: &Stack, quiet: bool) -> Result<Blueprint> {
    if quiet {
        return stack.blueprint();
    }

    let pb = progress::spinner("Reading schema and resolver templates...");
    match stack.blueprint() {
        Ok(blueprint) => {
            progress::finish_success(
                &pb,
                &format!("Declared {}", ui::plural(blueprint.resources.len(), "resource")),
            );
            Ok(blueprint)
        }
        Err(e) => {
            progress::finish_error(&pb, "Could not declare the stack");
            Err(e)
        }
    }
}
