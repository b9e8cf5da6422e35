//! Apply with terminal progress and confirmation

use anyhow::Result;
use colored::Colorize;
use indicatif::ProgressBar;
use resource_graph::{
    ApplyResult, AutoConfirm, ConfirmCallback, ExecuteOptions, ExecuteSummary, OpKind, Plan,
    ProgressCallback,
};

use super::planner::Stack;
use crate::progress;

/// Per-wave progress bar
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl BarProgress {
    pub fn new(verbose: bool) -> Self {
        Self { bar: None, verbose }
    }
}

/// Marker shown next to a finished operation
pub fn result_symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created
        | ApplyResult::Updated
        | ApplyResult::Replaced
        | ApplyResult::Deleted => "✓",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&mut self, count: usize, deleting: bool) {
        let prefix = if deleting { "Deleting" } else { "Applying" };
        self.bar = Some(progress::bar(count as u64, prefix));
    }

    fn on_resource_start(&mut self, name: &str, kind: OpKind) {
        log::debug!("{kind} {name}");
    }

    fn on_resource_complete(&mut self, name: &str, result: &ApplyResult) {
        let line = format!("{} {}", result_symbol(result), name);
        match &self.bar {
            Some(bar) => {
                bar.set_message(line.clone());
                bar.inc(1);
                if self.verbose || !result.is_success() {
                    bar.println(format!("  {line}"));
                }
            }
            None if self.verbose => println!("  {line}"),
            None => {}
        }
        if let ApplyResult::Failed { error } = result {
            log::warn!("{name}: {error}");
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Interactive yes/no prompt
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        Ok(confirmed)
    }
}

/// Apply `plan` to the stack, saving state after every operation
pub fn apply(
    stack: &mut Stack,
    plan: &Plan,
    opts: &ExecuteOptions,
    yes: bool,
) -> Result<ExecuteSummary> {
    let mut progress = BarProgress::new(opts.verbose);
    let summary = if yes {
        resource_graph::execute(
            plan,
            &mut stack.snapshot,
            &stack.provider,
            &mut stack.store,
            opts,
            &mut progress,
            &mut AutoConfirm,
        )?
    } else {
        resource_graph::execute(
            plan,
            &mut stack.snapshot,
            &stack.provider,
            &mut stack.store,
            opts,
            &mut progress,
            &mut PromptConfirm,
        )?
    };

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if was_declined(&summary) {
        println!();
        println!("  {} Aborted", "✗".red());
    }

    Ok(summary)
}

/// The user answered no: every change was skipped and nothing else ran
pub fn was_declined(summary: &ExecuteSummary) -> bool {
    summary.skipped > 0 && summary.total() == summary.skipped
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Stack updated successfully!", "✓".green().bold());
    } else {
        println!("  {} Stack updated with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
        for (name, error) in &summary.failures {
            println!("      {} {}: {}", "✗".red(), name, error.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_symbols() {
        assert_eq!(result_symbol(&ApplyResult::NoChange), "○");
        assert_eq!(result_symbol(&ApplyResult::Replaced), "✓");
        assert_eq!(
            result_symbol(&ApplyResult::Failed {
                error: "boom".to_string()
            }),
            "✗"
        );
        assert_eq!(
            result_symbol(&ApplyResult::Skipped {
                reason: "dependency failed".to_string()
            }),
            "⊘"
        );
    }

    #[test]
    fn test_was_declined() {
        assert!(was_declined(&ExecuteSummary {
            skipped: 3,
            ..Default::default()
        }));
        assert!(!was_declined(&ExecuteSummary {
            skipped: 1,
            failed: 1,
            ..Default::default()
        }));
        assert!(!was_declined(&ExecuteSummary::default()));
    }

    #[test]
    fn test_progress_without_bar_is_silent() {
        let mut progress = BarProgress::new(false);
        progress.on_resource_complete("table", &ApplyResult::Created);
        progress.on_batch_complete();
        assert!(progress.bar.is_none());
    }
}
