//! Execution engine - applies a plan in dependency order
//!
//! Steps are grouped into waves of independent operations. Each wave runs
//! on a rayon pool; state is updated and saved on the calling thread after
//! every operation that changed something.

use crate::context::{
    ApplyContext, AutoConfirm, ConfirmCallback, NoProgress, ProgressCallback, Provider,
    ResolvedResource,
};
use crate::error::{Error, Result};
use crate::graph::{Edges, sort_levels};
use crate::planner::{Plan, Step};
use crate::reference::resolve_properties;
use crate::state::{Snapshot, StateStore};
use crate::types::{
    ApplyResult, ExecuteOptions, ExecuteSummary, OpKind, Properties, ResourceRecord,
};
use anyhow::Context as _;
use chrono::Utc;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// A step with its inputs resolved against current state
struct Work<'a> {
    step: &'a Step,
    inputs: Properties,
    previous: Option<ResourceRecord>,
}

/// What happened to one step
struct Outcome {
    name: String,
    result: ApplyResult,
    record: Option<ResourceRecord>,
    removed: bool,
}

impl Outcome {
    fn without_change(name: &str, result: ApplyResult) -> Self {
        Self {
            name: name.to_string(),
            result,
            record: None,
            removed: false,
        }
    }
}

/// Execute a plan
///
/// # Arguments
/// * `plan` - Operations to run, as produced by [`Plan::build`] or [`Plan::destroy`]
/// * `snapshot` - Last-applied state; updated in place as operations finish
/// * `provider` - Backend performing the operations
/// * `store` - Where `snapshot` is persisted after each change
/// * `opts` - Execution options (dry_run, jobs, continue_on_error)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results. A failed operation is reported in the
/// summary, not as an error; errors are reserved for state persistence.
pub fn execute<P, S, G, C>(
    plan: &Plan,
    snapshot: &mut Snapshot,
    provider: &P,
    store: &mut S,
    opts: &ExecuteOptions,
    progress: &mut G,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: Provider + ?Sized,
    S: StateStore + ?Sized,
    G: ProgressCallback,
    C: ConfirmCallback,
{
    let total_changes = plan.changes().count();

    if total_changes == 0 && !opts.dry_run {
        refresh_unchanged(plan, snapshot, store)?;
        return Ok(ExecuteSummary {
            no_change: plan.steps().len(),
            ..Default::default()
        });
    }

    if opts.dry_run {
        return Ok(ExecuteSummary::default());
    }

    let confirmed = confirm
        .confirm("Apply changes?")
        .map_err(|e| Error::Confirm(format!("{e:#}")))?;
    if !confirmed {
        return Ok(ExecuteSummary {
            skipped: total_changes,
            ..Default::default()
        });
    }

    log::info!(
        "Applying {} changes with provider '{}'",
        total_changes,
        provider.name()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()?;
    let ctx = ApplyContext::new(false, opts.verbose);

    let mut summary = ExecuteSummary::default();
    let mut blocked: BTreeSet<String> = BTreeSet::new();
    let mut halted = false;

    let (forward, deletes): (Vec<&Step>, Vec<&Step>) = plan
        .steps()
        .iter()
        .partition(|s| s.kind() != OpKind::Delete);

    for (steps, deleting) in [(forward, false), (deletes, true)] {
        for wave in waves(&steps)? {
            if halted {
                for step in wave {
                    let result = ApplyResult::Skipped {
                        reason: "stopped after an earlier failure".to_string(),
                    };
                    progress.on_resource_complete(step.name(), &result);
                    summary.add_result(step.name(), &result);
                }
                continue;
            }

            progress.on_batch_start(wave.len(), deleting);

            let mut work = Vec::with_capacity(wave.len());
            for step in wave {
                if let Some(blocker) = blocker_of(step, &blocked, snapshot) {
                    let result = ApplyResult::Skipped {
                        reason: format!("dependency '{blocker}' did not apply"),
                    };
                    log::warn!("Skipping {}: {}", step.name(), blocker);
                    progress.on_resource_complete(step.name(), &result);
                    summary.add_result(step.name(), &result);
                    blocked.insert(step.name().to_string());
                    continue;
                }

                progress.on_resource_start(step.name(), step.kind());
                match prepare(step, snapshot) {
                    Ok(w) => work.push(w),
                    Err(e) => {
                        let result = ApplyResult::Failed {
                            error: e.to_string(),
                        };
                        progress.on_resource_complete(step.name(), &result);
                        summary.add_result(step.name(), &result);
                        blocked.insert(step.name().to_string());
                    }
                }
            }

            let outcomes: Vec<Outcome> =
                pool.install(|| work.par_iter().map(|w| run(provider, &ctx, w)).collect());

            for outcome in outcomes {
                if !outcome.result.is_success() {
                    log::error!("{} failed: {:?}", outcome.name, outcome.result);
                    blocked.insert(outcome.name.clone());
                }

                if let Some(record) = outcome.record {
                    snapshot.record(record);
                    store.save(snapshot)?;
                } else if outcome.removed {
                    snapshot.remove(&outcome.name);
                    store.save(snapshot)?;
                }

                progress.on_resource_complete(&outcome.name, &outcome.result);
                summary.add_result(&outcome.name, &outcome.result);
            }

            progress.on_batch_complete();

            if summary.failed > 0 && !opts.continue_on_error {
                halted = true;
            }
        }
    }

    Ok(summary)
}

/// Simple execution without callbacks
pub fn execute_simple<P, S>(
    plan: &Plan,
    snapshot: &mut Snapshot,
    provider: &P,
    store: &mut S,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary>
where
    P: Provider + ?Sized,
    S: StateStore + ?Sized,
{
    execute(
        plan,
        snapshot,
        provider,
        store,
        opts,
        &mut NoProgress,
        &mut AutoConfirm,
    )
}

/// Group steps into waves using their `after` sets
fn waves<'a>(steps: &[&'a Step]) -> Result<Vec<Vec<&'a Step>>> {
    let by_name: BTreeMap<&str, &'a Step> = steps.iter().map(|s| (s.name(), *s)).collect();
    let edges: Edges = steps
        .iter()
        .map(|s| (s.name().to_string(), s.after.clone()))
        .collect();

    Ok(sort_levels(&edges)?
        .into_iter()
        .map(|level| {
            level
                .iter()
                .filter_map(|name| by_name.get(name.as_str()).copied())
                .collect()
        })
        .collect())
}

/// Name of a step that has to succeed before `step` may run
fn blocker_of(step: &Step, blocked: &BTreeSet<String>, snapshot: &Snapshot) -> Option<String> {
    if let Some(name) = step.after.iter().find(|d| blocked.contains(*d)) {
        return Some(name.clone());
    }

    // A resource that still points at this one was not updated away from it
    if step.kind() == OpKind::Delete {
        return snapshot
            .resources
            .values()
            .find(|r| blocked.contains(&r.name) && r.dependencies.iter().any(|d| d == step.name()))
            .map(|r| r.name.clone());
    }

    None
}

/// Resolve inputs on the coordinating thread
fn prepare<'a>(step: &'a Step, snapshot: &Snapshot) -> Result<Work<'a>> {
    let previous = snapshot.get(step.name()).cloned();

    let inputs = match &step.decl {
        Some(decl) => resolve_properties(&decl.name, &decl.properties, |name| {
            snapshot.outputs_of(name)
        })?,
        None => {
            if previous.is_none() {
                return Err(Error::NotInState(step.name().to_string()));
            }
            Properties::new()
        }
    };

    Ok(Work {
        step,
        inputs,
        previous,
    })
}

/// Run one step on a worker thread
fn run<P>(provider: &P, ctx: &ApplyContext, work: &Work<'_>) -> Outcome
where
    P: Provider + ?Sized,
{
    let name = work.step.name();

    match apply_step(provider, ctx, work) {
        Ok((result, None)) => Outcome {
            name: name.to_string(),
            removed: result == ApplyResult::Deleted,
            result,
            record: None,
        },
        Ok((result, Some(outputs))) => {
            let record = work
                .step
                .decl
                .as_ref()
                .map(|decl| ResourceRecord {
                    name: decl.name.clone(),
                    resource_type: decl.resource_type.clone(),
                    declared: decl.properties.clone(),
                    inputs: work.inputs.clone(),
                    outputs,
                    dependencies: work.step.after.iter().cloned().collect(),
                    protect: decl.protect,
                    updated_at: Utc::now(),
                })
                .filter(|record| result != ApplyResult::NoChange || metadata_changed(record, work));

            Outcome {
                name: name.to_string(),
                result,
                record,
                removed: false,
            }
        }
        Err(e) => Outcome::without_change(
            name,
            ApplyResult::Failed {
                error: format!("{e:#}"),
            },
        ),
    }
}

/// Call the provider; returns the result and the new outputs (if any)
fn apply_step<P>(
    provider: &P,
    ctx: &ApplyContext,
    work: &Work<'_>,
) -> anyhow::Result<(ApplyResult, Option<Properties>)>
where
    P: Provider + ?Sized,
{
    let step = work.step;
    let previous = work.previous.as_ref();

    let Some(decl) = &step.decl else {
        let record = previous.with_context(|| format!("{} is not in state", step.name()))?;
        provider.delete(ctx, record)?;
        return Ok((ApplyResult::Deleted, None));
    };

    let resource = ResolvedResource {
        name: &decl.name,
        resource_type: &decl.resource_type,
        inputs: &work.inputs,
    };

    match (step.kind(), previous) {
        // Updates planned only because a dependency changed
        (OpKind::Same | OpKind::Update, Some(prev))
            if prev.inputs == work.inputs && prev.declared == decl.properties =>
        {
            Ok((ApplyResult::NoChange, Some(prev.outputs.clone())))
        }
        (OpKind::Same | OpKind::Update, Some(prev)) => {
            provider.check(&resource)?;
            let outputs = provider.update(ctx, &resource, prev)?;
            Ok((ApplyResult::Updated, Some(outputs)))
        }
        (OpKind::Replace, Some(prev)) => {
            provider.check(&resource)?;
            provider
                .delete(ctx, prev)
                .with_context(|| format!("Failed to delete {} before replacing it", decl.name))?;
            let outputs = provider.create(ctx, &resource)?;
            Ok((ApplyResult::Replaced, Some(outputs)))
        }
        (OpKind::Delete, _) => anyhow::bail!("{} is declared but planned for deletion", decl.name),
        _ => {
            provider.check(&resource)?;
            let outputs = provider.create(ctx, &resource)?;
            Ok((ApplyResult::Created, Some(outputs)))
        }
    }
}

fn metadata_changed(record: &ResourceRecord, work: &Work<'_>) -> bool {
    work.previous.as_ref().is_none_or(|prev| {
        prev.dependencies != record.dependencies
            || prev.protect != record.protect
            || prev.declared != record.declared
            || prev.resource_type != record.resource_type
    })
}

/// Persist metadata changes of steps that need no provider call
fn refresh_unchanged<S>(plan: &Plan, snapshot: &mut Snapshot, store: &mut S) -> Result<()>
where
    S: StateStore + ?Sized,
{
    let mut changed = false;
    for step in plan.steps() {
        let (Some(decl), Some(prev)) = (&step.decl, snapshot.get(step.name())) else {
            continue;
        };
        let dependencies: Vec<String> = step.after.iter().cloned().collect();
        if prev.dependencies != dependencies || prev.protect != decl.protect {
            let mut record = prev.clone();
            record.dependencies = dependencies;
            record.protect = decl.protect;
            snapshot.record(record);
            changed = true;
        }
    }
    if changed {
        store.save(snapshot)?;
    }
    Ok(())
}
