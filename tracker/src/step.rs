//! Orchestration for completing steps.
//!
//! Each entry point is one "load, transform, save" unit: the plan is loaded,
//! the transition is applied in memory, and the result is persisted before
//! returning. A failure at any point leaves the stored plan as it was.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::core::state_update;
use crate::core::types::CompletionSummary;
use crate::error::TrackerError;
use crate::io::hook::{HookOutcome, HookRequest, StepHook};
use crate::io::plan_store::PlanStore;
use crate::plan::{MetaValue, Metadata, Plan};

/// Metadata key recording who confirmed a manual step.
pub const CONFIRMED_BY_KEY: &str = "confirmed_by";
/// Metadata key recording how a step was executed.
pub const EXECUTION_MODE_KEY: &str = "execution_mode";

/// Result of a persisted completion.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub summary: CompletionSummary,
    /// The plan as persisted after the completion.
    pub plan: Plan,
}

/// Result of a manual confirmation (completion plus snapshot).
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub step: StepOutcome,
    pub backup: PathBuf,
}

/// Settings for running a scripted step through a hook.
#[derive(Debug, Clone)]
pub struct ScriptedStepConfig {
    pub workdir: PathBuf,
    pub timeout: Duration,
}

/// Mark `step_id` done and persist the advanced plan.
pub fn complete_step(store: &PlanStore, step_id: &str, meta: Metadata) -> Result<StepOutcome> {
    let mut plan = store.load()?;
    let summary = state_update::complete_step(&mut plan, step_id, meta, Utc::now())?;
    store
        .save(&plan)
        .with_context(|| format!("persist completion of {step_id}"))?;

    info!(
        step = %summary.step_id,
        phase_completed = summary.phase_completed,
        current_phase = summary.current_phase,
        current_step = ?summary.current_step,
        plan_done = summary.plan_done,
        "step completed"
    );
    Ok(StepOutcome { summary, plan })
}

/// Complete a manually confirmed step, then snapshot the persisted plan.
///
/// The completion is durable before the snapshot is taken. If the snapshot
/// fails, the error says so; retrying the confirmation would then fail with
/// `AlreadyComplete`, so callers should retry with `tracker snapshot` instead.
pub fn confirm_step(
    store: &PlanStore,
    step_id: &str,
    confirmed_by: &str,
    mut meta: Metadata,
) -> Result<ConfirmOutcome> {
    meta.insert(
        CONFIRMED_BY_KEY.to_string(),
        MetaValue::from(confirmed_by),
    );
    let step = complete_step(store, step_id, meta)?;
    let backup = store
        .snapshot()
        .with_context(|| format!("step {step_id} completed; snapshot failed"))?;
    Ok(ConfirmOutcome { step, backup })
}

/// Run a scripted step through `hook` and record it as done on success.
///
/// Preconditions are checked against the loaded plan before the hook runs, so
/// an unknown, finished, or out-of-order step never reaches the hook.
pub fn run_scripted_step<H: StepHook + ?Sized>(
    store: &PlanStore,
    hook: &H,
    step_id: &str,
    config: &ScriptedStepConfig,
) -> Result<StepOutcome> {
    let plan = store.load()?;
    let mut preview = plan.clone();
    state_update::complete_step(&mut preview, step_id, scripted_meta(), Utc::now())?;
    let title = plan.step(step_id)?.title.clone();

    let request = HookRequest {
        step_id: step_id.to_string(),
        step_title: title,
        workdir: config.workdir.clone(),
        timeout: config.timeout,
    };
    match hook
        .run(&request)
        .with_context(|| format!("run hook for {step_id}"))?
    {
        HookOutcome::Succeeded => complete_step(store, step_id, scripted_meta()),
        HookOutcome::Failed(reason) => Err(TrackerError::HookFailed {
            step: step_id.to_string(),
            reason,
        }
        .into()),
    }
}

fn scripted_meta() -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(
        EXECUTION_MODE_KEY.to_string(),
        MetaValue::from("scripted"),
    );
    meta
}
