//! The single transition rule of the plan: completing a step.

use chrono::{DateTime, Utc};

use crate::core::types::CompletionSummary;
use crate::error::{TrackerError, TrackerResult};
use crate::plan::{
    HistoryEntry, MetaValue, Metadata, PhaseStatus, Plan, PlanStatus, RESERVED_META_KEYS, StepId,
    StepStatus, phase_ordinal,
};

/// Where the plan pointer goes once the step is done.
enum Advance {
    /// Next step within the same phase.
    Step(String),
    /// First step of the next-higher phase.
    Phase { ordinal: u32, id: String, first_step: Option<String> },
    /// No phase remains; the plan is finished.
    Finish,
}

/// Mark `step_id` done, append its history entry, and advance the plan pointer.
///
/// Every precondition is checked before the plan is touched, so an error leaves
/// `plan` unchanged. The history timestamp is `now` clamped to the previous
/// entry so the log never goes backwards.
pub fn complete_step(
    plan: &mut Plan,
    step_id: &str,
    meta: Metadata,
    now: DateTime<Utc>,
) -> TrackerResult<CompletionSummary> {
    let id = StepId::parse(step_id)?;
    if plan.step(step_id)?.status == StepStatus::Done {
        return Err(TrackerError::AlreadyComplete(step_id.to_string()));
    }
    if let Some(key) = meta
        .keys()
        .find(|key| RESERVED_META_KEYS.contains(&key.as_str()))
    {
        return Err(TrackerError::ReservedMetadataKey(key.clone()));
    }
    if let Some(key) = meta
        .iter()
        .find(|(_, value)| matches!(value, MetaValue::Float(f) if !f.is_finite()))
        .map(|(key, _)| key)
    {
        return Err(TrackerError::NonFiniteMetadata(key.clone()));
    }
    match expected_step(plan) {
        Some(expected) if expected == step_id => {}
        expected => {
            return Err(TrackerError::OutOfOrder {
                step: step_id.to_string(),
                expected: expected.unwrap_or_else(|| "<none>".to_string()),
            });
        }
    }

    let phase_id = id.phase.to_string();
    let advance = match plan.phase(&phase_id)?.step_after(step_id) {
        Some(next) => Advance::Step(next.to_string()),
        None => {
            let ordinal = phase_ordinal(&phase_id)
                .ok_or_else(|| TrackerError::UnknownPhase(phase_id.clone()))?;
            match plan.phase_after(ordinal) {
                Some((ordinal, id)) => Advance::Phase {
                    ordinal,
                    id: id.to_string(),
                    first_step: plan.phase(id)?.first_step_id().map(str::to_string),
                },
                None => Advance::Finish,
            }
        }
    };

    plan.step_mut(step_id)?.status = StepStatus::Done;
    let timestamp = plan
        .history
        .last()
        .map_or(now, |last| last.timestamp.max(now));
    plan.history.push(HistoryEntry {
        step: step_id.to_string(),
        status: StepStatus::Done,
        timestamp,
        meta,
    });

    let mut phase_completed = false;
    match advance {
        Advance::Step(next) => plan.current_step = Some(next),
        Advance::Phase {
            ordinal,
            id,
            first_step,
        } => {
            plan.phase_mut(&phase_id)?.status = PhaseStatus::Done;
            plan.phase_mut(&id)?.status = PhaseStatus::InProgress;
            plan.current_phase = ordinal;
            plan.current_step = first_step;
            phase_completed = true;
        }
        Advance::Finish => {
            plan.phase_mut(&phase_id)?.status = PhaseStatus::Done;
            plan.status = PlanStatus::Done;
            phase_completed = true;
        }
    }

    Ok(CompletionSummary {
        step_id: step_id.to_string(),
        phase_id,
        phase_completed,
        current_phase: plan.current_phase,
        current_step: plan.current_step.clone(),
        plan_done: plan.status == PlanStatus::Done,
    })
}

/// The step the plan expects to be completed next: the current-step pointer,
/// or the first open step of the current phase when the pointer is unset.
fn expected_step(plan: &Plan) -> Option<String> {
    if let Some(current) = &plan.current_step {
        return Some(current.clone());
    }
    let phase = plan.phases.get(&plan.current_phase_id())?;
    phase
        .steps
        .iter()
        .find(|(_, step)| {
            matches!(step.status, StepStatus::Pending | StepStatus::InProgress)
        })
        .map(|(id, _)| id.clone())
}
