//! Structural invariants not expressible via JSON Schema.

use std::sync::LazyLock;

use crate::plan::{PhaseStatus, Plan, PlanStatus, StepId, StepStatus, phase_ordinal};

/// Check structural invariants of a plan document:
/// - at least one phase, each with at least one step
/// - phase keys are canonical ordinals
/// - step keys are `<phase>.<local>` with their own phase as prefix
/// - `current_phase` exists unless the plan is done
/// - `current_step`, when set, belongs to the current phase
/// - history timestamps never decrease
pub fn validate_invariants(plan: &Plan) -> Vec<String> {
    static LOCAL_ID_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

    let mut errors = Vec::new();

    if plan.phases.is_empty() {
        errors.push("plan must have at least one phase".to_string());
    }

    for (phase_id, phase) in &plan.phases {
        if phase_ordinal(phase_id).is_none() {
            errors.push(format!(
                "phase '{}': id must be a canonical non-negative integer",
                phase_id
            ));
        }
        if phase.steps.is_empty() {
            errors.push(format!("phase '{}': must have at least one step", phase_id));
        }
        for step_id in phase.steps.keys() {
            match StepId::parse(step_id) {
                Ok(id) if id.phase != phase_id => errors.push(format!(
                    "phase '{}': step '{}' has phase prefix '{}'",
                    phase_id, step_id, id.phase
                )),
                Ok(id) if !LOCAL_ID_RE.is_match(id.local) => errors.push(format!(
                    "phase '{}': step '{}' has invalid local id '{}'",
                    phase_id, step_id, id.local
                )),
                Ok(_) => {}
                Err(_) => errors.push(format!(
                    "phase '{}': step '{}' must be '<phase>.<step>'",
                    phase_id, step_id
                )),
            }
        }
    }

    let current_phase_id = plan.current_phase_id();
    let current_phase = plan.phases.get(&current_phase_id);
    if current_phase.is_none() && plan.status != PlanStatus::Done {
        errors.push(format!(
            "current_phase {} does not exist",
            plan.current_phase
        ));
    }

    if let Some(step_id) = &plan.current_step {
        match current_phase {
            Some(phase) if !phase.steps.contains_key(step_id) => errors.push(format!(
                "current_step '{}' is not in current phase '{}'",
                step_id, current_phase_id
            )),
            Some(_) => {}
            None if plan.status == PlanStatus::Done => errors.push(format!(
                "current_step '{}' is set but current phase '{}' does not exist",
                step_id, current_phase_id
            )),
            None => {}
        }
    }

    if plan.status != PlanStatus::Done {
        errors.extend(pointer_progress_errors(plan));
    }

    for pair in plan.history.windows(2) {
        if pair[1].timestamp < pair[0].timestamp {
            errors.push(format!(
                "history: entry for '{}' at {} precedes previous entry at {}",
                pair[1].step,
                pair[1].timestamp.to_rfc3339(),
                pair[0].timestamp.to_rfc3339()
            ));
        }
    }

    errors
}

/// While the plan is open, the pointer must sit on the first unfinished work:
/// lower phases are done, the current step is unfinished, and every step
/// declared before it in its phase is finished.
fn pointer_progress_errors(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();

    for (phase_id, phase) in &plan.phases {
        let before_current = phase_ordinal(phase_id).is_some_and(|n| n < plan.current_phase);
        if before_current && phase.status != PhaseStatus::Done {
            errors.push(format!(
                "phase '{}' precedes current phase {} but is {}",
                phase_id, plan.current_phase, phase.status
            ));
        }
    }

    let Some(step_id) = &plan.current_step else {
        return errors;
    };
    let Some(phase) = plan.phases.get(&plan.current_phase_id()) else {
        return errors;
    };
    let Some(position) = phase.steps.get_index_of(step_id) else {
        return errors;
    };
    let current = phase.steps[position].status;
    if is_finished(current) {
        errors.push(format!(
            "current_step '{}' is already {} while the plan is {}",
            step_id, current, plan.status
        ));
    }
    for (earlier_id, earlier) in phase.steps.iter().take(position) {
        if !is_finished(earlier.status) {
            errors.push(format!(
                "step '{}' is {} but precedes current_step '{}'",
                earlier_id, earlier.status, step_id
            ));
        }
    }

    errors
}

fn is_finished(status: StepStatus) -> bool {
    matches!(status, StepStatus::Done | StepStatus::Skipped)
}
