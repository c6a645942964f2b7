//! Read-only queries over a plan: progress projection and next-pending lookup.

use crate::core::types::{NextPending, PendingStep, PhaseProgress, Progress, StepProgress};
use crate::error::TrackerResult;
use crate::plan::{PhaseStatus, Plan, PlanStatus, StepStatus, phase_ordinal};

/// Project the current phase and step of `plan`.
pub fn progress(plan: &Plan) -> TrackerResult<Progress> {
    let phase_id = plan.current_phase_id();
    let phase = plan.phase(&phase_id)?;
    let step = match &plan.current_step {
        Some(step_id) => {
            let step = plan.step(step_id)?;
            Some(StepProgress {
                id: step_id.clone(),
                title: step.title.clone(),
                status: step.status,
            })
        }
        None => None,
    };
    let (steps_done, steps_total) = plan.step_counts();

    Ok(Progress {
        project: plan.project.clone(),
        version: plan.version.clone(),
        status: plan.status,
        phase: PhaseProgress {
            id: phase_id,
            title: phase.title.clone(),
            status: phase.status,
        },
        step,
        steps_done,
        steps_total,
    })
}

/// Find the next step that still needs doing.
///
/// Scans the current phase in declared order for an open step (`pending`, or
/// `in-progress` if a document was left mid-step), then the
/// phases after it in ascending ordinal order for the first one not `done`,
/// returning that phase's first step. `current_step` is not consulted
/// here: after the plan finishes it still names the last completed step.
pub fn next_pending(plan: &Plan) -> NextPending {
    if plan.status == PlanStatus::Done {
        return NextPending::NoPendingWork;
    }

    let current_id = plan.current_phase_id();
    if let Some(phase) = plan.phases.get(&current_id) {
        let pending = phase
            .steps
            .iter()
            .find(|(_, step)| {
                matches!(step.status, StepStatus::Pending | StepStatus::InProgress)
            });
        if let Some((step_id, step)) = pending {
            return pending_step(&current_id, step_id, &step.title);
        }
    }

    for phase_id in plan.phase_ids() {
        if !phase_ordinal(phase_id).is_some_and(|ordinal| ordinal > plan.current_phase) {
            continue;
        }
        let phase = &plan.phases[phase_id];
        if phase.status == PhaseStatus::Done {
            continue;
        }
        if let Some((step_id, step)) = phase.steps.first() {
            return pending_step(phase_id, step_id, &step.title);
        }
    }

    NextPending::NoPendingWork
}

fn pending_step(phase_id: &str, step_id: &str, title: &str) -> NextPending {
    NextPending::Step(PendingStep {
        phase_id: phase_id.to_string(),
        step_id: step_id.to_string(),
        title: title.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state_update::complete_step;
    use crate::error::TrackerError;
    use crate::plan::Metadata;
    use crate::test_support::{phase, plan_with_phases, two_phase_plan};
    use chrono::Utc;

    fn next_id(plan: &Plan) -> Option<String> {
        match next_pending(plan) {
            NextPending::Step(step) => Some(step.step_id),
            NextPending::NoPendingWork => None,
        }
    }

    /// Verifies progress reports the pointer and done/total counts.
    #[test]
    fn progress_projects_current_phase_and_step() {
        let plan = two_phase_plan();
        let progress = progress(&plan).expect("progress");
        assert_eq!(progress.project, "demo");
        assert_eq!(progress.status, PlanStatus::InProgress);
        assert_eq!(progress.phase.id, "1");
        assert_eq!(progress.phase.title, "Phase 1");
        assert_eq!(progress.phase.status, PhaseStatus::InProgress);
        let step = progress.step.expect("step");
        assert_eq!(step.id, "1.a");
        assert_eq!(step.title, "1.a title");
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!((progress.steps_done, progress.steps_total), (0, 3));
    }

    #[test]
    fn progress_reports_dangling_phase() {
        let mut plan = two_phase_plan();
        plan.current_phase = 5;
        assert!(matches!(progress(&plan), Err(TrackerError::UnknownPhase(id)) if id == "5"));
    }

    /// Ensures the current phase is scanned before later phases.
    #[test]
    fn next_pending_prefers_current_phase() {
        let plan = two_phase_plan();
        assert_eq!(next_id(&plan).as_deref(), Some("1.a"));
    }

    /// Verifies a step left `in-progress` is still offered, matching what
    /// `complete_step` expects next.
    #[test]
    fn next_pending_offers_in_progress_step() {
        let mut plan = two_phase_plan();
        plan.phases["1"].steps["1.a"].status = StepStatus::InProgress;
        assert_eq!(next_id(&plan).as_deref(), Some("1.a"));

        let mut completed = plan.clone();
        complete_step(&mut completed, "1.a", Metadata::new(), Utc::now()).expect("complete");
        assert_eq!(next_id(&completed).as_deref(), Some("1.b"));
    }

    #[test]
    fn next_pending_scans_forward_when_current_phase_has_no_pending() {
        let mut plan = plan_with_phases(vec![
            ("1", phase("One", &["1.a"])),
            ("2", phase("Two", &["2.a"])),
            ("4", phase("Four", &["4.a", "4.b"])),
        ]);
        plan.phases["1"].steps["1.a"].status = StepStatus::Skipped;
        plan.phases["2"].status = PhaseStatus::Done;

        let next = next_pending(&plan);
        assert_eq!(
            next,
            NextPending::Step(PendingStep {
                phase_id: "4".to_string(),
                step_id: "4.a".to_string(),
                title: "4.a title".to_string(),
            })
        );
    }

    /// Verifies a finished plan has no pending work.
    #[test]
    fn next_pending_is_empty_once_plan_is_done() {
        let mut plan = two_phase_plan();
        let now = Utc::now();
        for id in ["1.a", "1.b", "2.a"] {
            assert_eq!(next_id(&plan).as_deref(), Some(id));
            complete_step(&mut plan, id, Metadata::new(), now).expect("complete");
        }
        assert_eq!(plan.status, PlanStatus::Done);
        assert_eq!(plan.current_step.as_deref(), Some("2.a"));
        assert_eq!(next_pending(&plan), NextPending::NoPendingWork);
    }

    #[test]
    fn next_pending_is_empty_when_nothing_ahead_is_open() {
        let mut plan = two_phase_plan();
        for phase in plan.phases.values_mut() {
            phase.status = PhaseStatus::Done;
            for step in phase.steps.values_mut() {
                step.status = StepStatus::Done;
            }
        }
        assert_eq!(next_pending(&plan), NextPending::NoPendingWork);
    }
}
