//! End-to-end lifecycle through the library: start, work through every step,
//! snapshot, and restore.

use std::fs;

use tracker::core::types::NextPending;
use tracker::error::TrackerError;
use tracker::io::backup::{list_snapshots, restore};
use tracker::plan::{Metadata, PhaseStatus, PlanStatus, StepStatus};
use tracker::select::{history_from_store, next_from_store, progress_from_store};
use tracker::start::start_plan;
use tracker::step::complete_step;
use tracker::test_support::{TestWorkspace, phase, plan_with_phases, two_phase_plan};

/// Verifies repeated `next` + `complete` converges on a done plan with one
/// history entry per step, in declared order.
#[test]
fn working_through_plan_converges_to_done() {
    let ws = TestWorkspace::new().expect("workspace");
    let template = plan_with_phases(vec![
        ("1", phase("Setup", &["1.1", "1.2"])),
        ("2", phase("Build", &["2.1", "2.2", "2.3"])),
        ("3", phase("Ship", &["3.1"])),
    ]);
    let template_path = ws.write_template(&template).expect("template");
    let store = ws.store();
    start_plan(&store, &template_path, false).expect("start");

    let mut completed = Vec::new();
    while let NextPending::Step(step) = next_from_store(&store).expect("next") {
        complete_step(&store, &step.step_id, Metadata::new()).expect("complete");
        completed.push(step.step_id);
        assert!(completed.len() <= 6, "did not converge");
    }

    assert_eq!(completed, ["1.1", "1.2", "2.1", "2.2", "2.3", "3.1"]);
    let plan = store.load().expect("load");
    assert_eq!(plan.status, PlanStatus::Done);
    assert!(plan.phases.values().all(|p| p.status == PhaseStatus::Done));
    assert!(
        plan.phases
            .values()
            .flat_map(|p| p.steps.values())
            .all(|s| s.status == StepStatus::Done)
    );

    let history = history_from_store(&store).expect("history");
    let steps: Vec<&str> = history.iter().map(|e| e.step.as_str()).collect();
    assert_eq!(steps, completed);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let progress = progress_from_store(&store).expect("progress");
    assert_eq!((progress.steps_done, progress.steps_total), (6, 6));
}

/// Verifies a snapshot is byte-identical to the saved document and that
/// restoring it rewinds the plan.
#[test]
fn snapshot_and_restore_round_trip() {
    let ws = TestWorkspace::new().expect("workspace");
    ws.seed(&two_phase_plan()).expect("seed");
    let store = ws.store();

    complete_step(&store, "1.a", Metadata::new()).expect("1.a");
    let snapshot = store.snapshot().expect("snapshot");
    assert_eq!(
        fs::read(&snapshot).expect("read snapshot"),
        fs::read(store.plan_path()).expect("read plan")
    );

    complete_step(&store, "1.b", Metadata::new()).expect("1.b");
    assert_eq!(store.load().expect("load").current_phase, 2);

    let outcome = restore(&store, &snapshot).expect("restore");
    assert!(outcome.previous_backup.is_some());
    let plan = store.load().expect("load");
    assert_eq!(plan.current_step.as_deref(), Some("1.b"));
    assert_eq!(plan.history.len(), 1);

    let snapshots = list_snapshots(store.backup_dir(), store.io_timeout()).expect("list");
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0], snapshot);
}

#[test]
fn restore_rejects_corrupt_snapshot() {
    let ws = TestWorkspace::new().expect("workspace");
    ws.seed(&two_phase_plan()).expect("seed");
    let store = ws.store();
    let before = fs::read(store.plan_path()).expect("read");

    let bogus = ws.root().join("bogus.json");
    fs::write(&bogus, r#"{"project": "demo"}"#).expect("write");
    let err = restore(&store, &bogus).expect_err("expected error");
    assert!(matches!(err, TrackerError::Corrupt { .. }));
    assert_eq!(fs::read(store.plan_path()).expect("read"), before);
}
