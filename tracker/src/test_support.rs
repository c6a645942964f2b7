//! Test-only helpers for constructing plans and scratch workspaces.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tempfile::TempDir;

use crate::io::config::TrackerConfig;
use crate::io::plan_store::PlanStore;
use crate::plan::{Phase, PhaseStatus, Plan, PlanStatus, Step, StepStatus};

/// Create a pending step with a deterministic title.
pub fn step(id: &str) -> Step {
    Step {
        title: format!("{id} title"),
        status: StepStatus::Pending,
    }
}

/// Create a pending phase whose steps appear in the given order.
pub fn phase(title: &str, step_ids: &[&str]) -> Phase {
    Phase {
        title: title.to_string(),
        status: PhaseStatus::Pending,
        steps: step_ids
            .iter()
            .map(|id| (id.to_string(), step(id)))
            .collect(),
    }
}

/// Create a plan from `(phase id, phase)` pairs, normalized to its started state.
pub fn plan_with_phases(phases: Vec<(&str, Phase)>) -> Plan {
    let phases: IndexMap<String, Phase> = phases
        .into_iter()
        .map(|(id, phase)| (id.to_string(), phase))
        .collect();
    Plan {
        project: "demo".to_string(),
        version: "1.0.0".to_string(),
        current_phase: 0,
        current_step: None,
        status: PlanStatus::InProgress,
        history: Vec::new(),
        phases,
    }
    .started()
}

/// Phase `"1"` with steps `1.a`, `1.b`; phase `"2"` with step `2.a`.
pub fn two_phase_plan() -> Plan {
    plan_with_phases(vec![
        ("1", phase("Phase 1", &["1.a", "1.b"])),
        ("2", phase("Phase 2", &["2.a"])),
    ])
}

/// Scratch project root with a config pointing inside it.
pub struct TestWorkspace {
    temp: TempDir,
    pub config: TrackerConfig,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let config = TrackerConfig::default().resolve(temp.path());
        Ok(Self { temp, config })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn store(&self) -> PlanStore {
        PlanStore::new(&self.config)
    }

    /// Write `plan` as the template file and return its path.
    pub fn write_template(&self, plan: &Plan) -> Result<PathBuf> {
        let path = self.config.template_path.clone();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let mut buf = serde_json::to_string_pretty(plan)?;
        buf.push('\n');
        std::fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Persist `plan` directly as the current plan document.
    pub fn seed(&self, plan: &Plan) -> Result<()> {
        self.store().save(plan).context("seed plan")
    }
}
