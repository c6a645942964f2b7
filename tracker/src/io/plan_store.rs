//! Plan document load/save with schema + invariant validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::invariants::validate_invariants;
use crate::error::{TrackerError, TrackerResult};
use crate::io::backup;
use crate::io::config::TrackerConfig;
use crate::io::storage::{read_optional, write_atomic};
use crate::plan::Plan;

const PLAN_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/plan/v1.schema.json"
));

/// Result of first-time initialization.
#[derive(Debug, Clone)]
pub struct InitOutcome {
    /// The plan as persisted (normalized to its started state).
    pub plan: Plan,
    /// Snapshot of the document that a forced reset replaced.
    pub replaced_backup: Option<PathBuf>,
}

/// Durable home of the plan document.
#[derive(Debug, Clone)]
pub struct PlanStore {
    plan_path: PathBuf,
    backup_dir: PathBuf,
    io_timeout: Duration,
}

impl PlanStore {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            plan_path: config.plan_path.clone(),
            backup_dir: config.backup_dir.clone(),
            io_timeout: config.io_timeout(),
        }
    }

    pub fn plan_path(&self) -> &Path {
        &self.plan_path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    pub fn exists(&self) -> bool {
        self.plan_path.exists()
    }

    /// Load and validate the plan document (schema + invariants).
    ///
    /// A missing file is `NotInitialized`; anything unreadable as a plan is `Corrupt`.
    pub fn load(&self) -> TrackerResult<Plan> {
        debug!(path = %self.plan_path.display(), "loading plan");
        let bytes = read_optional("read plan", &self.plan_path, self.io_timeout)?.ok_or_else(
            || TrackerError::NotInitialized {
                path: self.plan_path.clone(),
            },
        )?;
        let plan = parse_plan(&self.plan_path, &bytes)?;
        debug!(
            current_phase = plan.current_phase,
            current_step = ?plan.current_step,
            status = %plan.status,
            "plan loaded"
        );
        Ok(plan)
    }

    /// Atomically persist `plan`.
    ///
    /// The plan must pass the invariants and its serialized form must pass the
    /// schema, so `save` never writes a document that `load` would reject.
    pub fn save(&self, plan: &Plan) -> TrackerResult<()> {
        let errors = validate_invariants(plan);
        if !errors.is_empty() {
            return Err(TrackerError::corrupt(
                &self.plan_path,
                format!("refusing to save: {}", errors.join("; ")),
            ));
        }
        let mut buf = serde_json::to_string_pretty(plan)
            .map_err(|err| TrackerError::corrupt(&self.plan_path, format!("serialize: {err}")))?;
        let written: Value = serde_json::from_str(&buf)
            .map_err(|err| TrackerError::corrupt(&self.plan_path, format!("reparse: {err}")))?;
        validate_schema(&written).map_err(|reason| {
            TrackerError::corrupt(&self.plan_path, format!("refusing to save: {reason}"))
        })?;
        buf.push('\n');
        debug!(path = %self.plan_path.display(), history = plan.history.len(), "saving plan");
        write_atomic("write plan", &self.plan_path, buf.into_bytes(), self.io_timeout)
    }

    /// Read and validate a template document.
    pub fn load_template(&self, path: &Path) -> TrackerResult<Plan> {
        debug!(path = %path.display(), "loading template");
        let bytes = read_optional("read template", path, self.io_timeout)?.ok_or_else(|| {
            TrackerError::io(
                "read template",
                path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )
        })?;
        parse_plan(path, &bytes)
    }

    /// First-time creation of the plan document from `template`.
    ///
    /// Refuses to replace an existing document unless `force` is set; a forced
    /// reset snapshots the old document first.
    pub fn initialize_from_template(&self, template: Plan, force: bool) -> TrackerResult<InitOutcome> {
        let mut replaced_backup = None;
        if self.exists() {
            if !force {
                return Err(TrackerError::AlreadyInitialized {
                    path: self.plan_path.clone(),
                });
            }
            replaced_backup = Some(self.snapshot()?);
        }

        let plan = template.started();
        self.save(&plan)?;
        info!(
            path = %self.plan_path.display(),
            project = %plan.project,
            forced = replaced_backup.is_some(),
            "plan initialized"
        );
        Ok(InitOutcome {
            plan,
            replaced_backup,
        })
    }

    /// Raw copy of the persisted document into the backup directory.
    pub fn snapshot(&self) -> TrackerResult<PathBuf> {
        backup::snapshot(&self.plan_path, &self.backup_dir, self.io_timeout)
    }
}

/// Parse bytes as a plan: JSON, then schema, then structural invariants.
pub fn parse_plan(path: &Path, bytes: &[u8]) -> TrackerResult<Plan> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| TrackerError::corrupt(path, format!("parse json: {err}")))?;
    validate_schema(&value).map_err(|reason| TrackerError::corrupt(path, reason))?;
    let plan: Plan = serde_json::from_value(value)
        .map_err(|err| TrackerError::corrupt(path, format!("deserialize plan: {err}")))?;
    let errors = validate_invariants(&plan);
    if !errors.is_empty() {
        return Err(TrackerError::corrupt(
            path,
            format!("plan invariants failed: {}", errors.join("; ")),
        ));
    }
    Ok(plan)
}

fn validate_schema(plan: &Value) -> Result<(), String> {
    let schema: Value =
        serde_json::from_str(PLAN_SCHEMA).map_err(|err| format!("parse plan schema: {err}"))?;
    let compiled = validator_for(&schema).map_err(|err| format!("invalid schema: {err}"))?;
    if !compiled.is_valid(plan) {
        let messages = compiled
            .iter_errors(plan)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(format!("schema validation failed: {}", messages.join("; ")));
    }
    Ok(())
}
