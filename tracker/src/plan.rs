//! Plan document model: Plan → Phases → Steps plus the completion history.
//!
//! Phase and step maps are [`IndexMap`]s so the authored order survives a
//! load/save round trip; step order inside a phase is execution order.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};

/// Separator between the phase prefix and the step-local part of a step id.
pub const STEP_SEPARATOR: char = '.';

/// History fields that caller metadata may not shadow.
pub const RESERVED_META_KEYS: [&str; 3] = ["step", "status", "timestamp"];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PlanStatus {
    InProgress,
    Done,
    Paused,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Done,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Done,
    Skipped,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Paused => "paused",
        })
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        })
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Skipped => "skipped",
        })
    }
}

/// Scalar value attached to a completion event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    /// Interpret a CLI-supplied string: booleans, integers, and finite floats
    /// keep their type, anything else is text.
    pub fn parse(raw: &str) -> Self {
        if let Ok(value) = raw.parse::<bool>() {
            return Self::Bool(value);
        }
        if let Ok(value) = raw.parse::<i64>() {
            return Self::Integer(value);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Float(value),
            _ => Self::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Caller metadata, stored inline next to the fixed history fields.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Immutable record of one completion event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub step: String,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub meta: Metadata,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    pub title: String,
    pub status: StepStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    pub title: String,
    pub status: PhaseStatus,
    pub steps: IndexMap<String, Step>,
}

impl Phase {
    /// Step ids in declared (execution) order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.keys().map(String::as_str).collect()
    }

    pub fn first_step_id(&self) -> Option<&str> {
        self.steps.keys().next().map(String::as_str)
    }

    /// The step declared immediately after `step_id`, if any.
    pub fn step_after(&self, step_id: &str) -> Option<&str> {
        let index = self.steps.get_index_of(step_id)?;
        self.steps
            .get_index(index + 1)
            .map(|(id, _)| id.as_str())
    }
}

/// Root aggregate persisted as the plan document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub project: String,
    pub version: String,
    pub current_phase: u32,
    #[serde(default)]
    pub current_step: Option<String>,
    pub status: PlanStatus,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub phases: IndexMap<String, Phase>,
}

/// A step id split into its phase prefix and step-local part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepId<'a> {
    pub phase: &'a str,
    pub local: &'a str,
}

impl<'a> StepId<'a> {
    /// Split `"2.3"` into phase `"2"` and local `"3"`. Only the first separator counts.
    pub fn parse(id: &'a str) -> TrackerResult<Self> {
        match id.split_once(STEP_SEPARATOR) {
            Some((phase, local)) if !phase.is_empty() && !local.is_empty() => {
                Ok(Self { phase, local })
            }
            _ => Err(TrackerError::UnknownStep(id.to_string())),
        }
    }
}

/// Parse a phase key as an ordinal. Only canonical decimal forms are accepted,
/// so `"01"` and `"+1"` are rejected.
pub fn phase_ordinal(phase_id: &str) -> Option<u32> {
    let ordinal = phase_id.parse::<u32>().ok()?;
    (ordinal.to_string() == phase_id).then_some(ordinal)
}

impl Plan {
    pub fn phase(&self, phase_id: &str) -> TrackerResult<&Phase> {
        self.phases
            .get(phase_id)
            .ok_or_else(|| TrackerError::UnknownPhase(phase_id.to_string()))
    }

    pub(crate) fn phase_mut(&mut self, phase_id: &str) -> TrackerResult<&mut Phase> {
        self.phases
            .get_mut(phase_id)
            .ok_or_else(|| TrackerError::UnknownPhase(phase_id.to_string()))
    }

    /// Look up a step by composite id. A missing phase is reported as an unknown step.
    pub fn step(&self, step_id: &str) -> TrackerResult<&Step> {
        let id = StepId::parse(step_id)?;
        self.phases
            .get(id.phase)
            .and_then(|phase| phase.steps.get(step_id))
            .ok_or_else(|| TrackerError::UnknownStep(step_id.to_string()))
    }

    pub(crate) fn step_mut(&mut self, step_id: &str) -> TrackerResult<&mut Step> {
        let id = StepId::parse(step_id)?;
        self.phases
            .get_mut(id.phase)
            .and_then(|phase| phase.steps.get_mut(step_id))
            .ok_or_else(|| TrackerError::UnknownStep(step_id.to_string()))
    }

    pub fn current_phase_id(&self) -> String {
        self.current_phase.to_string()
    }

    /// Phase ids in ascending ordinal order (authored order breaks no ties;
    /// ordinals are unique by construction of canonical keys).
    pub fn phase_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.phases.keys().map(String::as_str).collect();
        ids.sort_by_key(|id| (phase_ordinal(id).unwrap_or(u32::MAX), *id));
        ids
    }

    /// The phase with the smallest ordinal strictly greater than `ordinal`.
    pub fn phase_after(&self, ordinal: u32) -> Option<(u32, &str)> {
        self.phases
            .keys()
            .filter_map(|id| phase_ordinal(id).map(|n| (n, id.as_str())))
            .filter(|(n, _)| *n > ordinal)
            .min_by_key(|(n, _)| *n)
    }

    /// `(done, total)` step counts across all phases.
    pub fn step_counts(&self) -> (usize, usize) {
        self.phases
            .values()
            .flat_map(|phase| phase.steps.values())
            .fold((0, 0), |(done, total), step| {
                let done = done + usize::from(step.status == StepStatus::Done);
                (done, total + 1)
            })
    }

    /// Normalize a template into a freshly started plan: every step pending,
    /// the lowest-ordinal phase in progress with the pointer on its first step,
    /// and an empty history.
    pub fn started(mut self) -> Self {
        let first = self
            .phase_ids()
            .first()
            .and_then(|id| phase_ordinal(id).map(|n| (n, id.to_string())));

        for (id, phase) in &mut self.phases {
            phase.status = match &first {
                Some((_, first_id)) if first_id == id => PhaseStatus::InProgress,
                _ => PhaseStatus::Pending,
            };
            for step in phase.steps.values_mut() {
                step.status = StepStatus::Pending;
            }
        }

        if let Some((ordinal, id)) = first {
            self.current_phase = ordinal;
            self.current_step = self
                .phases
                .get(&id)
                .and_then(Phase::first_step_id)
                .map(str::to_string);
        }
        self.status = PlanStatus::InProgress;
        self.history.clear();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{phase, plan_with_phases, two_phase_plan};

    /// Verifies step ids split into phase and local id at the first dot.
    #[test]
    fn step_id_splits_on_first_separator() {
        let id = StepId::parse("2.3.1").expect("parse");
        assert_eq!(id.phase, "2");
        assert_eq!(id.local, "3.1");
    }

    #[test]
    fn step_id_without_separator_is_unknown_step() {
        let err = StepId::parse("7").expect_err("expected error");
        assert!(matches!(err, TrackerError::UnknownStep(id) if id == "7"));
        assert!(StepId::parse(".a").is_err());
        assert!(StepId::parse("1.").is_err());
    }

    #[test]
    fn step_lookup_reports_missing_phase_and_step_as_unknown_step() {
        let plan = two_phase_plan();
        assert_eq!(plan.step("1.b").expect("step").title, "1.b title");
        assert!(matches!(
            plan.step("9.a"),
            Err(TrackerError::UnknownStep(id)) if id == "9.a"
        ));
        assert!(matches!(
            plan.step("1.z"),
            Err(TrackerError::UnknownStep(id)) if id == "1.z"
        ));
    }

    #[test]
    fn phase_lookup_reports_unknown_phase() {
        let plan = two_phase_plan();
        assert_eq!(plan.phase("2").expect("phase").title, "Phase 2");
        assert!(matches!(plan.phase("3"), Err(TrackerError::UnknownPhase(id)) if id == "3"));
    }

    /// Ensures phase `10` sorts after phase `2`.
    #[test]
    fn phase_ids_sort_numerically_not_lexically() {
        let plan = plan_with_phases(vec![
            ("10", phase("Ten", &["10.a"])),
            ("2", phase("Two", &["2.a"])),
            ("1", phase("One", &["1.a"])),
        ]);
        assert_eq!(plan.phase_ids(), vec!["1", "2", "10"]);
        assert_eq!(plan.phase_after(2), Some((10, "10")));
        assert_eq!(plan.phase_after(10), None);
    }

    /// Verifies declared step order survives a serialize/deserialize cycle.
    #[test]
    fn step_order_is_declared_order_and_survives_serialization() {
        let plan = plan_with_phases(vec![("1", phase("One", &["1.z", "1.a", "1.m"]))]);
        let json = serde_json::to_string(&plan).expect("serialize");
        let loaded: Plan = serde_json::from_str(&json).expect("deserialize");
        let phase = loaded.phase("1").expect("phase");
        assert_eq!(phase.step_ids(), vec!["1.z", "1.a", "1.m"]);
        assert_eq!(phase.step_after("1.z"), Some("1.a"));
        assert_eq!(phase.step_after("1.m"), None);
    }

    /// Verifies history metadata is flattened into the entry object.
    #[test]
    fn history_metadata_is_stored_inline() {
        let mut meta = Metadata::new();
        meta.insert("confirmed_by".to_string(), MetaValue::from("user"));
        meta.insert("attempt".to_string(), MetaValue::from(2_i64));
        let entry = HistoryEntry {
            step: "1.a".to_string(),
            status: StepStatus::Done,
            timestamp: "2024-05-01T10:00:00Z".parse().expect("timestamp"),
            meta,
        };

        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["confirmed_by"], "user");
        assert_eq!(value["attempt"], 2);
        assert_eq!(value["status"], "done");

        let parsed: HistoryEntry = serde_json::from_value(value).expect("deserialize");
        assert_eq!(parsed, entry);
    }

    #[test]
    fn meta_value_parse_keeps_scalar_types() {
        assert_eq!(MetaValue::parse("true"), MetaValue::Bool(true));
        assert_eq!(MetaValue::parse("42"), MetaValue::Integer(42));
        assert_eq!(MetaValue::parse("1.5"), MetaValue::Float(1.5));
        assert_eq!(MetaValue::parse("NaN"), MetaValue::Text("NaN".to_string()));
        assert_eq!(MetaValue::parse("user"), MetaValue::Text("user".to_string()));
    }

    /// Verifies `started()` clears progress and points at the first step.
    #[test]
    fn started_resets_progress_to_first_phase() {
        let mut template = plan_with_phases(vec![
            ("2", phase("Two", &["2.a"])),
            ("1", phase("One", &["1.a", "1.b"])),
        ]);
        template.current_phase = 2;
        template.current_step = Some("2.a".to_string());
        template.status = PlanStatus::Done;
        template.phases["1"].steps["1.a"].status = StepStatus::Done;

        let plan = template.started();
        assert_eq!(plan.current_phase, 1);
        assert_eq!(plan.current_step.as_deref(), Some("1.a"));
        assert_eq!(plan.status, PlanStatus::InProgress);
        assert_eq!(plan.phases["1"].status, PhaseStatus::InProgress);
        assert_eq!(plan.phases["2"].status, PhaseStatus::Pending);
        assert_eq!(plan.step_counts(), (0, 3));
        assert!(plan.history.is_empty());
    }
}
