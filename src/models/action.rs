use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::control::ObjectKind;
use super::fabric::FabricMode;
use crate::error::ZtpError;

/// What happened to one object during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Created,
    AlreadyExists,
    Modified,
    Deleted,
    Skipped(String),
}

/// ActionEntry is one line of the run's action log
#[derive(Debug, Clone, Serialize)]
pub struct ActionEntry {
    pub switch: String,
    pub object: ObjectKind,
    pub name: String,
    pub outcome: Outcome,
    pub at: DateTime<Utc>,
}

/// Ordered log of actions taken against the fabric
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionLog {
    entries: Vec<ActionEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, switch: &str, object: ObjectKind, name: &str, outcome: Outcome) {
        match &outcome {
            Outcome::Created => tracing::info!("Created {} {} on {}", object, name, switch),
            Outcome::Modified => tracing::info!("Modified {} {} on {}", object, name, switch),
            Outcome::Deleted => tracing::info!("Deleted {} {} on {}", object, name, switch),
            Outcome::AlreadyExists => {
                tracing::debug!("{} {} already exists on {}", object, name, switch)
            }
            Outcome::Skipped(reason) => {
                tracing::warn!("Skipped {} {} on {}: {}", object, name, switch, reason)
            }
        }
        self.entries.push(ActionEntry {
            switch: switch.to_string(),
            object,
            name: name.to_string(),
            outcome,
            at: Utc::now(),
        });
    }

    /// Entries with the given outcome for the given object kind
    pub fn count(&self, object: ObjectKind, outcome: &Outcome) -> usize {
        self.entries
            .iter()
            .filter(|e| e.object == object && &e.outcome == outcome)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Final status of a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed { kind: String, error: String },
}

/// FabricRun is the report returned for every run, successful or not
#[derive(Debug, Clone, Serialize)]
pub struct FabricRun {
    pub run_id: Uuid,
    pub mode: FabricMode,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// Leaves left without a cluster partner
    pub unpaired_leaves: Vec<String>,
    pub actions: ActionLog,
}

impl FabricRun {
    pub fn start(mode: FabricMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Success,
            unpaired_leaves: Vec::new(),
            actions: ActionLog::new(),
        }
    }

    pub fn finish(&mut self, result: Result<(), ZtpError>) {
        self.finished_at = Some(Utc::now());
        self.status = match result {
            Ok(()) => RunStatus::Success,
            Err(e) => RunStatus::Failed {
                kind: e.kind().to_string(),
                error: e.to_string(),
            },
        };
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, RunStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_log_counts_by_kind_and_outcome() {
        let mut log = ActionLog::new();
        assert!(log.is_empty());
        log.record("leaf1", ObjectKind::Trunk, "leaf1-to-spine1", Outcome::Created);
        log.record("leaf1", ObjectKind::Trunk, "leaf1-to-spine2", Outcome::AlreadyExists);
        log.record("leaf2", ObjectKind::Trunk, "leaf2-to-spine1", Outcome::Created);
        assert_eq!(log.len(), 3);
        assert!(!log.is_empty());
        assert_eq!(log.count(ObjectKind::Trunk, &Outcome::Created), 2);
        assert_eq!(log.count(ObjectKind::Vlag, &Outcome::Created), 0);
    }

    #[test]
    fn test_failed_run_serializes_error_kind() {
        let mut run = FabricRun::start(FabricMode::Layer2);
        run.finish(Err(ZtpError::TopologyIncomplete("no spines".to_string())));
        assert!(!run.succeeded());
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"]["status"], "failed");
        assert_eq!(json["status"]["kind"], "topology_incomplete");
        assert_eq!(json["mode"], "layer2");
    }
}
