// Per-subject run report, written next to the subject's data

use crate::domain::{InputInventory, Modality, Step};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectStatus::Running => write!(f, "RUNNING"),
            SubjectStatus::Completed => write!(f, "COMPLETED"),
            SubjectStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: Step,
    pub actions: usize,
    pub invocations_run: usize,
    pub invocations_skipped: usize,
    pub duration_ms: i64,
}

impl StepReport {
    pub fn new(step: Step, actions: usize) -> Self {
        Self {
            step,
            actions,
            invocations_run: 0,
            invocations_skipped: 0,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectReport {
    pub subject: String,
    pub run_id: Option<String>,
    pub started_at: i64, // epoch ms
    pub finished_at: Option<i64>,
    pub present: Vec<Modality>,
    pub missing: Vec<Modality>,
    pub steps: Vec<StepReport>,
    pub status: SubjectStatus,
    pub error: Option<String>,
}

impl SubjectReport {
    pub fn start(subject: impl Into<String>, run_id: Option<String>, now: i64) -> Self {
        Self {
            subject: subject.into(),
            run_id,
            started_at: now,
            finished_at: None,
            present: Vec::new(),
            missing: Vec::new(),
            steps: Vec::new(),
            status: SubjectStatus::Running,
            error: None,
        }
    }

    pub fn record_inventory(&mut self, inventory: &InputInventory) {
        self.present = inventory.present().map(|(m, _)| m).collect();
        self.missing = inventory.missing();
    }

    pub fn finish(&mut self, now: i64, error: Option<String>) {
        self.finished_at = Some(now);
        self.status = if error.is_some() {
            SubjectStatus::Failed
        } else {
            SubjectStatus::Completed
        };
        self.error = error;
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at.map(|f| f - self.started_at)
    }

    pub fn is_success(&self) -> bool {
        self.status == SubjectStatus::Completed
    }
}
