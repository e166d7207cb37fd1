//! Job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::brief::Brief;

/// One end-to-end song generation request.
///
/// Structure shared between the server (persists and drives stages) and
/// clients (read job state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub brief: Brief,
    /// Effective lyrics once the lyrics stage has succeeded.
    pub lyrics: Option<String>,
    pub stages: StageStatuses,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    /// Creates a fresh job for a brief with every stage not yet run.
    pub fn new(brief: Brief) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            brief,
            lyrics: None,
            stages: StageStatuses::default(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the outcome of a stage.
    ///
    /// A failure stores `error` as the job's last error; success leaves the
    /// previous error in place for inspection.
    pub fn mark(&mut self, stage: Stage, status: StageStatus, error: Option<String>) {
        self.stages.set(stage, status);
        if status == StageStatus::Failed {
            self.last_error = error;
        }
        self.updated_at = chrono::Utc::now();
    }
}

/// A pipeline step with its own outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lyrics,
    Melody,
    Score,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Lyrics => "lyrics",
            Stage::Melody => "melody",
            Stage::Score => "score",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    NotRun,
    Succeeded,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::NotRun => "not_run",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed => "failed",
        }
    }

    /// Parses the persisted representation; unknown values read as `NotRun`.
    pub fn parse(value: &str) -> Self {
        match value {
            "succeeded" => StageStatus::Succeeded,
            "failed" => StageStatus::Failed,
            _ => StageStatus::NotRun,
        }
    }
}

/// Status of every stage of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageStatuses {
    pub lyrics: StageStatus,
    pub melody: StageStatus,
    pub score: StageStatus,
}

impl StageStatuses {
    pub fn get(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Lyrics => self.lyrics,
            Stage::Melody => self.melody,
            Stage::Score => self.score,
        }
    }

    pub fn set(&mut self, stage: Stage, status: StageStatus) {
        match stage {
            Stage::Lyrics => self.lyrics = status,
            Stage::Melody => self.melody = status,
            Stage::Score => self.score = status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_has_nothing_run() {
        let job = Job::new(Brief::default());
        assert_eq!(job.stages, StageStatuses::default());
        assert_eq!(job.stages.get(Stage::Melody), StageStatus::NotRun);
        assert!(job.lyrics.is_none());
    }

    #[test]
    fn test_mark_failure_records_error() {
        let mut job = Job::new(Brief::default());
        job.mark(Stage::Melody, StageStatus::Failed, Some("timeout".to_string()));

        assert_eq!(job.stages.melody, StageStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("timeout"));

        job.mark(Stage::Melody, StageStatus::Succeeded, None);
        assert_eq!(job.stages.melody, StageStatus::Succeeded);
        assert_eq!(job.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_stage_status_persisted_form() {
        for status in [StageStatus::NotRun, StageStatus::Succeeded, StageStatus::Failed] {
            assert_eq!(StageStatus::parse(status.as_str()), status);
        }
        assert_eq!(StageStatus::parse("garbage"), StageStatus::NotRun);
    }
}
