//! Pipeline run records, persisted to `pipeline-runs/<run-id>.json`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Source,
    Build,
    Deploy,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Source, Stage::Build, Stage::Deploy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Source => "Source",
            Stage::Build => "Build",
            Stage::Deploy => "Deploy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    /// An earlier stage failed
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::InProgress => "IN_PROGRESS",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One command executed inside a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    /// Last lines of combined output
    #[serde(default)]
    pub output_tail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commands: Vec<CommandRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StageRecord {
    pub fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            started_at: None,
            finished_at: None,
            commands: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub source_key: String,
    /// Version of the source object this run built, once fetched
    #[serde(default)]
    pub source_version: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stages: Vec<StageRecord>,
}

impl PipelineRun {
    pub fn new(source_key: impl Into<String>) -> Self {
        let started_at = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            run_id: format!("run-{}-{}", started_at.format("%Y%m%dT%H%M%S"), &suffix[..8]),
            source_key: source_key.into(),
            source_version: None,
            status: RunStatus::InProgress,
            started_at,
            finished_at: None,
            stages: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn record(&mut self, record: StageRecord) {
        self.stages.push(record);
    }

    /// The stage that halted the run, if any
    pub fn failed_stage(&self) -> Option<&StageRecord> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Failed)
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Close the run: stages that never ran are marked skipped
    pub fn finish(&mut self) {
        for stage in Stage::ALL {
            if self.stage(stage).is_none() {
                self.stages.push(StageRecord::skipped(stage));
            }
        }
        self.status = if self.failed_stage().is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(status: StageStatus) -> StageRecord {
        StageRecord {
            status,
            started_at: Some(Utc::now()),
            finished_at: Some(Utc::now()),
            ..StageRecord::skipped(Stage::Source)
        }
    }

    #[test]
    fn test_finish_skips_stages_that_never_ran() {
        let mut run = PipelineRun::new("codegen-output/stack.ts");
        run.record(finished(StageStatus::Succeeded));
        run.record(StageRecord {
            stage: Stage::Build,
            error: Some("tests failed".into()),
            ..finished(StageStatus::Failed)
        });
        run.finish();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.failed_stage().map(|s| s.stage), Some(Stage::Build));
        assert_eq!(
            run.stage(Stage::Deploy).map(|s| s.status),
            Some(StageStatus::Skipped)
        );
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_run_ids_are_unique_key_segments() {
        let a = PipelineRun::new("codegen-output/stack.ts");
        let b = PipelineRun::new("codegen-output/stack.ts");
        assert_ne!(a.run_id, b.run_id);
        assert!(crate::store::keys::is_safe_segment(&a.run_id));
        assert_eq!(a.status.to_string(), "IN_PROGRESS");
    }
}
