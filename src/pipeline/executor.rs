//! Source → Build → Deploy run execution
//!
//! Stages run strictly in order inside a scratch workspace. The first failing command
//! ends its stage as `Failed` and the run halts there: later stages are recorded as
//! `Skipped`. Nothing is retried or rolled back at this layer. Every finished run is
//! persisted for operators and failures are logged at error level.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::run::{CommandRecord, PipelineRun, Stage, StageRecord, StageStatus};
use super::source::{self, SourceArtifact, SourceRevision};
use crate::store::{keys, put_json, ScopedStore};
use crate::subprocess::{CommandLine, Placeholders, ProcessError, ProcessRunner};

const OUTPUT_TAIL_LINES: usize = 20;

pub struct PipelineExecutor {
    store: ScopedStore,
    runner: Arc<dyn ProcessRunner>,
    config: PipelineConfig,
    source_key: String,
    install: Vec<CommandLine>,
    build: Vec<CommandLine>,
    deploy: Vec<CommandLine>,
}

impl PipelineExecutor {
    /// `store` must carry the pipeline access contract
    pub fn new(
        store: ScopedStore,
        runner: Arc<dyn ProcessRunner>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let parse = |lines: &[String]| -> Result<Vec<CommandLine>, PipelineError> {
            lines
                .iter()
                .filter(|line| !line.trim().is_empty())
                .map(|line| CommandLine::parse(line).map_err(PipelineError::from))
                .collect()
        };
        Ok(Self {
            install: parse(&config.install)?,
            build: parse(&config.build)?,
            deploy: parse(&config.deploy)?,
            source_key: config.source_key(),
            store,
            runner,
            config,
        })
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current version of the trigger object, if any
    pub async fn current_revision(&self) -> Result<Option<SourceRevision>, PipelineError> {
        source::detect(&self.store, &self.source_key).await
    }

    /// Fetch the object at the trigger key as it is now
    pub async fn fetch_current(&self) -> Result<SourceArtifact, PipelineError> {
        source::fetch(&self.store, &self.source_key).await
    }

    /// Run all stages against the current trigger object
    pub async fn execute(&self) -> PipelineRun {
        let source = self.fetch_current().await;
        self.execute_source(source).await
    }

    /// Run all stages against a snapshot taken when its version was detected.
    ///
    /// The trigger key only holds the latest version, so queued arrivals carry their
    /// own content and later uploads cannot change what an earlier run builds.
    pub async fn execute_artifact(&self, artifact: SourceArtifact) -> PipelineRun {
        self.execute_source(Ok(artifact)).await
    }

    async fn execute_source(&self, source: Result<SourceArtifact, PipelineError>) -> PipelineRun {
        let mut run = PipelineRun::new(&self.source_key);
        info!("Pipeline run {} started for {}", run.run_id, self.source_key);

        self.run_stages(&mut run, source).await;
        run.finish();

        match run.failed_stage() {
            Some(failed) => error!(
                "Pipeline run {} failed at {}: {}",
                run.run_id,
                failed.stage,
                failed.error.as_deref().unwrap_or("unknown error")
            ),
            None => info!(
                "Pipeline run {} succeeded (source version {})",
                run.run_id,
                run.source_version.as_deref().unwrap_or("-")
            ),
        }
        self.persist(&run).await;
        run
    }

    async fn run_stages(
        &self,
        run: &mut PipelineRun,
        source: Result<SourceArtifact, PipelineError>,
    ) {
        let started_at = Utc::now();
        let workspace = match tempfile::Builder::new()
            .prefix("chaosforge-pipeline-")
            .tempdir()
        {
            Ok(dir) => dir,
            Err(e) => {
                run.record(failed_stage(Stage::Source, started_at, Vec::new(), e.to_string()));
                return;
            }
        };

        let (artifact, file) = match self.materialize(source, workspace.path()).await {
            Ok(fetched) => fetched,
            Err(e) => {
                run.record(failed_stage(Stage::Source, started_at, Vec::new(), e.to_string()));
                return;
            }
        };
        run.source_version = Some(artifact.revision.version.clone());
        run.record(StageRecord {
            stage: Stage::Source,
            status: StageStatus::Succeeded,
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
            commands: Vec::new(),
            error: None,
        });

        let placeholders = Placeholders::new()
            .with("file", file.to_string_lossy())
            .with("dir", workspace.path().to_string_lossy())
            .with("version", artifact.revision.version.as_str())
            .with("run_id", run.run_id.as_str());

        let build: Vec<&CommandLine> = self.install.iter().chain(self.build.iter()).collect();
        let deploy: Vec<&CommandLine> = self.deploy.iter().collect();
        for (stage, commands) in [(Stage::Build, build), (Stage::Deploy, deploy)] {
            let record = self
                .run_stage(stage, &commands, workspace.path(), &placeholders)
                .await;
            let failed = record.status == StageStatus::Failed;
            run.record(record);
            if failed {
                return;
            }
        }
    }

    async fn materialize(
        &self,
        source: Result<SourceArtifact, PipelineError>,
        workspace: &Path,
    ) -> Result<(SourceArtifact, std::path::PathBuf), PipelineError> {
        let artifact = source?;
        let file = artifact.materialize(workspace).await?;
        debug!(
            "Materialized {} version {} into {}",
            artifact.revision.key,
            artifact.revision.version,
            file.display()
        );
        Ok((artifact, file))
    }

    async fn run_stage(
        &self,
        stage: Stage,
        commands: &[&CommandLine],
        workspace: &Path,
        placeholders: &Placeholders,
    ) -> StageRecord {
        let started_at = Utc::now();
        let mut records = Vec::new();

        for line in commands {
            info!("[{}] {}", stage, line);
            match self.run_command(line, workspace, placeholders).await {
                Ok(record) if record.exit_code == Some(0) => records.push(record),
                Ok(record) => {
                    let reason = format!(
                        "'{}' exited with {}",
                        line,
                        record
                            .exit_code
                            .map(|c| format!("code {}", c))
                            .unwrap_or_else(|| "no exit code".to_string())
                    );
                    records.push(record);
                    return failed_stage(stage, started_at, records, reason);
                }
                Err(e) => {
                    let reason = format!("'{}' could not run: {}", line, e);
                    return failed_stage(stage, started_at, records, reason);
                }
            }
        }

        StageRecord {
            stage,
            status: StageStatus::Succeeded,
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
            commands: records,
            error: None,
        }
    }

    async fn run_command(
        &self,
        line: &CommandLine,
        workspace: &Path,
        placeholders: &Placeholders,
    ) -> Result<CommandRecord, ProcessError> {
        let command = line
            .to_builder(placeholders)?
            .current_dir(workspace)
            .timeout(self.config.command_timeout)
            .inherit_env(&self.config.pass_env)
            .build();
        let output = self.runner.run(command).await?;
        Ok(CommandRecord {
            command: line.to_string(),
            exit_code: output.status.code(),
            duration_ms: output.duration.as_millis() as u64,
            output_tail: tail(&output.combined_output(), OUTPUT_TAIL_LINES),
        })
    }

    async fn persist(&self, run: &PipelineRun) {
        let key = keys::pipeline_run_key(&run.run_id);
        if let Err(e) = put_json(&self.store, &key, run).await {
            warn!("Failed to persist pipeline run {}: {}", key, e);
        }
    }
}

fn failed_stage(
    stage: Stage,
    started_at: chrono::DateTime<Utc>,
    commands: Vec<CommandRecord>,
    reason: String,
) -> StageRecord {
    StageRecord {
        stage,
        status: StageStatus::Failed,
        started_at: Some(started_at),
        finished_at: Some(Utc::now()),
        commands,
        error: Some(reason),
    }
}

fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
