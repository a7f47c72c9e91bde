//! Trigger: watch the source key and feed new versions to a single worker
//!
//! The watcher polls the trigger key and enqueues a snapshot of every version it has
//! not seen. One worker drains the FIFO queue, so runs never interleave within a
//! pipeline instance and each arrival is built from its own content. When the queue
//! is full the watcher waits before polling again.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::error::PipelineError;
use super::executor::PipelineExecutor;
use super::source::SourceArtifact;

/// Runs processed by a worker before its queue closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub runs: usize,
    pub failed: usize,
}

/// Start the worker that executes one run per queued source snapshot
pub fn spawn_worker(
    executor: Arc<PipelineExecutor>,
    capacity: usize,
) -> (mpsc::Sender<SourceArtifact>, JoinHandle<WorkerReport>) {
    let (tx, mut rx) = mpsc::channel::<SourceArtifact>(capacity.max(1));
    let handle = tokio::spawn(async move {
        let mut report = WorkerReport::default();
        while let Some(artifact) = rx.recv().await {
            debug!(
                "Dequeued {} version {} ({} waiting)",
                artifact.revision.key,
                artifact.revision.version,
                rx.len()
            );
            let run = executor.execute_artifact(artifact).await;
            report.runs += 1;
            if !run.succeeded() {
                report.failed += 1;
            }
        }
        report
    });
    (tx, handle)
}

pub struct PipelineWatcher {
    executor: Arc<PipelineExecutor>,
    last_seen: Option<String>,
}

impl PipelineWatcher {
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        Self {
            executor,
            last_seen: None,
        }
    }

    /// Treat the version present now as already deployed
    pub async fn with_baseline(mut self) -> Result<Self, PipelineError> {
        self.last_seen = self
            .executor
            .current_revision()
            .await?
            .map(|revision| revision.version);
        if let Some(version) = &self.last_seen {
            info!(
                "Watching {} from version {}",
                self.executor.source_key(),
                version
            );
        }
        Ok(self)
    }

    /// Snapshot the trigger object when its version differs from the last one seen
    pub async fn poll(&mut self) -> Result<Option<SourceArtifact>, PipelineError> {
        let Some(revision) = self.executor.current_revision().await? else {
            return Ok(None);
        };
        if self.last_seen.as_deref() == Some(revision.version.as_str()) {
            return Ok(None);
        }
        let artifact = match self.executor.fetch_current().await {
            Ok(artifact) => artifact,
            // Deleted between head and get
            Err(PipelineError::SourceMissing(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if artifact.revision.version != revision.version {
            debug!(
                "{} moved from {} to {} while polling",
                revision.key, revision.version, artifact.revision.version
            );
        }
        self.last_seen = Some(artifact.revision.version.clone());
        Ok(Some(artifact))
    }

    /// Poll until `shutdown` resolves, then drain the queue
    pub async fn run<S>(mut self, shutdown: S) -> Result<WorkerReport, PipelineError>
    where
        S: Future<Output = ()>,
    {
        let poll_interval = self.executor.config().poll_interval;
        let capacity = self.executor.config().queue_capacity;
        let (tx, worker) = spawn_worker(Arc::clone(&self.executor), capacity);
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Pipeline watching {} every {:?}",
            self.executor.source_key(),
            poll_interval
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.poll().await {
                        Ok(Some(artifact)) => {
                            info!(
                                "New source version {} at {}",
                                artifact.revision.version, artifact.revision.key
                            );
                            if tx.send(artifact).await.is_err() {
                                return Err(PipelineError::QueueClosed);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Polling {} failed: {}", self.executor.source_key(), e),
                    }
                }
            }
        }

        drop(tx);
        worker.await.map_err(|_| PipelineError::QueueClosed)
    }
}
