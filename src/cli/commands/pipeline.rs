use anyhow::Result;
use tracing::info;

use crate::app::App;
use crate::config::ChaosConfig;
use crate::pipeline::{PipelineRun, PipelineWatcher, StageStatus};

/// Execute one run against the current source artifact
pub async fn run_pipeline_once(config: ChaosConfig) -> Result<i32> {
    let app = App::new(config).await?;
    let executor = app.pipeline()?;
    let run = executor.execute().await;
    print_run(&run);
    Ok(if run.succeeded() { 0 } else { 1 })
}

pub async fn run_pipeline_watch(config: ChaosConfig, run_existing: bool) -> Result<i32> {
    let app = App::new(config).await?;
    let executor = app.pipeline()?;

    let watcher = PipelineWatcher::new(executor);
    let watcher = if run_existing {
        watcher
    } else {
        watcher.with_baseline().await?
    };

    let report = watcher
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested, draining pipeline queue");
        })
        .await?;
    println!("{} run(s), {} failed", report.runs, report.failed);
    Ok(if report.failed == 0 { 0 } else { 1 })
}

fn print_run(run: &PipelineRun) {
    println!(
        "Run {} {} (source {} version {})",
        run.run_id,
        run.status,
        run.source_key,
        run.source_version.as_deref().unwrap_or("-")
    );
    for stage in &run.stages {
        let marker = match stage.status {
            StageStatus::Succeeded => "✓",
            StageStatus::Failed => "✗",
            StageStatus::Skipped => "-",
        };
        println!("  {} {:<7} {:?}", marker, stage.stage.to_string(), stage.status);
        for command in &stage.commands {
            println!(
                "      $ {} (exit {}, {}ms)",
                command.command,
                command
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                command.duration_ms
            );
        }
        if let Some(error) = &stage.error {
            println!("      {}", error);
        }
    }
}
