use anyhow::Result;

use super::run::print_execution;
use crate::app::App;
use crate::config::ChaosConfig;

/// Show an execution from its persisted record
pub async fn run_status_command(config: ChaosConfig, execution_id: &str, json: bool) -> Result<()> {
    let app = App::new(config).await?;
    let execution = app.status_service().get_execution(execution_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else {
        print_execution(&execution);
    }
    Ok(())
}

pub async fn run_executions_command(config: ChaosConfig, limit: usize) -> Result<()> {
    let app = App::new(config).await?;
    let executions = app.status_service().list_executions(limit).await?;
    if executions.is_empty() {
        println!("No executions found.");
        return Ok(());
    }
    for summary in executions {
        let stopped = summary
            .stopped_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<44} {:<10} {:<26} {:<26} {}",
            summary.id,
            summary.status.to_string(),
            summary.started_at.to_rfc3339(),
            stopped,
            summary.name
        );
    }
    Ok(())
}
