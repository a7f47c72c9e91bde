//! Command routing and execution
//!
//! This module handles routing CLI commands to their respective implementations.

use crate::cli::args::{Commands, PipelineCommands};
use crate::cli::commands::*;
use crate::config::ChaosConfig;
use anyhow::Result;

/// Execute a CLI command and return the process exit code
pub async fn execute_command(command: Commands, config: ChaosConfig) -> Result<i32> {
    match command {
        Commands::Run {
            template,
            deploy,
            name,
            params,
        } => {
            run_workflow(
                config,
                RunParams {
                    template,
                    deploy,
                    name,
                    params,
                },
            )
            .await
        }
        Commands::Status { execution_id, json } => {
            run_status_command(config, &execution_id, json).await?;
            Ok(0)
        }
        Commands::Executions { limit } => {
            run_executions_command(config, limit).await?;
            Ok(0)
        }
        Commands::UploadTemplate {
            file,
            name,
            replace,
        } => {
            run_upload_template(config, &file, name, replace).await?;
            Ok(0)
        }
        Commands::ImportExperiment { file } => {
            run_import_experiment(config, &file).await?;
            Ok(0)
        }
        Commands::Pipeline { command } => match command {
            PipelineCommands::RunOnce => run_pipeline_once(config).await,
            PipelineCommands::Watch { run_existing } => {
                run_pipeline_watch(config, run_existing).await
            }
        },
        Commands::Serve { bind } => {
            run_serve(config, bind).await?;
            Ok(0)
        }
    }
}
