use anyhow::Result;
use tracing::debug;

use crate::app::App;
use crate::config::ChaosConfig;
use crate::workflow::{ExecutionStatus, WorkflowExecution};

pub struct RunParams {
    pub template: String,
    pub deploy: bool,
    pub name: Option<String>,
    pub params: Vec<(String, String)>,
}

/// Run one execution to completion; exit code 0 only when it succeeded
pub async fn run_workflow(config: ChaosConfig, params: RunParams) -> Result<i32> {
    let app = App::new(config).await?;
    let orchestrator = app.orchestrator(params.deploy)?;

    let mut input = app.execution_input(&params.template);
    input.name = params.name;
    input.parameters.extend(params.params);
    debug!("Execution input: {:?}", input);

    let id = orchestrator.start(input).await?;
    println!(
        "Started execution {} ({})",
        id,
        orchestrator.definition().name
    );
    let execution = orchestrator.wait(&id).await?;
    print_execution(&execution);

    Ok(match execution.status {
        ExecutionStatus::Succeeded => 0,
        _ => 1,
    })
}

pub fn print_execution(execution: &WorkflowExecution) {
    let marker = match execution.status {
        ExecutionStatus::Succeeded => "✅",
        ExecutionStatus::Running => "⏳",
        _ => "❌",
    };
    println!("{} {} {}", marker, execution.id, execution.status);
    println!("  name:     {}", execution.name);
    println!("  workflow: {}", execution.workflow);
    println!("  state:    {}", execution.state);
    println!("  started:  {}", execution.started_at.to_rfc3339());
    if let Some(stopped) = execution.stopped_at {
        let elapsed = stopped - execution.started_at;
        println!(
            "  stopped:  {} ({}s)",
            stopped.to_rfc3339(),
            elapsed.num_seconds()
        );
    }
    if let Some(error) = &execution.error {
        println!(
            "  error:    {} failed after {} attempt(s): {}: {}",
            error.step, error.attempts, error.category, error.message
        );
    }
    for artifact in &execution.artifacts {
        println!("  artifact: {:?} {}", artifact.kind, artifact.key);
    }
}
