//! Component wiring: template seeding and the pipeline handoff path

mod common;

use std::sync::Arc;

use chaosforge::app::App;
use chaosforge::config::{ChaosConfig, DeployMode};
use chaosforge::error::ErrorCode;
use chaosforge::pipeline::RunStatus;
use chaosforge::store::{keys, CapabilityAccess, ObjectStore};
use chaosforge::subprocess::MockProcessRunner;
use chaosforge::workflow::{
    ArtifactKind, Capabilities, ExecutionInput, ExecutionStatus, Orchestrator, WorkflowDefinition,
};
use common::{Harness, BUCKET, TEMPLATE_KEY};

const TEMPLATE: &str = r#"{
    "name": "ec2-failure",
    "template": {
        "prompt": "Design a chaos experiment that stops one EC2 instance",
        "model_id": "claude-3-5-sonnet"
    }
}"#;

fn app_over(harness: &Harness, config: ChaosConfig, runner: &MockProcessRunner) -> App {
    let store: Arc<dyn ObjectStore> = harness.store.clone();
    App::with_parts(config, store, Arc::new(runner.clone()))
}

#[tokio::test]
async fn test_upload_template_is_write_once() {
    let harness = Harness::new();
    let app = app_over(&harness, ChaosConfig::default(), &MockProcessRunner::new());

    let meta = app
        .upload_template("ec2-failure.json", TEMPLATE.as_bytes().to_vec(), false)
        .await
        .unwrap();
    assert_eq!(meta.key, "templates/ec2-failure.json");

    // Identical content is accepted again
    app.upload_template("ec2-failure.json", TEMPLATE.as_bytes().to_vec(), false)
        .await
        .unwrap();

    let changed = TEMPLATE.replace("one EC2 instance", "two EC2 instances");
    let err = app
        .upload_template("ec2-failure.json", changed.clone().into_bytes(), false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::STORE_CONFLICT);

    let replaced = app
        .upload_template("ec2-failure.json", changed.into_bytes(), true)
        .await
        .unwrap();
    assert_ne!(replaced.version, meta.version);
}

#[tokio::test]
async fn test_upload_template_validates_input() {
    let harness = Harness::new();
    let app = app_over(&harness, ChaosConfig::default(), &MockProcessRunner::new());

    let err = app
        .upload_template("../escape.json", TEMPLATE.as_bytes().to_vec(), false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::VALIDATION_INVALID_IDENTIFIER);

    let err = app
        .upload_template("broken.json", b"{\"template\": {}}".to_vec(), false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::VALIDATION_GENERIC);
    assert!(harness
        .store
        .head("templates/broken.json")
        .await
        .unwrap()
        .is_none());
}

#[test]
fn test_execution_input_accepts_names_and_keys() {
    let harness = Harness::new();
    let app = app_over(&harness, ChaosConfig::default(), &MockProcessRunner::new());

    let input = app.execution_input("ec2-failure.json");
    assert_eq!(input.template_key, "templates/ec2-failure.json");
    assert_eq!(input.bucket, ChaosConfig::default().store.bucket);

    let input = app.execution_input("templates/nested/rds.json");
    assert_eq!(input.template_key, "templates/nested/rds.json");
}

#[tokio::test]
async fn test_handoff_triggers_pipeline_run() {
    let harness = Harness::new();
    let mut runner = MockProcessRunner::new();
    runner.expect_command("tsc").finish();
    runner.expect_command("cdk").finish();

    let mut config = ChaosConfig::default();
    config.deploy.mode = DeployMode::Pipeline;
    config.pipeline.install = Vec::new();
    config.pipeline.build = vec!["tsc --noEmit {file}".to_string()];
    config.pipeline.deploy = vec!["cdk deploy --app {file}".to_string()];
    let app = app_over(&harness, config, &runner);

    let orchestrator = Orchestrator::new(
        WorkflowDefinition::with_deploy(),
        Capabilities {
            generator: harness.generator.clone(),
            analyzer: harness.analyzer.clone(),
            deployer: Some(app.deployer().unwrap()),
        },
        app.scoped(CapabilityAccess::orchestrator()),
    )
    .unwrap();
    let execution = orchestrator
        .run(ExecutionInput::new(BUCKET, TEMPLATE_KEY))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    let source = execution
        .artifacts
        .iter()
        .find(|a| a.kind == ArtifactKind::PipelineSource)
        .expect("handed-off artifact");
    assert_eq!(source.key, keys::codegen_output_key("stack.ts"));
    assert_eq!(
        execution.output.as_ref().unwrap()["deployment"]["operation"],
        "handed_off"
    );

    let pipeline = app.pipeline().unwrap();
    let revision = pipeline.current_revision().await.unwrap().unwrap();
    let run = pipeline.execute().await;
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.source_version, Some(revision.version));
    assert_eq!(runner.call_count("cdk"), 1);

    let runs = app.status_service().list_pipeline_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, run.run_id);
}
