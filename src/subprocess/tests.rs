use super::*;
use std::time::Duration;

#[tokio::test]
async fn test_runner_captures_output_and_status() {
    let ok = TokioProcessRunner
        .run(ProcessCommandBuilder::new("echo").arg("synth complete").build())
        .await
        .unwrap();
    assert!(ok.status.success());
    assert_eq!(ok.stdout.trim(), "synth complete");
    assert!(!ok.truncated);

    let failed = TokioProcessRunner
        .run(ProcessCommandBuilder::new("false").build())
        .await
        .unwrap();
    assert_eq!(failed.status, ExitStatus::Error(1));
}

#[tokio::test]
async fn test_runner_errors() {
    let missing = TokioProcessRunner
        .run(ProcessCommandBuilder::new("chaosforge-no-such-tool").build())
        .await;
    assert!(matches!(missing, Err(ProcessError::CommandNotFound(_))));

    let slow = TokioProcessRunner
        .run(
            ProcessCommandBuilder::new("sleep")
                .arg("5")
                .timeout(Duration::from_millis(100))
                .build(),
        )
        .await;
    assert!(matches!(slow, Err(ProcessError::Timeout(_))));
}

#[tokio::test]
async fn test_runner_uses_working_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("stack.ts"), "export {}").unwrap();

    let listing = TokioProcessRunner
        .run(ProcessCommandBuilder::new("ls").current_dir(dir.path()).build())
        .await
        .unwrap();
    assert_eq!(listing.stdout.trim(), "stack.ts");
}

#[tokio::test]
async fn test_mock_matches_program_and_args() {
    let mut mock = MockProcessRunner::new();
    mock.expect_command("cdk")
        .with_args(|args| args == ["diff"])
        .returns_stdout("There were no differences\n")
        .finish();

    let output = mock
        .run(ProcessCommandBuilder::new("cdk").arg("diff").build())
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout, "There were no differences\n");

    let unmatched = mock
        .run(ProcessCommandBuilder::new("cdk").arg("deploy").build())
        .await;
    assert!(matches!(unmatched, Err(ProcessError::MockExpectationNotMet(_))));
    assert_eq!(mock.call_count("cdk"), 2);
}

#[tokio::test]
async fn test_mock_limited_rules_fall_through() {
    let mut mock = MockProcessRunner::new();
    mock.expect_command("cdk")
        .returns_stderr("Rate exceeded")
        .returns_exit_code(1)
        .times(1)
        .finish();
    mock.expect_command("cdk").times(1).finish();

    let deploy = || ProcessCommandBuilder::new("cdk").arg("deploy").build();
    let first = mock.run(deploy()).await.unwrap();
    assert_eq!(first.status.code(), Some(1));
    assert_eq!(first.stderr, "Rate exceeded");

    assert!(mock.run(deploy()).await.unwrap().status.success());
    assert!(mock.run(deploy()).await.is_err());
    assert_eq!(mock.calls().len(), 3);
}

#[tokio::test]
async fn test_mock_failures() {
    let mut mock = MockProcessRunner::new();
    mock.expect_command("npm")
        .times_out(Duration::from_secs(30))
        .finish();
    mock.expect_command("tsc").not_found().finish();

    let slow = mock.run(ProcessCommandBuilder::new("npm").build()).await;
    assert!(matches!(slow, Err(ProcessError::Timeout(_))));

    let missing = mock.run(ProcessCommandBuilder::new("tsc").build()).await;
    assert!(matches!(missing, Err(ProcessError::CommandNotFound(_))));
}

#[test]
fn test_builder_collects_args_and_env() {
    let params = std::collections::BTreeMap::from([
        ("STAGE".to_string(), "dev".to_string()),
        ("REGION".to_string(), "eu-west-1".to_string()),
    ]);
    let command = ProcessCommandBuilder::new("cdk")
        .arg("deploy")
        .args(["--require-approval", "never"])
        .env("CHAOSFORGE_STACK_NAME", "chaos-1")
        .envs(&params)
        .current_dir(std::path::Path::new("/tmp"))
        .timeout(Duration::from_secs(30))
        .build();

    assert_eq!(command.args, vec!["deploy", "--require-approval", "never"]);
    assert_eq!(command.env.len(), 3);
    assert_eq!(command.env.get("STAGE"), Some(&"dev".to_string()));
    assert_eq!(command.working_dir, Some(std::path::PathBuf::from("/tmp")));
    assert_eq!(command.timeout, Some(Duration::from_secs(30)));
    assert_eq!(command.display(), "cdk deploy --require-approval never");
}

#[test]
fn test_inherit_env_skips_unset_variables() {
    let command = ProcessCommandBuilder::new("deploy")
        .env("AWS_REGION", "eu-west-1")
        .inherit_env(["AWS_REGION", "CHAOSFORGE_TEST_SURELY_UNSET_VAR"])
        .build();
    // Explicit values win over inherited ones
    assert_eq!(command.env.get("AWS_REGION"), Some(&"eu-west-1".to_string()));
    assert!(!command.env.contains_key("CHAOSFORGE_TEST_SURELY_UNSET_VAR"));
}

#[test]
fn test_from_words_requires_program() {
    assert!(ProcessCommandBuilder::from_words("", Vec::new()).is_err());
    let command = ProcessCommandBuilder::from_words(
        "cdk synth",
        vec!["cdk".to_string(), "synth".to_string()],
    )
    .unwrap()
    .build();
    assert_eq!(command.program, "cdk");
    assert_eq!(command.args, vec!["synth"]);
}
