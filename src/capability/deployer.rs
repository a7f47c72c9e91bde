//! Direct deployment through external deploy tooling
//!
//! The code artifact is materialized in a scratch directory and handed to a
//! configured validate command (optional) and deploy command. Command lines may use
//! `{file}`, `{dir}` and `{stack}` placeholders.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::classify::{classify, TransientPattern};
use super::payload::{DeployOperation, DeployOutput, DeployRequest};
use super::{CapabilityError, Deployer, FailureClass};
use crate::store::{keys, ObjectStore, ScopedStore};
use crate::subprocess::{CommandLine, Placeholders, ProcessError, ProcessOutput, ProcessRunner};

/// Commands the direct deployer runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployCommands {
    /// Runs before the deploy command; a failure here is never retried
    #[serde(default)]
    pub validate: Option<String>,

    #[serde(default = "default_deploy_command")]
    pub deploy: String,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Failure output matching any of these is treated as transient
    #[serde(default = "TransientPattern::defaults")]
    pub transient_matchers: Vec<TransientPattern>,

    /// Output fragments meaning the stack is already up to date
    #[serde(default = "default_no_change_patterns")]
    pub no_change_patterns: Vec<String>,

    /// Parent environment variables passed through to the commands
    #[serde(default = "default_pass_env")]
    pub pass_env: Vec<String>,
}

impl Default for DeployCommands {
    fn default() -> Self {
        Self {
            validate: None,
            deploy: default_deploy_command(),
            timeout: default_command_timeout(),
            transient_matchers: TransientPattern::defaults(),
            no_change_patterns: default_no_change_patterns(),
            pass_env: default_pass_env(),
        }
    }
}

fn default_deploy_command() -> String {
    "npx cdk deploy --require-approval never --app \"npx ts-node {file}\" {stack}".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_no_change_patterns() -> Vec<String> {
    vec![
        "No updates are to be performed".to_string(),
        "(no changes)".to_string(),
    ]
}

fn default_pass_env() -> Vec<String> {
    [
        "AWS_PROFILE",
        "AWS_REGION",
        "AWS_DEFAULT_REGION",
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
        "CDK_DEFAULT_ACCOUNT",
        "CDK_DEFAULT_REGION",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validate,
    Deploy,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Deploy => "deploy",
        }
    }
}

/// Deployer that shells out to the configured commands
pub struct CommandDeployer {
    store: ScopedStore,
    runner: Arc<dyn ProcessRunner>,
    commands: DeployCommands,
    validate: Option<CommandLine>,
    deploy: CommandLine,
}

impl CommandDeployer {
    pub fn new(
        store: ScopedStore,
        runner: Arc<dyn ProcessRunner>,
        commands: DeployCommands,
    ) -> Result<Self, CapabilityError> {
        let invalid =
            |e: ProcessError| CapabilityError::permanent("configuration", e.to_string());
        let validate = commands
            .validate
            .as_deref()
            .map(CommandLine::parse)
            .transpose()
            .map_err(invalid)?;
        let deploy = CommandLine::parse(&commands.deploy).map_err(invalid)?;
        Ok(Self {
            store,
            runner,
            commands,
            validate,
            deploy,
        })
    }

    async fn run_step(
        &self,
        stage: Stage,
        line: &CommandLine,
        placeholders: &Placeholders,
        request: &DeployRequest,
        workdir: &Path,
    ) -> Result<ProcessOutput, CapabilityError> {
        let command = line
            .to_builder(placeholders)
            .map_err(|e| CapabilityError::permanent("configuration", e.to_string()))?
            .current_dir(workdir)
            .timeout(self.commands.timeout)
            .env("CHAOSFORGE_STACK_NAME", &request.stack_name)
            .env("CHAOSFORGE_EXECUTION_ID", &request.execution_id)
            .envs(&request.parameters)
            .inherit_env(&self.commands.pass_env)
            .build();

        let step = stage.as_str();
        debug!("Running {} command for {}: {}", step, request.stack_name, line);
        let output = self
            .runner
            .run(command)
            .await
            .map_err(|e| process_failure(step, e))?;

        // "Nothing to update" only ever excuses the deploy command
        if output.status.success() || (stage == Stage::Deploy && self.is_no_change(&output)) {
            return Ok(output);
        }

        let text = output.combined_output();
        let (class, category) = match stage {
            Stage::Validate => (FailureClass::Permanent, "invalid_artifact"),
            Stage::Deploy => classify(&self.commands.transient_matchers, &text),
        };
        let message = format!(
            "{} command exited with {:?}: {}",
            step,
            output.status,
            last_lines(&text, 20)
        );
        warn!("{} for stack {}", message, request.stack_name);
        Err(match class {
            FailureClass::Transient => CapabilityError::transient(category, message),
            FailureClass::Permanent => CapabilityError::permanent(category, message),
        })
    }

    fn is_no_change(&self, output: &ProcessOutput) -> bool {
        let text = output.combined_output();
        self.commands
            .no_change_patterns
            .iter()
            .any(|pattern| text.contains(pattern.as_str()))
    }
}

/// Spawn failures are permanent; a command running past its timeout is transient
fn process_failure(step: &str, err: ProcessError) -> CapabilityError {
    match err {
        ProcessError::Timeout(after) => CapabilityError::transient(
            "timeout",
            format!("{} command timed out after {:?}", step, after),
        ),
        ProcessError::CommandNotFound(program) => CapabilityError::permanent(
            "command_not_found",
            format!("{} command not found: {}", step, program),
        ),
        other => CapabilityError::permanent("spawn_failed", format!("{}: {}", step, other)),
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[async_trait]
impl Deployer for CommandDeployer {
    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutput, CapabilityError> {
        let object = self.store.get(&request.code_key).await?.ok_or_else(|| {
            CapabilityError::permanent(
                "artifact_missing",
                format!("code artifact {} not found", request.code_key),
            )
        })?;

        let workdir = tempfile::Builder::new()
            .prefix("chaosforge-deploy-")
            .tempdir()
            .map_err(|e| CapabilityError::transient("scratch_dir", e.to_string()))?;
        let file = workdir.path().join(keys::file_name(&request.code_key));
        tokio::fs::write(&file, &object.body)
            .await
            .map_err(|e| CapabilityError::transient("scratch_dir", e.to_string()))?;

        let placeholders = Placeholders::new()
            .with("file", file.to_string_lossy())
            .with("dir", workdir.path().to_string_lossy())
            .with("stack", request.stack_name.clone());

        if let Some(validate) = &self.validate {
            self.run_step(Stage::Validate, validate, &placeholders, &request, workdir.path())
                .await?;
        }

        let output = self
            .run_step(Stage::Deploy, &self.deploy, &placeholders, &request, workdir.path())
            .await?;
        let operation = if self.is_no_change(&output) {
            DeployOperation::NoChange
        } else {
            DeployOperation::Applied
        };
        info!(
            "Deployed stack {} ({:?}) from {}",
            request.stack_name, operation, request.code_key
        );

        Ok(DeployOutput {
            stack_name: request.stack_name,
            operation,
            artifact_key: request.code_key,
            detail: Some(last_lines(&output.stdout, 5)).filter(|d| !d.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CapabilityAccess, MemoryStore};
    use crate::subprocess::MockProcessRunner;
    use std::collections::BTreeMap;

    const CODE_KEY: &str = "generated/exec-1/scn-a/stack.ts";

    async fn setup(commands: DeployCommands) -> (CommandDeployer, MockProcessRunner) {
        let backend: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        backend
            .put(CODE_KEY, b"export class Stack {}".to_vec(), None)
            .await
            .unwrap();
        let mock = MockProcessRunner::new();
        let deployer = CommandDeployer::new(
            ScopedStore::new(backend, CapabilityAccess::deployer()),
            Arc::new(mock.clone()),
            commands,
        )
        .unwrap();
        (deployer, mock)
    }

    fn commands() -> DeployCommands {
        DeployCommands {
            validate: Some("tsc --noEmit {file}".into()),
            deploy: "cdk deploy --app {file} {stack}".into(),
            ..DeployCommands::default()
        }
    }

    fn request() -> DeployRequest {
        DeployRequest {
            execution_id: "exec-1".into(),
            bucket: "bucket".into(),
            code_key: CODE_KEY.into(),
            stack_name: "chaos-scn-a".into(),
            parameters: BTreeMap::from([("ENVIRONMENT".to_string(), "test".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_deploy_runs_validate_then_deploy() {
        let (deployer, mut mock) = setup(commands()).await;
        mock.expect_command("tsc").finish();
        mock.expect_command("cdk")
            .returns_stdout("chaos-scn-a: deploying...\n✅ chaos-scn-a\n")
            .finish();

        let output = deployer.deploy(request()).await.unwrap();
        assert_eq!(output.operation, DeployOperation::Applied);
        assert_eq!(output.artifact_key, CODE_KEY);

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].program, "tsc");
        let deploy = &calls[1];
        assert!(deploy.args[2].ends_with("/stack.ts"));
        assert_eq!(deploy.args[3], "chaos-scn-a");
        assert_eq!(
            deploy.env.get("CHAOSFORGE_STACK_NAME"),
            Some(&"chaos-scn-a".to_string())
        );
        assert_eq!(deploy.env.get("ENVIRONMENT"), Some(&"test".to_string()));
    }

    #[tokio::test]
    async fn test_no_updates_is_success() {
        let (deployer, mut mock) = setup(DeployCommands {
            validate: None,
            ..commands()
        })
        .await;
        mock.expect_command("cdk")
            .returns_stderr("No updates are to be performed.")
            .returns_exit_code(1)
            .finish();

        let output = deployer.deploy(request()).await.unwrap();
        assert_eq!(output.operation, DeployOperation::NoChange);
    }

    #[tokio::test]
    async fn test_throttling_is_transient() {
        let (deployer, mut mock) = setup(commands()).await;
        mock.expect_command("tsc").finish();
        mock.expect_command("cdk")
            .returns_stderr("Throttling: Rate exceeded")
            .returns_exit_code(1)
            .finish();

        let err = deployer.deploy(request()).await.unwrap_err();
        assert_eq!(err.class, FailureClass::Transient);
        assert_eq!(err.category, "throttled");
    }

    #[tokio::test]
    async fn test_deploy_rejection_is_permanent() {
        let (deployer, mut mock) = setup(commands()).await;
        mock.expect_command("tsc").finish();
        mock.expect_command("cdk")
            .returns_stderr("Template format error: Unresolved resource dependencies")
            .returns_exit_code(1)
            .finish();

        let err = deployer.deploy(request()).await.unwrap_err();
        assert_eq!(err.class, FailureClass::Permanent);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_deploy() {
        let (deployer, mut mock) = setup(commands()).await;
        mock.expect_command("tsc")
            .returns_stderr("stack.ts(3,1): error TS1005: connection expected")
            .returns_exit_code(2)
            .finish();

        let err = deployer.deploy(request()).await.unwrap_err();
        assert_eq!(err.class, FailureClass::Permanent);
        assert_eq!(err.category, "invalid_artifact");
        assert_eq!(mock.call_count("cdk"), 0);
    }

    #[tokio::test]
    async fn test_no_change_text_does_not_excuse_failed_validation() {
        let (deployer, mut mock) = setup(commands()).await;
        mock.expect_command("tsc")
            .returns_stdout("(no changes)")
            .returns_stderr("stack.ts(1,8): error TS2307: Cannot find module")
            .returns_exit_code(2)
            .finish();

        let err = deployer.deploy(request()).await.unwrap_err();
        assert_eq!(err.class, FailureClass::Permanent);
        assert_eq!(err.category, "invalid_artifact");
        assert_eq!(mock.call_count("cdk"), 0);
    }

    #[tokio::test]
    async fn test_process_errors() {
        let (deployer, mut mock) = setup(commands()).await;
        mock.expect_command("tsc").not_found().finish();
        let err = deployer.deploy(request()).await.unwrap_err();
        assert_eq!(err.category, "command_not_found");
        assert!(!err.is_transient());

        let (deployer, mut mock) = setup(commands()).await;
        mock.expect_command("tsc").finish();
        mock.expect_command("cdk")
            .times_out(Duration::from_secs(1800))
            .finish();
        let err = deployer.deploy(request()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.category, "timeout");
    }

    #[tokio::test]
    async fn test_missing_artifact_is_permanent() {
        let (deployer, mock) = setup(commands()).await;
        let mut req = request();
        req.code_key = "generated/exec-1/other/stack.ts".into();
        let err = deployer.deploy(req).await.unwrap_err();
        assert_eq!(err.category, "artifact_missing");
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_invalid_command_line_is_rejected() {
        let backend: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let result = CommandDeployer::new(
            ScopedStore::new(backend, CapabilityAccess::deployer()),
            Arc::new(MockProcessRunner::new()),
            DeployCommands {
                deploy: "cdk deploy \"unterminated".into(),
                ..DeployCommands::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc", 2), "b\nc");
        assert_eq!(last_lines("a", 5), "a");
    }
}
