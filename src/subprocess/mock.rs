use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

type ArgsMatcher = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Scripted [`ProcessRunner`] for tests.
///
/// Rules are tried in registration order and the first one that accepts a command
/// answers it. A rule limited with [`MockCommandConfig::times`] stops matching once
/// used up, so a failure can be scripted ahead of a success for the same program.
/// Clones share rules and call history.
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    rules: Vec<Rule>,
    calls: Vec<ProcessCommand>,
}

struct Rule {
    program: String,
    args: Option<ArgsMatcher>,
    reply: Reply,
    remaining: Option<usize>,
}

#[derive(Clone)]
enum Reply {
    Output {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    Timeout(Duration),
    NotFound,
}

impl Rule {
    fn accepts(&self, command: &ProcessCommand) -> bool {
        self.program == command.program
            && self.remaining != Some(0)
            && self.args.as_ref().is_none_or(|matches| matches(command.args.as_slice()))
    }
}

/// Builder for one rule; call [`finish`](Self::finish) to register it
pub struct MockCommandConfig {
    state: Arc<Mutex<MockState>>,
    rule: Rule,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the answer for `program`; succeeds with empty output unless configured
    pub fn expect_command(&mut self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            state: Arc::clone(&self.state),
            rule: Rule {
                program: program.to_string(),
                args: None,
                reply: Reply::Output {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                },
                remaining: None,
            },
        }
    }

    /// Number of calls made to `program`, answered or not
    pub fn call_count(&self, program: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.program == program)
            .count()
    }

    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(command.clone());
            state
                .rules
                .iter_mut()
                .find(|rule| rule.accepts(&command))
                .map(|rule| {
                    if let Some(remaining) = rule.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    rule.reply.clone()
                })
        };

        match reply {
            Some(Reply::Output {
                status,
                stdout,
                stderr,
            }) => Ok(ProcessOutput {
                status,
                stdout,
                stderr,
                duration: Duration::from_millis(5),
                truncated: false,
            }),
            Some(Reply::Timeout(after)) => Err(ProcessError::Timeout(after)),
            Some(Reply::NotFound) => Err(ProcessError::CommandNotFound(command.program)),
            None => Err(ProcessError::MockExpectationNotMet(command.display())),
        }
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.rule.args = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(self, text: &str) -> Self {
        self.edit_output(|_, stdout, _| *stdout = text.to_string())
    }

    pub fn returns_stderr(self, text: &str) -> Self {
        self.edit_output(|_, _, stderr| *stderr = text.to_string())
    }

    pub fn returns_exit_code(self, code: i32) -> Self {
        self.edit_output(|status, _, _| {
            *status = if code == 0 {
                ExitStatus::Success
            } else {
                ExitStatus::Error(code)
            }
        })
    }

    /// Answer with a runner timeout instead of output
    pub fn times_out(mut self, after: Duration) -> Self {
        self.rule.reply = Reply::Timeout(after);
        self
    }

    /// Answer as if the program were not installed
    pub fn not_found(mut self) -> Self {
        self.rule.reply = Reply::NotFound;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.rule.remaining = Some(n);
        self
    }

    pub fn finish(self) {
        self.state.lock().unwrap().rules.push(self.rule);
    }

    fn edit_output(mut self, edit: impl FnOnce(&mut ExitStatus, &mut String, &mut String)) -> Self {
        if let Reply::Output {
            status,
            stdout,
            stderr,
        } = &mut self.rule.reply
        {
            edit(status, stdout, stderr);
        }
        self
    }
}
