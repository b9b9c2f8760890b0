use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{
    ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, ProcessStream, ProcessStreamFut,
};

#[derive(Clone)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

#[derive(Clone)]
enum MockFailure {
    /// The program cannot be started at all
    Spawn,
    /// Reading stdout fails after the scripted lines were delivered
    Read(String),
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    response: ProcessOutput,
    failure: Option<MockFailure>,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_command(&mut self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(10),
                },
                failure: None,
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        let count = history.iter().filter(|cmd| cmd.program == program).count();
        count == times
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.call_history.lock().unwrap().clone()
    }

    fn match_expectation(
        &self,
        command: &ProcessCommand,
    ) -> Result<(ProcessOutput, Option<MockFailure>), ProcessError> {
        self.call_history.lock().unwrap().push(command.clone());

        let mut expectations = self.expectations.lock().unwrap();

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }

            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&command.args) {
                    continue;
                }
            }

            expectation.times_called += 1;

            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Err(ProcessError::MockExpectationNotMet(format!(
                        "Command '{}' called {} times, expected {}",
                        command.program, expectation.times_called, expected
                    )));
                }
            }

            return Ok((expectation.response.clone(), expectation.failure.clone()));
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {} {:?}",
            command.program, command.args
        )))
    }
}

fn lines_of(text: &str) -> Vec<Result<String, ProcessError>> {
    text.lines().map(|line| Ok(line.to_string())).collect()
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let (response, failure) = self.match_expectation(&command)?;
        match failure {
            Some(MockFailure::Spawn) => Err(ProcessError::CommandNotFound(command.program)),
            Some(MockFailure::Read(message)) => Err(ProcessError::Read {
                source: std::io::Error::other(message),
            }),
            None => Ok(response),
        }
    }

    async fn run_streaming(&self, command: ProcessCommand) -> Result<ProcessStream, ProcessError> {
        let (response, failure) = self.match_expectation(&command)?;

        let mut stdout = lines_of(&response.stdout);
        match failure {
            Some(MockFailure::Spawn) => {
                return Err(ProcessError::CommandNotFound(command.program));
            }
            Some(MockFailure::Read(message)) => stdout.push(Err(ProcessError::Read {
                source: std::io::Error::other(message),
            })),
            None => {}
        }

        let status = response.status;
        Ok(ProcessStream {
            stdout: Box::pin(futures::stream::iter(stdout)) as ProcessStreamFut,
            stderr: Box::pin(futures::stream::iter(lines_of(&response.stderr))) as ProcessStreamFut,
            status: Box::pin(async move { Ok(status) }),
        })
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    /// Stdout delivered one line per entry
    pub fn returns_lines(mut self, lines: &[&str]) -> Self {
        self.expectation.response.stdout = lines.join("\n");
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.response.status = ExitStatus::Success;
        self
    }

    pub fn fails_to_spawn(mut self) -> Self {
        self.expectation.failure = Some(MockFailure::Spawn);
        self
    }

    pub fn fails_reading(mut self, message: &str) -> Self {
        self.expectation.failure = Some(MockFailure::Read(message.to_string()));
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}
