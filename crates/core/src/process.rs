//! Process invocation primitive
//!
//! Every external program rackenv touches goes through a [`CommandRunner`].
//! [`SystemRunner`] spawns real processes with `tokio::process`; tests swap
//! in a scripted runner that records invocations instead.

use crate::ownership::Ownership;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A command to run: program, arguments, working directory, environment and
/// the account to run it as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory, inherited when `None`
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Account the child runs as
    pub ownership: Ownership,
}

impl Invocation {
    /// Invoke `program` directly
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            ownership: Ownership::default(),
        }
    }

    /// Run `line` through `sh -c`
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(line)
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run as the given user/group
    #[must_use]
    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// The command line as a single printable string.
    ///
    /// `sh -c` invocations render as the shell line itself.
    #[must_use]
    pub fn command_line(&self) -> String {
        if self.program == "sh" && self.args.len() == 2 && self.args[0] == "-c" {
            return self.args[1].clone();
        }

        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("'{part}'")
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status zero
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`Error::CommandFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error naming `invocation` when the command failed.
    pub fn into_success(self, invocation: &Invocation) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::command_failed(
                invocation.command_line(),
                self.code,
                self.stderr,
            ))
        }
    }
}

/// Runs an [`Invocation`] to completion and captures its output.
///
/// A non-zero exit is not an error at this level; callers decide.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, the ownership
    /// cannot be resolved, or the configured timeout elapses.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// Create a runner with no timeout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill and fail any command that runs longer than `seconds`
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: Option<u64>) -> Self {
        self.timeout = seconds.map(Duration::from_secs);
        self
    }

    fn build_command(invocation: &Invocation) -> Result<Command> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        #[cfg(unix)]
        {
            let ids = invocation.ownership.resolve()?;
            if let Some(gid) = ids.gid {
                cmd.gid(gid);
            }
            if let Some(uid) = ids.uid {
                cmd.uid(uid);
            }
        }
        #[cfg(not(unix))]
        invocation.ownership.resolve()?;

        Ok(cmd)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let command_line = invocation.command_line();
        let start = Instant::now();
        debug!(
            command = %command_line,
            cwd = ?invocation.cwd,
            ownership = %invocation.ownership,
            "Running command"
        );

        let mut cmd = Self::build_command(invocation)?;

        let output = match self.timeout {
            Some(limit) => match timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    warn!(command = %command_line, seconds = limit.as_secs(), "Command timed out");
                    return Err(Error::Timeout {
                        command: command_line,
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => cmd.output().await,
        }
        .map_err(|e| Error::spawn(command_line.clone(), e))?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            command = %command_line,
            code = ?result.code,
            duration_ms = start.elapsed().as_millis(),
            "Command finished"
        );

        Ok(result)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedRunner;

#[cfg(any(test, feature = "test-utils"))]
mod scripted {
    use super::{CommandOutput, CommandRunner, Invocation};
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::{Mutex, PoisonError};

    /// Test runner that records invocations and replays canned outputs.
    ///
    /// Responses are matched by command-line prefix; the most recently
    /// registered match wins. Unmatched commands succeed with empty output.
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        responses: Mutex<Vec<(String, CommandOutput)>>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        /// Create an empty runner
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Reply with `output` to any command line starting with `prefix`
        #[must_use]
        pub fn respond(self, prefix: impl Into<String>, output: CommandOutput) -> Self {
            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((prefix.into(), output));
            self
        }

        /// Every invocation seen so far, in order
        #[must_use]
        pub fn calls(&self) -> Vec<Invocation> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Command lines seen so far, in order
        #[must_use]
        pub fn command_lines(&self) -> Vec<String> {
            self.calls().iter().map(Invocation::command_line).collect()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
            let line = invocation.command_line();
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(invocation.clone());

            let responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(responses
                .iter()
                .rev()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, output)| output.clone())
                .unwrap_or_else(|| CommandOutput::ok("")))
        }
    }
}
