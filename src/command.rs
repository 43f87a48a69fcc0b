//! External command execution.
//!
//! Every collaborator this tool drives (`bentoml`, `git`, `aws`) is a separate
//! program. They are all executed through [`CommandRunner`] so the workflows
//! can be exercised with scripted outputs instead of real processes.
//!
//! Long-running steps (cloning, building) are marked with
//! [`CommandSpec::streamed`]; their output is echoed to stderr as it arrives
//! and still captured for error reporting.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use shell_escape::unix::escape;
use thiserror::Error;
use tracing::info;

/// A fully described program invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandSpec {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<Utf8PathBuf>,
    envs: Vec<(OsString, OsString)>,
    streamed: bool,
}

impl CommandSpec {
    /// Starts a spec for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Appends a single argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<OsString>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends several arguments in order.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Runs the program from `dir` instead of the current directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable on top of the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Echoes the program's output to stderr while it runs.
    #[must_use]
    pub const fn streamed(mut self) -> Self {
        self.streamed = true;
        self
    }

    /// Whether output is echoed while the program runs.
    #[must_use]
    pub const fn is_streamed(&self) -> bool {
        self.streamed
    }

    /// Program name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Working directory override, if any.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Utf8Path> {
        self.current_dir.as_deref()
    }

    /// Extra environment variables.
    #[must_use]
    pub fn environment(&self) -> &[(OsString, OsString)] {
        &self.envs
    }

    /// Renders the invocation as a shell-like line for logs and errors.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(escape(self.program.as_str().into()).into_owned());
        parts.extend(
            self.args
                .iter()
                .map(|arg| escape(arg.to_string_lossy()).into_owned()),
        );
        parts.join(" ")
    }
}

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Exit status rendered for error messages (`unknown` when killed).
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Errors raised when a command cannot be executed at all.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs the described command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError> {
        (**self).run(command)
    }
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError> {
        info!("$ {}", command.command_line());

        let mut process = Command::new(command.program());
        process.args(command.arguments());
        if let Some(dir) = command.working_dir() {
            process.current_dir(dir);
        }
        for (key, value) in command.environment() {
            process.env(key, value);
        }

        let spawn_failed = |err: io::Error| CommandError::Spawn {
            program: command.program().to_owned(),
            message: err.to_string(),
        };

        if command.is_streamed() {
            return run_streamed(&mut process).map_err(spawn_failed);
        }

        let output = process.output().map_err(spawn_failed)?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn run_streamed(process: &mut Command) -> io::Result<CommandOutput> {
    let mut child = process
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout_text, stderr_text) = thread::scope(|scope| {
        let forward_stdout = scope.spawn(|| tee(stdout, io::stderr()));
        let captured_stderr = tee(stderr, io::stderr());
        (forward_stdout.join().unwrap_or_default(), captured_stderr)
    });
    let status = child.wait()?;

    Ok(CommandOutput {
        code: status.code(),
        stdout: stdout_text,
        stderr: stderr_text,
    })
}

/// Copies `source` into `sink` chunk by chunk and returns everything read.
fn tee(source: Option<impl Read>, mut sink: impl Write) -> String {
    let mut captured = Vec::new();
    if let Some(mut reader) = source {
        let mut buffer = [0_u8; 8192];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    let chunk = buffer.get(..read).unwrap_or_default();
                    // Echo failures are ignored.
                    sink.write_all(chunk).and_then(|()| sink.flush()).ok();
                    captured.extend_from_slice(chunk);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
    }
    String::from_utf8_lossy(&captured).into_owned()
}
