//! External command execution.
//!
//! Every stage drives its external tools (npm, terraform, aws) through the
//! [`CommandRunner`] trait so tests can substitute a recording double.
//! Commands are never retried: a failed upload or apply must not be
//! double-applied without explicit operator intent.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{DeployError, DeployResult};

/// A single external command: argv, working directory, and environment
/// overrides scoped to that invocation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Set the working directory for this invocation.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment override scoped to this invocation.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The program being invoked (first argv element).
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env_overrides(&self) -> &[(String, String)] {
        &self.env
    }

    /// Human-readable command line for logs and error messages.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Captured outcome of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Abstract command execution seam.
pub trait CommandRunner {
    /// Run a command, returning the captured result regardless of exit code.
    ///
    /// Errors only when the process cannot be spawned at all; callers that
    /// need to branch on the exit code use this directly.
    fn run(&self, invocation: &Invocation) -> DeployResult<CommandResult>;

    /// Run a command, mapping a non-zero exit to [`DeployError::CommandFailed`].
    fn run_checked(&self, invocation: &Invocation) -> DeployResult<CommandResult> {
        let result = self.run(invocation)?;
        if result.success() {
            Ok(result)
        } else {
            Err(DeployError::CommandFailed {
                command: invocation.display(),
                code: result.code,
                stderr: result.stderr,
            })
        }
    }
}

/// Command runner backed by real OS processes.
///
/// Captures stdout/stderr and writes argv plus both streams to the
/// diagnostic log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> DeployResult<CommandResult> {
        let argv = invocation.argv();
        if argv.is_empty() {
            return Err(DeployError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command line",
            )));
        }

        tracing::info!(command = %invocation.display(), cwd = ?invocation.cwd(), "running command");

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if let Some(cwd) = invocation.cwd() {
            cmd.current_dir(cwd);
        }
        for (key, value) in invocation.env_overrides() {
            cmd.env(key, value);
        }

        let output = cmd.output()?;
        let result = CommandResult {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.stdout.is_empty() {
            tracing::debug!(command = %invocation.program(), stdout = %result.stdout);
        }
        if !result.stderr.is_empty() {
            tracing::debug!(command = %invocation.program(), stderr = %result.stderr);
        }
        if !result.success() {
            tracing::warn!(
                command = %invocation.display(),
                code = result.code,
                "command exited non-zero"
            );
        }

        Ok(result)
    }
}

/// Recording command runner for tests.
///
/// Records every invocation in order and answers from scripted responses
/// matched by substring against the displayed command line; unmatched
/// commands succeed with empty output.
#[cfg(test)]
pub(crate) struct RecordingRunner {
    pub calls: std::cell::RefCell<Vec<Invocation>>,
    responses: std::cell::RefCell<Vec<(String, CommandResult)>>,
}

#[cfg(test)]
impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: std::cell::RefCell::new(Vec::new()),
            responses: std::cell::RefCell::new(Vec::new()),
        }
    }

    /// Script a response for command lines containing `pattern`.
    pub fn respond(&self, pattern: &str, result: CommandResult) {
        self.responses
            .borrow_mut()
            .push((pattern.to_string(), result));
    }

    /// Script a non-zero exit for command lines containing `pattern`.
    pub fn fail(&self, pattern: &str, code: i32, stderr: &str) {
        self.respond(
            pattern,
            CommandResult {
                code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
    }

    /// Script stdout for command lines containing `pattern`.
    pub fn stdout(&self, pattern: &str, stdout: &str) {
        self.respond(
            pattern,
            CommandResult {
                code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    /// Displayed command lines, in invocation order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|i| i.display()).collect()
    }
}

#[cfg(test)]
impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> DeployResult<CommandResult> {
        self.calls.borrow_mut().push(invocation.clone());
        let display = invocation.display();
        let responses = self.responses.borrow();
        for (pattern, result) in responses.iter() {
            if display.contains(pattern.as_str()) {
                return Ok(result.clone());
            }
        }
        Ok(CommandResult {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
