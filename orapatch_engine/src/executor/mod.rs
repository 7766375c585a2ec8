//! Command execution for the patch engine
//!
//! `CommandRunner` is the seam to the operating system. `SystemCommandExecutor`
//! runs real processes, `ScriptedExecutor` answers from a rule table for tests.
//! `CommandExecutor` wraps a runner with run-log correlation and the error
//! stream policy shared by every tool invocation.

pub mod interactive;
pub mod scripted;
pub mod shell;

pub use interactive::{PromptRule, PromptTable};
pub use scripted::{RecordedCall, ScriptedExecutor};
pub use shell::SystemCommandExecutor;

use crate::config::constants::markers;
use crate::config::EnginePreferences;
use crate::errors::{PatchError, PatchResult};
use crate::logging::LoggingService;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A shell command line with its environment and optional standard input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    line: String,
    env: Vec<(String, String)>,
    stdin: Option<String>,
}

impl ShellCommand {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            env: Vec::new(),
            stdin: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Text written to the child's standard input, then closed
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stdin {
            Some(input) => write!(f, "{} <<< \"{}\"", self.line, input.trim()),
            None => write!(f, "{}", self.line),
        }
    }
}

/// Command execution output
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }
}

/// Command execution errors
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Program not found: {program}")]
    ProgramNotFound { program: String },

    #[error("Execution failed for '{command}': {reason}")]
    ExecutionFailed { command: String, reason: String },

    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Permission denied: {program}")]
    PermissionDenied { program: String },

    #[error("Interactive session failed for '{command}': {reason}")]
    Interactive { command: String, reason: String },

    #[error("Invalid prompt pattern '{pattern}': {reason}")]
    InvalidPrompt { pattern: String, reason: String },
}

/// Runs shell commands to completion or through an interactive driver
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing both output streams
    fn run(
        &self,
        command: &ShellCommand,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError>;

    /// Drive the command, answering prompts from the table, until it exits
    ///
    /// Returns the merged terminal transcript. A prompt missing from the
    /// table stalls the child until `timeout` expires.
    fn run_interactive(
        &self,
        command: &ShellCommand,
        prompts: &PromptTable,
        timeout: Duration,
    ) -> Result<String, CommandError>;
}

const OUTPUT_RULE: &str = "---------------------------";

/// Runner wrapper applying run-log correlation and the error stream policy
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn CommandRunner>,
    log: LoggingService,
    command_timeout: Option<Duration>,
    interactive_timeout: Duration,
    warning: Regex,
}

impl CommandExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        log: LoggingService,
        prefs: &EnginePreferences,
    ) -> PatchResult<Self> {
        let warning = Regex::new(markers::OPATCH_COMPLETED_WITH_WARNINGS)
            .map_err(|e| PatchError::pattern(markers::OPATCH_COMPLETED_WITH_WARNINGS, e))?;

        Ok(Self {
            runner,
            log,
            command_timeout: prefs.command_timeout(),
            interactive_timeout: prefs.interactive_timeout(),
            warning,
        })
    }

    pub fn log(&self) -> &LoggingService {
        &self.log
    }

    /// Run to completion and return trimmed standard output
    ///
    /// A non-empty error stream fails the run unless it is the patch
    /// tool's warning completion.
    pub fn execute(&self, command: &ShellCommand) -> PatchResult<String> {
        self.log.log_info(&format!("command: {}", command));

        let output = self.runner.run(command, self.command_timeout)?;
        let stdout = output.stdout.trim().to_string();
        let stderr = output.stderr.trim();

        self.log_output(&stdout);

        if !stderr.is_empty() && !self.warning.is_match(stderr) {
            self.log.log_debug(&format!("subprocess error: {}", stderr));
            return Err(PatchError::CommandFailed {
                command: command.line().to_string(),
                stderr: stderr.to_string(),
            });
        }

        Ok(stdout)
    }

    /// Run through the interactive driver with the given prompt table
    pub fn execute_interactive(
        &self,
        command: &ShellCommand,
        prompts: &PromptTable,
    ) -> PatchResult<String> {
        self.log.log_info(&format!("command: {}", command));

        let transcript = self
            .runner
            .run_interactive(command, prompts, self.interactive_timeout)?;
        let transcript = transcript.trim().to_string();

        self.log_output(&transcript);
        Ok(transcript)
    }

    fn log_output(&self, output: &str) {
        self.log.log_debug_bare(OUTPUT_RULE);
        self.log.log_debug("output:");
        self.log.log_debug_bare(output);
        self.log.log_debug_bare(OUTPUT_RULE);
    }
}
