//! Real process execution through `/bin/sh`

use super::interactive;
use super::{CommandError, CommandOutput, CommandRunner, PromptTable, ShellCommand};
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Executes command lines through the system shell
#[derive(Debug, Clone)]
pub struct SystemCommandExecutor {
    shell: String,
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
        }
    }

    /// Use a different POSIX shell
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    fn spawn(&self, command: &ShellCommand) -> Result<Child, CommandError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command.line())
            .envs(command.env().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if command.stdin().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommandError::ProgramNotFound {
                program: self.shell.clone(),
            },
            std::io::ErrorKind::PermissionDenied => CommandError::PermissionDenied {
                program: self.shell.clone(),
            },
            _ => CommandError::ExecutionFailed {
                command: command.line().to_string(),
                reason: e.to_string(),
            },
        })
    }

    fn wait(
        child: &mut Child,
        command: &ShellCommand,
        timeout: Option<Duration>,
    ) -> Result<ExitStatus, CommandError> {
        let failed = |e: std::io::Error| CommandError::ExecutionFailed {
            command: command.line().to_string(),
            reason: e.to_string(),
        };

        let Some(limit) = timeout else {
            return child.wait().map_err(failed);
        };

        match child.wait_timeout(limit).map_err(failed)? {
            Some(status) => Ok(status),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(CommandError::Timeout {
                    command: command.line().to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        }
    }
}

/// Drain a pipe on its own thread so neither stream can block the child
fn drain<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = source {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

impl CommandRunner for SystemCommandExecutor {
    fn run(
        &self,
        command: &ShellCommand,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        let start = Instant::now();
        let mut child = self.spawn(command)?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let (Some(input), Some(mut pipe)) = (command.stdin(), child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .map_err(|e| CommandError::ExecutionFailed {
                    command: command.line().to_string(),
                    reason: format!("cannot write standard input: {}", e),
                })?;
        }

        let status = Self::wait(&mut child, command, timeout)?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout.join().unwrap_or_default()).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned(),
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    fn run_interactive(
        &self,
        command: &ShellCommand,
        prompts: &PromptTable,
        timeout: Duration,
    ) -> Result<String, CommandError> {
        interactive::drive_pty(&self.shell, command, prompts, timeout)
    }
}
