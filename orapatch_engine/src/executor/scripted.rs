//! In-memory command runner answering from a rule table
//!
//! Used by the engine's tests to replay captured tool transcripts without
//! touching a real installation. Every call is recorded in order.

use super::{CommandError, CommandOutput, CommandRunner, PromptTable, ShellCommand};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct Reply {
    stdout: String,
    stderr: String,
}

#[derive(Debug)]
struct ScriptRule {
    needle: String,
    /// Replies served in order; the last one repeats
    replies: VecDeque<Reply>,
}

impl ScriptRule {
    fn next_reply(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_default()
        } else {
            self.replies.front().cloned().unwrap_or_default()
        }
    }
}

/// One command seen by the scripted runner
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub line: String,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
    pub interactive: bool,
    /// Prompt patterns offered for interactive calls
    pub prompts: Vec<String>,
    /// Whether a credential rule was part of the prompt table
    pub credential_offered: bool,
}

impl RecordedCall {
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Command runner replaying canned output
///
/// Rules match when the command line contains the rule's needle. Rules are
/// tried in insertion order and unmatched commands return empty output.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    rules: Arc<Mutex<Vec<ScriptRule>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(self, needle: &str, replies: Vec<Reply>) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ScriptRule {
                needle: needle.to_string(),
                replies: replies.into(),
            });
        self
    }

    /// Answer with standard output
    pub fn on(self, needle: &str, stdout: &str) -> Self {
        self.on_reply(needle, stdout, "")
    }

    /// Answer with an error stream
    pub fn on_error(self, needle: &str, stderr: &str) -> Self {
        self.on_reply(needle, "", stderr)
    }

    pub fn on_reply(self, needle: &str, stdout: &str, stderr: &str) -> Self {
        self.add(
            needle,
            vec![Reply {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }],
        )
    }

    /// Answer successive calls with successive outputs; the last repeats
    pub fn on_sequence(self, needle: &str, outputs: &[&str]) -> Self {
        let replies = outputs
            .iter()
            .map(|stdout| Reply {
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
            .collect();
        self.add(needle, replies)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Command lines in execution order
    pub fn lines(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.line).collect()
    }

    /// Index of the first call whose line contains `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|line| line.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    fn reply_for(&self, line: &str) -> Reply {
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        rules
            .iter_mut()
            .find(|rule| line.contains(&rule.needle))
            .map(ScriptRule::next_reply)
            .unwrap_or_default()
    }

    fn record(&self, command: &ShellCommand, prompts: Option<&PromptTable>) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                line: command.line().to_string(),
                env: command.env().to_vec(),
                stdin: command.stdin().map(str::to_string),
                interactive: prompts.is_some(),
                prompts: prompts.map(PromptTable::patterns).unwrap_or_default(),
                credential_offered: prompts.map(PromptTable::has_secret).unwrap_or(false),
            });
    }
}

impl CommandRunner for ScriptedExecutor {
    fn run(
        &self,
        command: &ShellCommand,
        _timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        self.record(command, None);
        let reply = self.reply_for(command.line());

        Ok(CommandOutput {
            stdout: reply.stdout,
            stderr: reply.stderr,
            exit_code: 0,
            duration: Duration::ZERO,
        })
    }

    fn run_interactive(
        &self,
        command: &ShellCommand,
        prompts: &PromptTable,
        _timeout: Duration,
    ) -> Result<String, CommandError> {
        self.record(command, Some(prompts));
        let reply = self.reply_for(command.line());

        Ok(format!("{}{}", reply.stdout, reply.stderr))
    }
}
