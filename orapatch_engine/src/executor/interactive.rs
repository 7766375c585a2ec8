//! Prompt tables and the pseudo-terminal driver for interactive tools

use super::{CommandError, ShellCommand};
use crate::config::constants::prompts;
use expectrl::{Eof, Expect, Regex as Needle, Session};
use regex::Regex;
use std::fmt;
use std::process::Command;
use std::time::{Duration, Instant};

/// One expected prompt and the text sent when it appears
#[derive(Clone)]
pub struct PromptRule {
    pattern: Regex,
    response: String,
    secret: bool,
}

impl PromptRule {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    /// Whether the response is a credential
    pub fn is_secret(&self) -> bool {
        self.secret
    }
}

impl fmt::Debug for PromptRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = if self.secret {
            "<redacted>"
        } else {
            self.response.as_str()
        };
        f.debug_struct("PromptRule")
            .field("pattern", &self.pattern.as_str())
            .field("response", &response)
            .finish()
    }
}

/// Ordered prompt -> response table
#[derive(Debug, Clone, Default)]
pub struct PromptTable {
    rules: Vec<PromptRule>,
}

impl PromptTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Confirmation, OCM email and security-update prompts
    pub fn standard() -> Result<Self, CommandError> {
        prompts::DEFAULT_TABLE
            .iter()
            .try_fold(Self::empty(), |table, (pattern, response)| {
                table.with_prompt(pattern, response)
            })
    }

    pub fn with_prompt(self, pattern: &str, response: &str) -> Result<Self, CommandError> {
        self.push(pattern, response, false)
    }

    /// Answer the password prompt with a credential; never logged
    pub fn with_password(self, credential: &str) -> Result<Self, CommandError> {
        self.push(prompts::PASSWORD, &format!("{}\r", credential), true)
    }

    fn push(mut self, pattern: &str, response: &str, secret: bool) -> Result<Self, CommandError> {
        let compiled = Regex::new(pattern).map_err(|e| CommandError::InvalidPrompt {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.rules.retain(|rule| rule.pattern.as_str() != pattern);
        self.rules.push(PromptRule {
            pattern: compiled,
            response: response.to_string(),
            secret,
        });
        Ok(self)
    }

    pub fn rules(&self) -> &[PromptRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn patterns(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|rule| rule.pattern.as_str().to_string())
            .collect()
    }

    pub fn has_secret(&self) -> bool {
        self.rules.iter().any(|rule| rule.secret)
    }

    /// First rule whose pattern matches the given terminal text
    pub fn respond_to(&self, text: &str) -> Option<&PromptRule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(text))
    }

    /// Single alternation of every prompt, used as the expect needle
    pub fn combined_pattern(&self) -> String {
        self.rules
            .iter()
            .map(|rule| format!("(?:{})", rule.pattern.as_str()))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Drive `command` on a pseudo-terminal until it exits or `timeout` expires
pub(crate) fn drive_pty(
    shell: &str,
    command: &ShellCommand,
    prompts: &PromptTable,
    timeout: Duration,
) -> Result<String, CommandError> {
    let line = command.line().to_string();
    let session_error = |e: expectrl::Error| CommandError::Interactive {
        command: line.clone(),
        reason: e.to_string(),
    };
    let timed_out = || CommandError::Timeout {
        command: line.clone(),
        timeout_ms: timeout.as_millis() as u64,
    };

    let mut process = Command::new(shell);
    process
        .arg("-c")
        .arg(command.line())
        .envs(command.env().iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let mut session = Session::spawn(process).map_err(session_error)?;
    let deadline = Instant::now() + timeout;
    let mut transcript = String::new();

    if !prompts.is_empty() {
        let needle = prompts.combined_pattern();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            session.set_expect_timeout(Some(remaining));

            match session.expect(Needle(needle.as_str())) {
                Ok(found) => {
                    let prompt = found
                        .get(0)
                        .map(|m| String::from_utf8_lossy(m).into_owned())
                        .unwrap_or_default();
                    transcript.push_str(&String::from_utf8_lossy(found.before()));
                    transcript.push_str(&prompt);

                    if let Some(rule) = prompts.respond_to(&prompt) {
                        session.send(rule.response()).map_err(session_error)?;
                    }
                }
                Err(expectrl::Error::Eof) => break,
                Err(expectrl::Error::ExpectTimeout) => return Err(timed_out()),
                Err(e) => return Err(session_error(e)),
            }
        }
    }

    let remaining = deadline.saturating_duration_since(Instant::now());
    session.set_expect_timeout(Some(remaining));
    match session.expect(Eof) {
        Ok(rest) => {
            transcript.push_str(&String::from_utf8_lossy(rest.before()));
            if let Some(tail) = rest.get(0) {
                transcript.push_str(&String::from_utf8_lossy(tail));
            }
        }
        Err(expectrl::Error::Eof) => {}
        Err(expectrl::Error::ExpectTimeout) => return Err(timed_out()),
        Err(e) => return Err(session_error(e)),
    }

    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_answers_confirmation() {
        let table = PromptTable::standard().unwrap();

        let rule = table
            .respond_to("Do you want to proceed? [y|n]")
            .expect("confirmation rule");
        assert_eq!(rule.response(), "y\r");

        let rule = table.respond_to("Email address/User Name:").unwrap();
        assert_eq!(rule.response(), "\r");

        assert!(table.respond_to("Unexpected question?").is_none());
    }

    #[test]
    fn test_password_rule_is_secret_and_redacted() {
        let table = PromptTable::standard()
            .unwrap()
            .with_password("hunter2")
            .unwrap();

        let rule = table.respond_to("Password: ").unwrap();
        assert!(rule.is_secret());
        assert_eq!(rule.response(), "hunter2\r");
        assert!(!format!("{:?}", table).contains("hunter2"));
    }

    #[test]
    fn test_replacing_a_prompt_keeps_one_rule() {
        let table = PromptTable::empty()
            .with_prompt("Continue\\?", "n\r")
            .unwrap()
            .with_prompt("Continue\\?", "y\r")
            .unwrap();

        assert_eq!(table.rules().len(), 1);
        assert_eq!(table.respond_to("Continue?").unwrap().response(), "y\r");
    }

    #[test]
    fn test_combined_pattern_alternates() {
        let table = PromptTable::empty()
            .with_prompt("a", "1")
            .unwrap()
            .with_prompt("b", "2")
            .unwrap();
        assert_eq!(table.combined_pattern(), "(?:a)|(?:b)");
    }

    #[test]
    fn test_invalid_prompt_pattern() {
        let result = PromptTable::empty().with_prompt("(unclosed", "x");
        assert!(matches!(result, Err(CommandError::InvalidPrompt { .. })));
    }
}
