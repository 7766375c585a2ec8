//! Snapshot of the running process table

use crate::errors::{PatchError, PatchResult};
use crate::executor::{CommandExecutor, ShellCommand};
use regex::{Regex, RegexBuilder};
use std::path::Path;

/// Background process prefixes of database and ASM instances
pub const DATABASE_PMON: &str = "ora_pmon";
pub const ASM_PMON: &str = "asm_pmon";

/// Command lines of every running process
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    lines: Vec<String>,
}

/// Case-insensitive whole-word match, the way `grep -iw` matches
fn word_pattern(word: &str) -> PatchResult<Regex> {
    let pattern = format!(r"(^|[^\w]){}($|[^\w])", regex::escape(word));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| PatchError::pattern(&pattern, e))
}

impl ProcessTable {
    pub fn capture(executor: &CommandExecutor) -> PatchResult<Self> {
        let output = executor.execute(&ShellCommand::new("ps -eo args"))?;
        Ok(Self::from_output(&output))
    }

    pub fn from_output(output: &str) -> Self {
        Self {
            lines: output
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn matching(&self, word: &str) -> PatchResult<Vec<&String>> {
        let re = word_pattern(word)?;
        Ok(self.lines.iter().filter(|line| re.is_match(line)).collect())
    }

    /// Whether the monitor process `<prefix>_<sid>` is alive
    pub fn pmon_running(&self, prefix: &str, sid: &str) -> PatchResult<bool> {
        Ok(!self.matching(&format!("{}_{}", prefix, sid))?.is_empty())
    }

    /// Processes whose command line references `home`
    pub fn referencing(&self, home: &Path) -> PatchResult<Vec<String>> {
        Ok(self
            .matching(&home.to_string_lossy())?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Names of listeners started from `home`
    pub fn listeners_for(&self, home: &Path) -> PatchResult<Vec<String>> {
        let mut names: Vec<String> = self
            .matching(&home.to_string_lossy())?
            .into_iter()
            .filter(|line| line.contains("tns"))
            .filter_map(|line| line.split_whitespace().nth(1))
            .map(str::to_string)
            .collect();
        names.dedup();
        Ok(names)
    }
}
