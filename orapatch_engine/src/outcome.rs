//! Classification of patch tool output
//!
//! The tools expose no structured result, so the outcome of every call is
//! decided by matching marker patterns against standard output.

use crate::config::constants::markers;
use crate::errors::{PatchError, PatchResult};
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The tool modified the home
    Applied,
    /// The patch was already present
    NoActionNeeded,
    Unrecognized,
}

fn compile(pattern: &str) -> PatchResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| PatchError::pattern(pattern, e))
}

fn compile_all(patterns: &[&str]) -> PatchResult<Vec<Regex>> {
    patterns.iter().map(|p| compile(p)).collect()
}

/// Marker sets for one tool
#[derive(Debug, Clone)]
pub struct OutcomeClassifier {
    applied: Vec<Regex>,
    no_action: Vec<Regex>,
}

impl OutcomeClassifier {
    pub fn new(applied: &[&str], no_action: &[&str]) -> PatchResult<Self> {
        Ok(Self {
            applied: compile_all(applied)?,
            no_action: compile_all(no_action)?,
        })
    }

    /// `opatch apply`: success or warning completion, or no need to apply
    pub fn opatch_apply() -> PatchResult<Self> {
        Self::new(
            &[markers::OPATCH_SUCCEEDED, markers::OPATCH_COMPLETED_WITH_WARNINGS],
            &[markers::NO_NEED_TO_APPLY],
        )
    }

    /// Automated-apply wrapper with its dialect-specific success marker
    pub fn auto_apply(success_marker: &str) -> PatchResult<Self> {
        Self::new(&[success_marker], &[markers::NO_NEED_TO_APPLY])
    }

    pub fn classify(&self, output: &str) -> Classification {
        if self.applied.iter().any(|re| re.is_match(output)) {
            Classification::Applied
        } else if self.no_action.iter().any(|re| re.is_match(output)) {
            Classification::NoActionNeeded
        } else {
            Classification::Unrecognized
        }
    }
}

/// Prerequisite sub-commands of `opatch prereq`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrereqCheck {
    MinimumOPatchVersion,
    ConflictAgainstOH,
    SystemSpace,
}

impl PrereqCheck {
    /// Sub-command name as passed to `opatch prereq`
    pub fn command(&self) -> &'static str {
        match self {
            PrereqCheck::MinimumOPatchVersion => "CheckMinimumOPatchVersion",
            PrereqCheck::ConflictAgainstOH => "CheckConflictAgainstOHWithDetail",
            PrereqCheck::SystemSpace => "CheckSystemSpace",
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            PrereqCheck::MinimumOPatchVersion => markers::PREREQ_MIN_OPATCH_PASSED,
            PrereqCheck::ConflictAgainstOH => markers::PREREQ_CONFLICT_PASSED,
            PrereqCheck::SystemSpace => markers::PREREQ_SPACE_PASSED,
        }
    }

    /// Passed only when the marker is present
    pub fn passed(&self, output: &str) -> PatchResult<bool> {
        Ok(compile(self.marker())?.is_match(output))
    }
}

/// Result of `opatch lspatches -id <id>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchPresence {
    Present,
    Absent,
    Unknown,
}

pub fn classify_presence(output: &str) -> PatchResult<PatchPresence> {
    if compile(markers::PATCH_FILES_PRESENT)?.is_match(output) {
        Ok(PatchPresence::Present)
    } else if compile(markers::PATCH_NOT_REGISTERED)?.is_match(output) {
        Ok(PatchPresence::Absent)
    } else {
        Ok(PatchPresence::Unknown)
    }
}

/// Whether `crsctl query crs activeversion -f` reports a NORMAL upgrade state
pub fn cluster_state_is_normal(output: &str) -> PatchResult<bool> {
    Ok(compile(markers::CLUSTER_STATE_NORMAL)?.is_match(output))
}
