//! Error taxonomy for a patch run
//!
//! Every variant is terminal: the engine stops at the first error and leaves
//! the installation in whatever state it reached.

use crate::executor::CommandError;
use crate::logging::codes::{self, Code};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Command wrote to its error stream; the message is the raw error text
    #[error("{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{message}")]
    UnrecognizedOutput { command: String, message: String },

    #[error("Could not determine Oracle version for {home}.")]
    VersionDetection { home: PathBuf, reason: String },

    #[error("Oracle home [{home}] not found in inventory: {reason}")]
    InventoryLookup { home: PathBuf, reason: String },

    #[error("Failed in determining whether database {unique_name} is registered in CRS ({count} status lines).")]
    AmbiguousRegistration { unique_name: String, count: usize },

    #[error("Error: {label} start timeout. {label} did not start within {budget_secs} seconds")]
    ClusterHealthTimeout { label: &'static str, budget_secs: u64 },

    #[error("Specify all required arguments. Missing: {}", missing.join(", "))]
    MissingParameters { missing: Vec<&'static str> },

    #[error("Invalid patch record: {reason}")]
    MalformedRecord { reason: String },

    #[error("Patch {patch_id} does not define the {component} component required for {purpose}")]
    MissingComponent {
        patch_id: u64,
        component: &'static str,
        purpose: &'static str,
    },

    #[error("{check} failed for {home}")]
    PrerequisiteFailed { check: &'static str, home: PathBuf },

    #[error("There are running processes under {home}")]
    RunningServices { home: PathBuf, processes: Vec<String> },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unsupported function: {name}")]
    UnsupportedFunction { name: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    /// Log code for this failure class
    pub fn code(&self) -> Code {
        match self {
            PatchError::CommandFailed { .. } | PatchError::Command(_) => {
                codes::failure::COMMAND_EXECUTION
            }
            PatchError::UnrecognizedOutput { .. } => codes::failure::UNRECOGNIZED_OUTPUT,
            PatchError::VersionDetection { .. } => codes::failure::VERSION_DETECTION,
            PatchError::InventoryLookup { .. } => codes::failure::INVENTORY_LOOKUP,
            PatchError::AmbiguousRegistration { .. } => codes::failure::AMBIGUOUS_REGISTRATION,
            PatchError::ClusterHealthTimeout { .. } => codes::failure::CLUSTER_HEALTH_TIMEOUT,
            PatchError::MissingParameters { .. } => codes::failure::MISSING_PARAMETERS,
            PatchError::MalformedRecord { .. } | PatchError::MissingComponent { .. } => {
                codes::failure::MALFORMED_PATCH_RECORD
            }
            PatchError::PrerequisiteFailed { .. } => codes::failure::PREREQUISITE_FAILED,
            PatchError::RunningServices { .. } => codes::failure::RUNNING_SERVICES,
            PatchError::InvalidPattern { .. }
            | PatchError::UnsupportedFunction { .. }
            | PatchError::Io { .. } => codes::failure::INTERNAL,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PatchError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn pattern(pattern: &str, err: regex::Error) -> Self {
        PatchError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}

pub type PatchResult<T> = Result<T, PatchError>;
