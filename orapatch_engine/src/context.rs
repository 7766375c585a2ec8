//! Request, response and per-run state

use crate::config::constants::{FAILURE_PREFIX, FAILURE_RC};
use crate::errors::{PatchError, PatchResult};
use crate::logging::LoggingService;
use crate::patch::{self, PatchSet};
use crate::topology::{PatchScope, Topology};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// FUNCTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    CheckOpatchMinVersion,
    CheckConflictAgainstOh,
    PatchOh,
    PatchDb,
    PatchOhOjvm,
    PatchDbOjvm,
    StartLoggerSession,
    EndLoggerSession,
}

impl Function {
    pub const ALL: [Function; 8] = [
        Function::CheckOpatchMinVersion,
        Function::CheckConflictAgainstOh,
        Function::PatchOh,
        Function::PatchDb,
        Function::PatchOhOjvm,
        Function::PatchDbOjvm,
        Function::StartLoggerSession,
        Function::EndLoggerSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Function::CheckOpatchMinVersion => "CHECK_OPATCH_MIN_VERSION",
            Function::CheckConflictAgainstOh => "CHECK_CONFLICT_AGAINST_OH",
            Function::PatchOh => "PATCH_OH",
            Function::PatchDb => "PATCH_DB",
            Function::PatchOhOjvm => "PATCH_OH_OJVM",
            Function::PatchDbOjvm => "PATCH_DB_OJVM",
            Function::StartLoggerSession => "START_LOGGER_SESSION",
            Function::EndLoggerSession => "END_LOGGER_SESSION",
        }
    }

    pub fn is_logger_session(&self) -> bool {
        matches!(
            self,
            Function::StartLoggerSession | Function::EndLoggerSession
        )
    }

    /// Dictionary functions patch databases, not binaries
    pub fn is_dictionary(&self) -> bool {
        matches!(self, Function::PatchDb | Function::PatchDbOjvm)
    }

    pub fn is_ojvm(&self) -> bool {
        matches!(self, Function::PatchOhOjvm | Function::PatchDbOjvm)
    }
}

impl FromStr for Function {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Function::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or(PatchError::UnsupportedFunction {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// Privileged-execution credential; never printed
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted>)")
    }
}

/// One engine invocation as supplied by the caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    pub function: String,
    pub oracle_home: Option<PathBuf>,
    /// Staging root holding the unpacked patches
    pub swlib_path: Option<PathBuf>,
    pub patch_id: Option<u64>,
    #[serde(default)]
    pub only_prereq: bool,
    pub patch_only_oh: Option<bool>,
    pub patch_ojvm: Option<bool>,
    pub patch_db_all: Option<bool>,
    /// Comma separated database unique names
    pub patch_db_list: Option<String>,
    pub patch_item: Option<serde_json::Value>,
    pub root_password: Option<Credential>,
    pub oratab_file: Option<PathBuf>,
    #[serde(default)]
    pub debug: bool,
    pub hostname: Option<String>,
    pub log_file: Option<PathBuf>,
    /// Check `opatch lspatches` before patching binaries
    #[serde(default)]
    pub verify_applied: bool,
}

impl RunRequest {
    pub fn new(function: Function) -> Self {
        Self {
            function: function.as_str().to_string(),
            ..Default::default()
        }
    }

    /// Split the database list, dropping blanks
    pub fn database_list(&self) -> Vec<String> {
        self.patch_db_list
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Result handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResponse {
    pub changed: bool,
    pub msg: String,
    pub failed: bool,
    pub rc: i32,
}

impl RunResponse {
    pub fn success(changed: bool, msg: impl Into<String>) -> Self {
        Self {
            changed,
            msg: msg.into(),
            failed: false,
            rc: 0,
        }
    }

    pub fn failure(error: &PatchError) -> Self {
        Self {
            changed: false,
            msg: format!("{}{}", FAILURE_PREFIX, error),
            failed: true,
            rc: FAILURE_RC,
        }
    }
}

// ============================================================================
// RUN CONTEXT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    PreparingInventory,
    CheckingPrerequisitesOnly,
    PreFlight,
    Applying,
    PostFlight,
    Done,
}

/// Per-run state, created once per invocation and dropped at its end
#[derive(Debug)]
pub struct RunContext {
    pub function: Function,
    pub oracle_home: PathBuf,
    pub stage: PathBuf,
    pub patch_id: u64,
    pub only_prereq: bool,
    pub patch_only_oh: bool,
    pub patch_ojvm: bool,
    pub scope: PatchScope,
    pub credential: Option<Credential>,
    pub debug: bool,
    pub hostname: String,
    pub oratab: PathBuf,
    pub verify_applied: bool,
    pub patches: PatchSet,
    pub topology: Topology,
    pub log: LoggingService,
    changed: bool,
    patch_applied: bool,
    phase: RunPhase,
}

fn normalize_home(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches('/');
    if trimmed.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(trimmed)
    }
}

impl RunContext {
    /// Validate a patch request and resolve its patch descriptors
    pub fn from_request(
        request: &RunRequest,
        function: Function,
        default_oratab: &Path,
        log: LoggingService,
    ) -> PatchResult<Self> {
        let mut missing = Vec::new();
        if request.oracle_home.is_none() {
            missing.push("oracle_home");
        }
        if request.swlib_path.is_none() {
            missing.push("swlib_path");
        }
        if request.patch_id.is_none() {
            missing.push("patch_id");
        }
        if request.patch_item.is_none() {
            missing.push("patch_item");
        }
        if !request.only_prereq {
            if request.patch_only_oh.is_none() {
                missing.push("patch_only_oh");
            }
            if request.patch_ojvm.is_none() {
                missing.push("patch_ojvm");
            }
            if request.patch_db_all.is_none() {
                missing.push("patch_db_all");
            }
        }

        let (Some(home), Some(stage), Some(patch_id), Some(record)) = (
            request.oracle_home.as_deref(),
            request.swlib_path.as_deref(),
            request.patch_id,
            request.patch_item.as_ref(),
        ) else {
            return Err(PatchError::MissingParameters { missing });
        };
        if !missing.is_empty() {
            return Err(PatchError::MissingParameters { missing });
        }

        let patches = patch::resolve_patch_set(patch_id, record)?;

        let patch_only_oh = request.patch_only_oh.unwrap_or(false);
        let scope = if request.only_prereq {
            PatchScope::HomeOnly
        } else {
            PatchScope::from_flags(
                patch_only_oh,
                request.patch_db_all.unwrap_or(false),
                &request.database_list(),
            )
        };

        let hostname = match &request.hostname {
            Some(name) => name.clone(),
            None => hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .map_err(|e| PatchError::io("hostname", e))?,
        };

        Ok(Self {
            function,
            oracle_home: normalize_home(home),
            stage: stage.to_path_buf(),
            patch_id,
            only_prereq: request.only_prereq,
            patch_only_oh,
            patch_ojvm: request.patch_ojvm.unwrap_or(false),
            scope,
            credential: request.root_password.clone(),
            debug: request.debug,
            hostname,
            oratab: request
                .oratab_file
                .clone()
                .unwrap_or_else(|| default_oratab.to_path_buf()),
            verify_applied: request.verify_applied,
            patches,
            topology: Topology::default(),
            log,
            changed: false,
            patch_applied: false,
            phase: RunPhase::Idle,
        })
    }

    /// Record that a tool modified the installation; never reset
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn mark_patch_applied(&mut self) {
        self.patch_applied = true;
    }

    pub fn patch_applied(&self) -> bool {
        self.patch_applied
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn enter(&mut self, phase: RunPhase) {
        self.log
            .log_debug(&format!("phase: {:?} -> {:?}", self.phase, phase));
        self.phase = phase;
    }
}
