//! Log codes and failure classification
//!
//! Single source of truth for the codes attached to run-log events and the
//! metadata describing each failure class an orapatch run can end with.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Code attached to every log event and every run failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Metadata for a failure code
#[derive(Debug, Clone)]
pub struct CodeMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl CodeMetadata {
    pub fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// CODE CONSTANTS
// ============================================================================

/// Terminal failure codes. Every one of these ends the run.
pub mod failure {
    use super::Code;

    pub const INTERNAL: Code = Code::new("OP100");
    pub const COMMAND_EXECUTION: Code = Code::new("OP101");
    pub const UNRECOGNIZED_OUTPUT: Code = Code::new("OP102");
    pub const VERSION_DETECTION: Code = Code::new("OP103");
    pub const INVENTORY_LOOKUP: Code = Code::new("OP104");
    pub const AMBIGUOUS_REGISTRATION: Code = Code::new("OP105");
    pub const CLUSTER_HEALTH_TIMEOUT: Code = Code::new("OP106");
    pub const MISSING_PARAMETERS: Code = Code::new("OP107");
    pub const MALFORMED_PATCH_RECORD: Code = Code::new("OP108");
    pub const PREREQUISITE_FAILED: Code = Code::new("OP109");
    pub const RUNNING_SERVICES: Code = Code::new("OP110");
}

/// Progress codes for informational events
pub mod progress {
    use super::Code;

    pub const GENERIC: Code = Code::new("I000");
    pub const SESSION_START: Code = Code::new("I001");
    pub const SESSION_END: Code = Code::new("I002");
    pub const PHASE_CHANGE: Code = Code::new("I010");
    pub const COMMAND_ISSUED: Code = Code::new("I011");
    pub const PATCH_APPLIED: Code = Code::new("I020");
    pub const NO_ACTION_NEEDED: Code = Code::new("I021");
    pub const PREREQUISITE_PASSED: Code = Code::new("I022");
    pub const STACK_ONLINE: Code = Code::new("I030");
    pub const SKIPPED: Code = Code::new("I040");
}

/// Generic codes for events logged without a specific code
pub mod generic {
    use super::Code;

    pub const WARNING: Code = Code::new("W000");
    pub const DEBUG: Code = Code::new("D000");
}

// ============================================================================
// METADATA REGISTRY
// ============================================================================

static CODE_REGISTRY: OnceLock<HashMap<&'static str, CodeMetadata>> = OnceLock::new();

fn get_registry() -> &'static HashMap<&'static str, CodeMetadata> {
    CODE_REGISTRY.get_or_init(|| {
        let entries = [
            CodeMetadata::new(
                "OP100",
                "System",
                Severity::Critical,
                "Internal engine error",
                "Check the run log and file a bug report",
            ),
            CodeMetadata::new(
                "OP101",
                "CommandExecution",
                Severity::High,
                "External command wrote to its error stream or could not be run",
                "Inspect the command and its raw error text in the run log",
            ),
            CodeMetadata::new(
                "OP102",
                "ToolOutput",
                Severity::High,
                "Tool output matched none of the expected markers",
                "Review the tool's own log for the reported patch session",
            ),
            CodeMetadata::new(
                "OP103",
                "VersionDetection",
                Severity::High,
                "Installed version could not be determined from the library naming convention",
                "Verify the home path and the presence of lib/libcell<NN>.so",
            ),
            CodeMetadata::new(
                "OP104",
                "Inventory",
                Severity::High,
                "Home could not be located in the central inventory",
                "Check oraInst.loc and the inventory document",
            ),
            CodeMetadata::new(
                "OP105",
                "Registration",
                Severity::High,
                "Cluster registration state of a database is ambiguous",
                "Run srvctl status database manually and resolve the registration",
            ),
            CodeMetadata::new(
                "OP106",
                "ClusterHealth",
                Severity::Critical,
                "Cluster stack did not come online within the wait budget",
                "Inspect the cluster stack; services were left in their current state",
            ),
            CodeMetadata::new(
                "OP107",
                "Parameters",
                Severity::Medium,
                "Required request parameters are missing",
                "Supply patch_only_oh, patch_ojvm and patch_db_all for patch runs",
            ),
            CodeMetadata::new(
                "OP108",
                "PatchDefinition",
                Severity::Medium,
                "Patch metadata record could not be converted",
                "Fix the patch metadata record",
            ),
            CodeMetadata::new(
                "OP109",
                "Prerequisite",
                Severity::High,
                "A patch tool prerequisite check did not pass",
                "Review the prerequisite output and resolve conflicts or space",
            ),
            CodeMetadata::new(
                "OP110",
                "PostFlight",
                Severity::High,
                "Processes are still running from the home being patched",
                "Stop the remaining processes before patching",
            ),
        ];

        entries.into_iter().map(|meta| (meta.code, meta)).collect()
    })
}

/// Look up metadata for a code
pub fn get_metadata(code: &str) -> Option<&'static CodeMetadata> {
    get_registry().get(code)
}

/// Description for a code, or a generic placeholder
pub fn get_description(code: &str) -> &'static str {
    get_metadata(code)
        .map(|meta| meta.description)
        .unwrap_or("Unknown code")
}

/// Category for a code
pub fn get_category(code: &str) -> &'static str {
    get_metadata(code)
        .map(|meta| meta.category)
        .unwrap_or("Unknown")
}
