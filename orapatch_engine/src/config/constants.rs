//! Fixed values: tool output markers, prompt table entries and default paths
//!
//! The markers are the only success signal the patch tools expose, so they
//! are kept verbatim.

pub mod markers {
    /// Warning completion; also tolerated on the error stream
    pub const OPATCH_COMPLETED_WITH_WARNINGS: &str = r"OPatch(.*)completed with warnings";
    pub const OPATCH_SUCCEEDED: &str = r"OPatch succeeded";
    pub const NO_NEED_TO_APPLY: &str = r"No need to apply this patch";

    pub const OPATCHAUTO_SUCCESSFUL: &str = r"OPatchAuto successful";
    pub const OPATCH_AUTO_SUCCEEDED: &str = r"opatch auto succeeded";

    pub const PREREQ_CONFLICT_PASSED: &str = r#"Prereq "checkConflictAgainstOHWithDetail" passed"#;
    pub const PREREQ_SPACE_PASSED: &str = r#"Prereq "checkSystemSpace" passed"#;
    pub const PREREQ_MIN_OPATCH_PASSED: &str = r#"Prereq "checkMinimumOPatchVersion" passed"#;

    pub const PATCH_NOT_REGISTERED: &str =
        r"Inventory check failed: Patch ID (\d+) is NOT registered in Oracle Home";
    pub const PATCH_FILES_PRESENT: &str =
        r"Files check OK: Files from Patch ID (\d+) are present in Oracle Home\.";

    pub const CLUSTER_STATE_NORMAL: &str = r"The cluster upgrade state is \[NORMAL\]";

    /// Lines of `srvctl status database` that count as a registration answer
    pub const DATABASE_STATUS_LINE: &str = r"(?i)Database is (not )?running";

    /// Health lines of `crsctl check` that report a healthy resource
    pub const RESOURCE_ONLINE_SUFFIX: &str = "is online";
}

pub mod prompts {
    /// Default interactive prompt table: (pattern, response)
    pub const DEFAULT_TABLE: &[(&str, &str)] = &[
        (r"Do you want to proceed\? \[y\|n\]", "y\r"),
        (r"Email address/User Name:", "\r"),
        (
            r"Do you wish to remain uninformed of security issues \(\[Y\]es, \[N\]o\) \[N\]",
            "y\r",
        ),
        (r"Is the local system ready for patching\? \[y\|n\]", "y\r"),
    ];

    /// Prompt answered with the privileged-execution credential
    pub const PASSWORD: &str = r"Password: ";
}

pub mod paths {
    pub const ORATAB: &str = "/etc/oratab";
    pub const ORAINST_LOC: &str = "/etc/oraInst.loc";
    pub const OLR_LOC: &str = "/etc/oracle/olr.loc";
    pub const RESPONSE_DIR: &str = "/tmp";

    /// Inventory document relative to the inventory location
    pub const INVENTORY_DOCUMENT: &str = "ContentsXML/inventory.xml";

    pub const OCM_FILE_PREFIX: &str = "orapatch_ocm_";
    pub const OCM_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%I-%M-%S%p";
}

/// Environment variables read by `EnginePreferences::default`
pub mod env_vars {
    pub const INTERACTIVE_TIMEOUT_SECS: &str = "ORAPATCH_INTERACTIVE_TIMEOUT_SECS";
    pub const COMMAND_TIMEOUT_SECS: &str = "ORAPATCH_COMMAND_TIMEOUT_SECS";
    pub const HEALTH_POLL_SECS: &str = "ORAPATCH_HEALTH_POLL_SECS";
    pub const HEALTH_BUDGET_SECS: &str = "ORAPATCH_HEALTH_BUDGET_SECS";
    pub const ORATAB: &str = "ORAPATCH_ORATAB";
    pub const ORAINST_LOC: &str = "ORAPATCH_ORAINST";
    pub const OLR_LOC: &str = "ORAPATCH_OLR_LOC";
    pub const RESPONSE_DIR: &str = "ORAPATCH_RESPONSE_DIR";
}

pub mod timing {
    pub const INTERACTIVE_TIMEOUT_SECS: u64 = 3600;
    pub const HEALTH_POLL_SECS: u64 = 10;
    pub const HEALTH_BUDGET_SECS: u64 = 600;
}

pub mod versions {
    /// Major versions using the old command dialect
    pub const OLD_DIALECT: &[u32] = &[10, 11];
    /// Major versions using the new command dialect
    pub const NEW_DIALECT: &[u32] = &[12, 18, 19];
}

/// Exit status reported for a failed run
pub const FAILURE_RC: i32 = 245;

/// Prefix of every failure message
pub const FAILURE_PREFIX: &str = "[orapatch] module fail: ";
