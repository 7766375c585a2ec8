//! Version-dependent command dialect
//!
//! Versions 10 and 11 use the old spelling of the service-control arguments,
//! the `opatch auto` wrapper and an OCM response file. 12, 18 and 19 use the
//! new spelling and `opatchauto apply`.

use crate::config::constants::{markers, versions};
use crate::errors::{PatchError, PatchResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Old,
    New,
}

/// Fragments that differ between the two dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectStrategy {
    pub database_flag: &'static str,
    pub instance_flag: &'static str,
    pub stop_option_flag: &'static str,
    pub config_all_flag: &'static str,
    /// Automated-apply invocation relative to `<home>/OPatch/`
    pub auto_apply: &'static str,
    pub auto_apply_success: &'static str,
    pub needs_ocm_response: bool,
}

const OLD_STRATEGY: DialectStrategy = DialectStrategy {
    database_flag: "-d",
    instance_flag: "-i",
    stop_option_flag: "-o",
    config_all_flag: "-a",
    auto_apply: "opatch auto",
    auto_apply_success: markers::OPATCH_AUTO_SUCCEEDED,
    needs_ocm_response: true,
};

const NEW_STRATEGY: DialectStrategy = DialectStrategy {
    database_flag: "-db",
    instance_flag: "-instance",
    stop_option_flag: "-stopoption",
    config_all_flag: "-all",
    auto_apply: "opatchauto apply",
    auto_apply_success: markers::OPATCHAUTO_SUCCESSFUL,
    needs_ocm_response: false,
};

impl Dialect {
    /// Dialect for a major version; unsupported versions are `None`
    pub fn for_version(major: u32) -> Option<Self> {
        if versions::OLD_DIALECT.contains(&major) {
            Some(Dialect::Old)
        } else if versions::NEW_DIALECT.contains(&major) {
            Some(Dialect::New)
        } else {
            None
        }
    }

    pub fn strategy(&self) -> &'static DialectStrategy {
        match self {
            Dialect::Old => &OLD_STRATEGY,
            Dialect::New => &NEW_STRATEGY,
        }
    }
}

/// Installed major version and its dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeVersion {
    pub major: u32,
    pub dialect: Dialect,
}

/// Parse `libcell<NN>.so` into `NN`
fn libcell_suffix(file_name: &str) -> Option<u32> {
    let digits = file_name.strip_prefix("libcell")?.strip_suffix(".so")?;
    if digits.len() == 2 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Detect the installed version from `<home>/lib/libcell<NN>.so`
pub fn detect_version(home: &Path) -> PatchResult<HomeVersion> {
    let lib = home.join("lib");
    let entries = fs::read_dir(&lib).map_err(|e| PatchError::VersionDetection {
        home: home.to_path_buf(),
        reason: format!("cannot read {}: {}", lib.display(), e),
    })?;

    let mut found: Vec<u32> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| libcell_suffix(&entry.file_name().to_string_lossy()))
        .collect();
    found.sort_unstable();
    found.dedup();

    let major = match found.as_slice() {
        [major] => *major,
        [] => {
            return Err(PatchError::VersionDetection {
                home: home.to_path_buf(),
                reason: "no libcell<NN>.so library".to_string(),
            })
        }
        many => {
            return Err(PatchError::VersionDetection {
                home: home.to_path_buf(),
                reason: format!("several libcell versions: {:?}", many),
            })
        }
    };

    let dialect = Dialect::for_version(major).ok_or_else(|| PatchError::VersionDetection {
        home: home.to_path_buf(),
        reason: format!("unsupported version {}", major),
    })?;

    Ok(HomeVersion { major, dialect })
}
