//! Central inventory lookups and home classification

use crate::config::constants::paths;
use crate::dialect::{self, HomeVersion};
use crate::errors::{PatchError, PatchResult};
use crate::executor::{CommandExecutor, ShellCommand};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Home state discovered once per run
#[derive(Debug, Clone, Serialize)]
pub struct OracleHome {
    pub path: PathBuf,
    pub version: HomeVersion,
    /// Cluster-ware (CRS/HAS) home
    pub is_grid: bool,
    /// Set when the home belongs to a multi-node cluster
    pub cluster_name: Option<String>,
    pub inventory: PathBuf,
}

impl OracleHome {
    pub fn is_cluster(&self) -> bool {
        self.cluster_name.is_some()
    }

    pub fn display(&self) -> String {
        self.path.display().to_string()
    }
}

/// A `<HOME>` entry of the inventory document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryHome {
    pub location: String,
    pub crs: bool,
    pub has_node_list: bool,
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Value of `inventory_loc=` in a pointer file
fn read_inventory_loc(pointer: &Path) -> Option<String> {
    let content = fs::read_to_string(pointer).ok()?;
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("inventory_loc="))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Path of the inventory document for `home`
///
/// Uses `<home>/oraInst.loc` when present, otherwise the system pointer.
pub fn resolve_inventory(home: &Path, default_pointer: &Path) -> PatchResult<PathBuf> {
    let local = home.join("oraInst.loc");
    let pointer = if local.is_file() {
        local
    } else {
        default_pointer.to_path_buf()
    };

    let location = read_inventory_loc(&pointer).ok_or_else(|| PatchError::InventoryLookup {
        home: home.to_path_buf(),
        reason: format!("no inventory_loc in {}", pointer.display()),
    })?;

    Ok(Path::new(&location).join(paths::INVENTORY_DOCUMENT))
}

/// Parse the `<HOME>` entries of an inventory document
pub fn parse_inventory(document: &str) -> PatchResult<Vec<InventoryHome>> {
    const HOME: &str = r#"(?s)<HOME\s([^>]*?)(?:/>|>(.*?)</HOME>)"#;
    const ATTRIBUTE: &str = r#"(\w+)="([^"]*)""#;

    let home_re = Regex::new(HOME).map_err(|e| PatchError::pattern(HOME, e))?;
    let attr_re = Regex::new(ATTRIBUTE).map_err(|e| PatchError::pattern(ATTRIBUTE, e))?;

    let homes = home_re
        .captures_iter(document)
        .filter_map(|caps| {
            let attributes = caps.get(1)?.as_str();
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");

            let mut location = None;
            let mut crs = false;
            for attr in attr_re.captures_iter(attributes) {
                match &attr[1] {
                    "LOC" => location = Some(attr[2].to_string()),
                    "CRS" => crs = attr[2].eq_ignore_ascii_case("true"),
                    _ => {}
                }
            }

            Some(InventoryHome {
                location: location?,
                crs,
                has_node_list: body.contains("<NODE_LIST"),
            })
        })
        .collect();

    Ok(homes)
}

/// Find `home` in the inventory document; absence is an inventory failure
pub fn locate_home(home: &Path, inventory: &Path) -> PatchResult<InventoryHome> {
    let document = fs::read_to_string(inventory).map_err(|e| PatchError::InventoryLookup {
        home: home.to_path_buf(),
        reason: format!("cannot read {}: {}", inventory.display(), e),
    })?;

    let wanted = home.to_string_lossy();
    let wanted = normalize(&wanted);

    parse_inventory(&document)?
        .into_iter()
        .find(|entry| normalize(&entry.location) == wanted)
        .ok_or_else(|| PatchError::InventoryLookup {
            home: home.to_path_buf(),
            reason: format!("not registered in {}", inventory.display()),
        })
}

/// Grid home test: CRS attribute in the inventory, or `bin/ohasd.bin` for
/// releases whose inventory lacks the attribute
pub fn is_grid_home(home: &Path, entry: &InventoryHome) -> bool {
    entry.crs || home.join("bin").join("ohasd.bin").is_file()
}

/// Cluster name reported by `cemutlo -n` when the home ships the utility
pub fn cluster_name(home: &Path, executor: &CommandExecutor) -> PatchResult<Option<String>> {
    if !home.join("bin").join("cemutlo.bin").is_file() {
        return Ok(None);
    }

    let command = ShellCommand::new(format!("{}/bin/cemutlo -n", home.display()))
        .with_env("ORACLE_HOME", home.to_string_lossy());
    let output = executor.execute(&command)?;

    Ok(Some(output).filter(|name| !name.is_empty()))
}

/// Discover everything the run needs to know about `home`
pub fn discover_home(
    home: &Path,
    default_pointer: &Path,
    executor: &CommandExecutor,
) -> PatchResult<OracleHome> {
    let log = executor.log();

    let inventory = resolve_inventory(home, default_pointer)?;
    log.log_info(&format!(
        "Inventory location [inventory_loc]: {}",
        inventory.display()
    ));

    let entry = locate_home(home, &inventory)?;
    if entry.has_node_list {
        log.log_info(&format!("Oracle home [{}] is part of a cluster.", home.display()));
    } else {
        log.log_info(&format!(
            "Oracle home [{}] is not part of a cluster.",
            home.display()
        ));
    }

    let is_grid = is_grid_home(home, &entry);
    let cluster_name = cluster_name(home, executor)?;
    let version = dialect::detect_version(home)?;

    log.log_info(&format!(
        "Oracle home [{}]: version {}, grid home {}, cluster {}",
        home.display(),
        version.major,
        is_grid,
        cluster_name.as_deref().unwrap_or("none")
    ));

    Ok(OracleHome {
        path: home.to_path_buf(),
        version,
        is_grid,
        cluster_name,
        inventory,
    })
}
