//! Discovery of the instances and listeners running from a home

use super::instance::{DatabaseInstance, DatabaseMetadata, InitialState, Listener, Topology};
use super::oratab::Oratab;
use super::process_table::{ProcessTable, ASM_PMON, DATABASE_PMON};
use crate::config::constants::markers;
use crate::errors::{PatchError, PatchResult};
use crate::executor::{CommandExecutor, ShellCommand};
use crate::inventory::OracleHome;
use crate::logging::codes;
use crate::patch;
use regex::Regex;
use serde_json::Value;
use std::path::Path;

/// Which databases a run patches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchScope {
    /// Binaries only; no database is patched
    HomeOnly,
    AllDatabases,
    /// Database unique names
    Listed(Vec<String>),
    NoDatabases,
}

impl PatchScope {
    pub fn from_flags(patch_only_oh: bool, patch_db_all: bool, list: &[String]) -> Self {
        if patch_only_oh {
            PatchScope::HomeOnly
        } else if patch_db_all {
            PatchScope::AllDatabases
        } else if !list.is_empty() {
            PatchScope::Listed(list.to_vec())
        } else {
            PatchScope::NoDatabases
        }
    }
}

/// Single-row metadata query; the row starts with `;` so it can be found
/// among sqlplus noise
pub const METADATA_QUERY: &str = "\
set heading off feedback off pagesize 0 linesize 1000 verify off
select ';'||d.name||';'||d.open_mode||';'||d.database_role||';'||p.value||';'||(select count(*) from gv$instance)||';'||i.status||';'||d.db_unique_name
from v$database d, v$instance i, v$parameter p
where p.name = 'cluster_database';
exit
";

/// Fields of the metadata row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMetadataRow {
    pub name: String,
    pub open_mode: String,
    pub role: String,
    pub cluster_database: String,
    pub instances: String,
    pub status: String,
    pub unique_name: String,
}

impl InstanceMetadataRow {
    pub fn parse(output: &str) -> Option<Self> {
        let row = output.lines().map(str::trim).find(|l| l.starts_with(';'))?;
        let fields: Vec<&str> = row.split(';').skip(1).map(str::trim).collect();
        if fields.len() < 7 {
            return None;
        }

        Some(Self {
            name: fields[0].to_string(),
            open_mode: fields[1].to_string(),
            role: fields[2].to_string(),
            cluster_database: fields[3].to_string(),
            instances: fields[4].to_string(),
            status: fields[5].to_string(),
            unique_name: fields[6].to_string(),
        })
    }
}

/// Value after a `Key:` line in `srvctl config database` output
fn config_value<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().map(str::trim).find_map(|line| {
        let (head, value) = line.split_once(':')?;
        head.trim()
            .eq_ignore_ascii_case(key)
            .then(|| value.trim())
    })
}

/// v$database spells the role with a space, srvctl with an underscore
fn is_physical_standby(role: &str) -> bool {
    role.trim().replace('_', " ").eq_ignore_ascii_case("PHYSICAL STANDBY")
}

pub struct TopologyBuilder<'a> {
    executor: &'a CommandExecutor,
    home: &'a OracleHome,
    oratab: &'a Oratab,
    hostname: &'a str,
    scope: &'a PatchScope,
    register_out_of_scope: bool,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(
        executor: &'a CommandExecutor,
        home: &'a OracleHome,
        oratab: &'a Oratab,
        hostname: &'a str,
        scope: &'a PatchScope,
    ) -> Self {
        Self {
            executor,
            home,
            oratab,
            hostname,
            scope,
            register_out_of_scope: true,
        }
    }

    /// Leave out instances that will not be patched
    pub fn scoped_only(mut self) -> Self {
        self.register_out_of_scope = false;
        self
    }

    fn tool(&self, tool: &str, args: &str) -> ShellCommand {
        ShellCommand::new(format!("{}/bin/{} {}", self.home.path.display(), tool, args))
            .with_env("ORACLE_HOME", self.home.path.to_string_lossy())
    }

    pub fn build_instances(&self, topology: &mut Topology) -> PatchResult<()> {
        let processes = ProcessTable::capture(self.executor)?;
        if self.home.is_grid {
            self.build_grid_instances(&processes, topology)
        } else {
            self.build_database_instances(&processes, topology)
        }
    }

    pub fn build_listeners(&self, topology: &mut Topology) -> PatchResult<()> {
        let log = self.executor.log();
        if self.home.is_grid {
            log.log_info("This is CRS configuration, opatchauto takes care.");
            log.log_info("Skipping BUILD_LISTENER_LIST.");
            return Ok(());
        }

        let processes = ProcessTable::capture(self.executor)?;
        for name in processes.listeners_for(&self.home.path)? {
            log.log_info(&format!("Listener found: {}", name));
            topology.register_listener(Listener::new(name, self.home.path.clone()));
        }
        Ok(())
    }

    // ========================================================================
    // GRID HOME
    // ========================================================================

    fn build_grid_instances(
        &self,
        processes: &ProcessTable,
        topology: &mut Topology,
    ) -> PatchResult<()> {
        let log = self.executor.log();

        let Some(asm) = self.oratab.for_home(&self.home.path).next() else {
            log.log_info("No ASM instance registered in oratab for this home.");
            return Ok(());
        };

        if !processes.pmon_running(ASM_PMON, &asm.sid)? {
            log.log_info(&format!("ASM instance {} is not running.", asm.sid));
            return Ok(());
        }

        topology.register_instance(DatabaseInstance::asm(
            asm.sid.clone(),
            self.home.path.clone(),
            self.hostname,
            self.home.version.major,
        ));

        log.log_info("Registered databases:");
        let online = self.executor.execute(&self.tool(
            "crsctl",
            "stat res -f -w \"(TYPE = ora.database.type) and (STATE = ONLINE)\"",
        ))?;

        let mut unique_names: Vec<String> = online
            .lines()
            .map(str::trim)
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                key.eq_ignore_ascii_case("NAME").then_some(value)
            })
            .filter_map(|resource| resource.split('.').nth(1))
            .map(str::to_string)
            .collect();
        unique_names.dedup();

        if unique_names.is_empty() {
            log.log_info("No databases found registered in local/cluster registry.");
            return Ok(());
        }

        for unique_name in unique_names {
            let filter = format!(
                "stat res -f -w \"(TYPE = ora.database.type) and (NAME = ora.{}.db) and (LAST_SERVER = {})\"",
                unique_name, self.hostname
            );
            let output = self.executor.execute(&self.tool("crsctl", &filter))?;

            let Some(sid) = output.lines().map(str::trim).find_map(|line| {
                let (key, value) = line.split_once('=')?;
                key.eq_ignore_ascii_case("USR_ORA_INST_NAME")
                    .then(|| value.trim().to_string())
            }) else {
                continue;
            };

            log.log_bare(&format!(
                "Database unique name/Instance name: {}/{}",
                unique_name, sid
            ));

            let Some(db_home) = self.oratab.home_of(&sid) else {
                log.log_info_with_code(
                    codes::progress::SKIPPED,
                    &format!("Instance {} is not in oratab, skipped.", sid),
                );
                continue;
            };

            let metadata = DatabaseMetadata {
                name: None,
                unique_name,
                is_rac: false,
                is_standby: false,
                initial_state: None,
            };
            topology.register_instance(DatabaseInstance::database(
                sid,
                db_home.to_path_buf(),
                self.hostname,
                self.home.version.major,
                true,
                metadata,
            ));
        }

        Ok(())
    }

    // ========================================================================
    // DATABASE HOME
    // ========================================================================

    fn build_database_instances(
        &self,
        processes: &ProcessTable,
        topology: &mut Topology,
    ) -> PatchResult<()> {
        for entry in self.oratab.for_home(&self.home.path) {
            if processes.pmon_running(DATABASE_PMON, &entry.sid)? {
                if let Some(instance) = self.describe_instance(&entry.sid, &entry.home)? {
                    topology.register_instance(instance);
                }
            }
        }
        Ok(())
    }

    fn describe_instance(&self, sid: &str, db_home: &Path) -> PatchResult<Option<DatabaseInstance>> {
        let log = self.executor.log();

        let query = self
            .tool("sqlplus", "-s / as sysdba")
            .with_env("ORACLE_SID", sid)
            .with_stdin(METADATA_QUERY);
        let output = self.executor.execute(&query)?;
        let row = InstanceMetadataRow::parse(&output).ok_or_else(|| {
            PatchError::UnrecognizedOutput {
                command: query.line().to_string(),
                message: format!("Cannot read database metadata for instance {}", sid),
            }
        })?;
        log.log_info(&format!("Database metadata: {:?}", row));

        let (crs_registered, metadata) = self.registration(&row)?;

        let in_scope = self.decide_scope(&metadata);
        let instance = DatabaseInstance::database(
            sid,
            db_home.to_path_buf(),
            self.hostname,
            self.home.version.major,
            crs_registered,
            metadata,
        )
        .with_scope(in_scope);

        self.log_details(&instance);

        if !instance.in_scope() && !self.register_out_of_scope {
            log.log_info(&format!(
                "Database [{}] won't be patched.",
                instance.unique_name().unwrap_or(sid)
            ));
            return Ok(None);
        }

        Ok(Some(instance))
    }

    /// Registration class and metadata, from the database or from srvctl
    fn registration(&self, row: &InstanceMetadataRow) -> PatchResult<(bool, DatabaseMetadata)> {
        let strategy = self.home.version.dialect.strategy();
        let status = self.executor.execute(&self.tool(
            "srvctl",
            &format!("status database {} {}", strategy.database_flag, row.unique_name),
        ))?;

        let status_line = Regex::new(markers::DATABASE_STATUS_LINE)
            .map_err(|e| PatchError::pattern(markers::DATABASE_STATUS_LINE, e))?;
        let count = status.lines().filter(|l| status_line.is_match(l)).count();

        match count {
            0 => Ok((
                false,
                DatabaseMetadata {
                    name: Some(row.name.clone()),
                    unique_name: row.unique_name.clone(),
                    is_rac: patch::to_bool(&Value::String(row.cluster_database.clone()))?,
                    is_standby: is_physical_standby(&row.role),
                    initial_state: Some(InitialState::parse(&row.status)),
                },
            )),
            1 => {
                let config = self.executor.execute(&self.tool(
                    "srvctl",
                    &format!(
                        "config database {} {} {}",
                        strategy.database_flag, row.unique_name, strategy.config_all_flag
                    ),
                ))?;

                let start_option = config_value(&config, "Start options").unwrap_or("");
                let initial_state = if start_option.is_empty() {
                    InitialState::Open
                } else {
                    InitialState::parse(start_option)
                };

                Ok((
                    true,
                    DatabaseMetadata {
                        name: Some(row.name.clone()),
                        unique_name: row.unique_name.clone(),
                        is_rac: config_value(&config, "Type")
                            .map(|t| t.eq_ignore_ascii_case("RAC"))
                            .unwrap_or(false),
                        is_standby: config_value(&config, "Database role")
                            .map(is_physical_standby)
                            .unwrap_or(false),
                        initial_state: Some(initial_state),
                    },
                ))
            }
            _ => Err(PatchError::AmbiguousRegistration {
                unique_name: row.unique_name.clone(),
                count,
            }),
        }
    }

    fn decide_scope(&self, metadata: &DatabaseMetadata) -> bool {
        let log = self.executor.log();
        let unique_name = &metadata.unique_name;

        match self.scope {
            PatchScope::HomeOnly | PatchScope::NoDatabases => false,
            PatchScope::AllDatabases => {
                if metadata.is_standby {
                    log.log_info(&format!(
                        "Database [{}] won't be patched because it's a standby.",
                        unique_name
                    ));
                }
                !metadata.is_standby
            }
            PatchScope::Listed(list) => {
                log.log_info(&format!("db_unique_name list: {:?}", list));
                log.log_info(&format!(
                    "Checking whether database [{}] exists in the user-defined list of databases.",
                    unique_name
                ));
                if !list.iter().any(|name| name == unique_name) {
                    log.log_info(&format!(
                        "Instance [{}] is not in the specified list.",
                        unique_name
                    ));
                    false
                } else if metadata.is_standby {
                    log.log_info(&format!(
                        "Instance [{}] is found in the specified list, but it won't be patched because it's a standby.",
                        unique_name
                    ));
                    false
                } else {
                    log.log_info(&format!(
                        "Instance [{}] is found in the specified list, will be patched.",
                        unique_name
                    ));
                    true
                }
            }
        }
    }

    fn log_details(&self, instance: &DatabaseInstance) {
        let log = self.executor.log();
        let state = instance
            .initial_state()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "None".to_string());
        let name = instance
            .metadata()
            .and_then(|m| m.name.clone())
            .unwrap_or_default();

        log.log_bare("==========================");
        log.log_bare("Database details:");
        log.log_bare(&format!("Database name: {}", name));
        log.log_bare(&format!(
            "Database unique name: {}",
            instance.unique_name().unwrap_or("")
        ));
        log.log_bare(&format!("Database version: {}", instance.version));
        log.log_bare(&format!("Database hostname: {}", instance.hostname));
        log.log_bare(&format!("Database standby role: {}", instance.is_standby()));
        log.log_bare(&format!("Database RAC: {}", instance.is_rac()));
        log.log_bare(&format!("Database initial state: {}", state));
        log.log_bare(&format!("Database will be patched: {}", instance.in_scope()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_row_parse() {
        let output = "\n;PROD;READ WRITE;PRIMARY;FALSE;1;OPEN;PRODDB\n";
        let row = InstanceMetadataRow::parse(output).unwrap();
        assert_eq!(row.name, "PROD");
        assert_eq!(row.role, "PRIMARY");
        assert_eq!(row.status, "OPEN");
        assert_eq!(row.unique_name, "PRODDB");

        assert!(InstanceMetadataRow::parse("ORA-01034: ORACLE not available").is_none());
        assert!(InstanceMetadataRow::parse(";A;B").is_none());
    }

    #[test]
    fn test_config_value() {
        let config = "Database unique name: PRODDB\nDatabase role: PHYSICAL_STANDBY\nType: RAC\nStart options: mount";
        assert_eq!(config_value(config, "Type"), Some("RAC"));
        assert_eq!(config_value(config, "start options"), Some("mount"));
        assert_eq!(config_value(config, "Missing"), None);
        assert!(is_physical_standby(config_value(config, "Database role").unwrap()));
        assert!(is_physical_standby("PHYSICAL STANDBY"));
        assert!(!is_physical_standby("PRIMARY"));
    }

    #[test]
    fn test_scope_from_flags() {
        assert_eq!(PatchScope::from_flags(true, true, &[]), PatchScope::HomeOnly);
        assert_eq!(PatchScope::from_flags(false, true, &[]), PatchScope::AllDatabases);
        assert_eq!(
            PatchScope::from_flags(false, false, &["A".to_string()]),
            PatchScope::Listed(vec!["A".to_string()])
        );
        assert_eq!(PatchScope::from_flags(false, false, &[]), PatchScope::NoDatabases);
    }
}
