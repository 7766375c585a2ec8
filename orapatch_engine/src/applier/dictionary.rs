//! Dictionary patching of the databases running from the home

use super::PatchRun;
use crate::dialect::Dialect;
use crate::errors::PatchResult;
use crate::executor::ShellCommand;
use crate::lifecycle::{ServiceController, StartMode, DEFAULT_STOP_MODE};
use crate::logging::codes;
use crate::patch::Component;
use crate::topology::{DatabaseInstance, InitialState, PatchScope};

impl PatchRun<'_> {
    /// Patch every in-scope database whose recorded state is OPEN
    pub(crate) fn patch_databases(&mut self, ojvm: bool) -> PatchResult<()> {
        let log = self.ctx.log.clone();
        let instances: Vec<DatabaseInstance> =
            self.ctx.topology.database_instances().cloned().collect();

        if self.ctx.scope == PatchScope::AllDatabases {
            log.log_info(&format!(
                "Patch all databases for ORACLE_HOME: {}",
                self.home.display()
            ));
        } else {
            log.log_info(&format!(
                "Patch specific databases for ORACLE_HOME: {}",
                self.home.display()
            ));
            if instances.is_empty() {
                log.log_bare("No database found for patching.");
            }
            for instance in &instances {
                log.log_bare(&format!("database: {}", instance.label()));
            }
        }

        for instance in &instances {
            if !instance.in_scope() {
                log.log_info_with_code(
                    codes::progress::SKIPPED,
                    &format!("Skip database [{}].", instance.label()),
                );
                if instance.is_standby() {
                    log.log_bare(&format!(
                        "Database {} will not be patched because it's a standby database.",
                        instance.sid
                    ));
                }
                continue;
            }

            match instance.initial_state() {
                Some(InitialState::Open) => self.patch_dictionary(instance, ojvm)?,
                state => log.log_bare(&format!(
                    "Database {} will not be patched because its initial state is {}.",
                    instance.sid,
                    state
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                )),
            }
        }
        Ok(())
    }

    fn sqlplus_script(&self, instance: &DatabaseInstance, script: &str) -> ShellCommand {
        ShellCommand::new(format!("{}/bin/sqlplus / as sysdba", self.home.display()))
            .with_env("ORACLE_HOME", self.home.display())
            .with_env("ORACLE_SID", instance.sid.as_str())
            .with_stdin(format!("@{}\n", script))
    }

    /// Start, patch, stop; the start phase restores the recorded state later
    fn patch_dictionary(&mut self, instance: &DatabaseInstance, ojvm: bool) -> PatchResult<()> {
        let dialect = self.home.version.dialect;
        let home = self.home.display();
        let log = self.ctx.log.clone();

        let mode = if ojvm {
            StartMode::Upgrade
        } else {
            StartMode::Open
        };
        let command = match dialect {
            Dialect::New => {
                log.log_bare(&format!("Now patching database: \"{}\"", instance.sid));
                ShellCommand::new(format!("{}/OPatch/datapatch -verbose", home))
                    .with_env("ORACLE_HOME", home.as_str())
                    .with_env("ORACLE_SID", instance.sid.as_str())
            }
            Dialect::Old if ojvm => {
                let ojvm_id = self
                    .descriptor()?
                    .require(Component::Ojvm, "OJVM dictionary patching")?;
                log.log_bare(&format!(
                    "Now applying OJVM for database dictionary: \"{}\"",
                    instance.sid
                ));
                self.sqlplus_script(
                    instance,
                    &format!("{}/sqlpatch/{}/postinstall.sql", home, ojvm_id),
                )
            }
            Dialect::Old => {
                log.log_bare(&format!(
                    "Now applying PSU for database dictionary: \"{}\"",
                    instance.sid
                ));
                self.sqlplus_script(
                    instance,
                    &format!("{}/rdbms/admin/catbundle.sql psu apply", home),
                )
            }
        };

        let controller = ServiceController::new(&self.executor, dialect);
        controller.start_instance(instance, mode)?;
        self.executor.execute(&command)?;
        self.ctx.mark_changed();
        log.log_info(&format!(
            "Database dictionary \"{}\" was patched. Check logfiles for errors.",
            instance.sid
        ));
        controller.stop_instance(instance, DEFAULT_STOP_MODE)
    }
}
