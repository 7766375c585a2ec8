//! Stop and start of instances, ASM and listeners
//!
//! Stop order is listeners, database instances, ASM. Start order mirrors it.
//! ASM lifecycle belongs to the grid automated-apply tool, so ASM calls only
//! log.

use crate::dialect::Dialect;
use crate::errors::PatchResult;
use crate::executor::{CommandExecutor, ShellCommand};
use crate::topology::{DatabaseInstance, InitialState, Listener, Topology};
use std::fmt;
use std::path::Path;

/// Startup modes understood by the lifecycle commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Open,
    Mount,
    Upgrade,
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            StartMode::Open => "open",
            StartMode::Mount => "mount",
            StartMode::Upgrade => "upgrade",
        };
        write!(f, "{}", mode)
    }
}

pub const DEFAULT_STOP_MODE: &str = "immediate";

pub struct ServiceController<'a> {
    executor: &'a CommandExecutor,
    dialect: Dialect,
}

fn tool(home: &Path, tool: &str, args: &str) -> ShellCommand {
    ShellCommand::new(format!("{}/bin/{} {}", home.display(), tool, args))
        .with_env("ORACLE_HOME", home.to_string_lossy())
}

fn sqlplus(instance: &DatabaseInstance, statement: &str) -> ShellCommand {
    tool(&instance.oracle_home, "sqlplus", "-s / as sysdba")
        .with_env("ORACLE_SID", instance.sid.as_str())
        .with_stdin(format!("{}\n", statement))
}

impl<'a> ServiceController<'a> {
    pub fn new(executor: &'a CommandExecutor, dialect: Dialect) -> Self {
        Self { executor, dialect }
    }

    pub fn stop_instance(&self, instance: &DatabaseInstance, mode: &str) -> PatchResult<()> {
        let log = self.executor.log();
        if instance.is_asm() {
            log.log_info("Skip ASM stop as opatchauto takes care");
            return Ok(());
        }

        let strategy = self.dialect.strategy();
        let unique = instance.unique_name().unwrap_or(&instance.sid);
        let command = if instance.is_rac() {
            tool(
                &instance.oracle_home,
                "srvctl",
                &format!(
                    "stop instance {} {} {} {} {} {}",
                    strategy.database_flag,
                    unique,
                    strategy.stop_option_flag,
                    mode,
                    strategy.instance_flag,
                    instance.sid
                ),
            )
        } else if instance.crs_registered {
            tool(
                &instance.oracle_home,
                "srvctl",
                &format!(
                    "stop database {} {} {} {}",
                    strategy.database_flag, unique, strategy.stop_option_flag, mode
                ),
            )
        } else {
            sqlplus(instance, &format!("shutdown {}", mode))
        };

        log.log_info(&format!("Stop instance: {}", instance.sid));
        self.executor.execute(&command)?;
        Ok(())
    }

    pub fn start_instance(&self, instance: &DatabaseInstance, mode: StartMode) -> PatchResult<()> {
        let log = self.executor.log();
        if instance.is_asm() {
            log.log_info("Skip ASM start as opatchauto takes care");
            return Ok(());
        }

        let strategy = self.dialect.strategy();
        let unique = instance.unique_name().unwrap_or(&instance.sid);
        let via_srvctl = mode != StartMode::Upgrade;
        let command = if instance.is_rac() && via_srvctl {
            tool(
                &instance.oracle_home,
                "srvctl",
                &format!(
                    "start instance {} {} {} {}",
                    strategy.database_flag, unique, strategy.instance_flag, instance.sid
                ),
            )
        } else if instance.crs_registered && via_srvctl {
            tool(
                &instance.oracle_home,
                "srvctl",
                &format!("start database {} {}", strategy.database_flag, unique),
            )
        } else {
            sqlplus(instance, &format!("startup {}", mode))
        };

        log.log_info(&format!("Starting instance: {}", instance.sid));
        self.executor.execute(&command)?;
        Ok(())
    }

    pub fn stop_listener(&self, listener: &Listener) -> PatchResult<()> {
        self.executor
            .log()
            .log_info(&format!("Stopping listener: {}", listener.name));
        self.executor.execute(&tool(
            &listener.oracle_home,
            "lsnrctl",
            &format!("stop {}", listener.name),
        ))?;
        Ok(())
    }

    pub fn start_listener(&self, listener: &Listener) -> PatchResult<()> {
        self.executor
            .log()
            .log_info(&format!("Starting listener: {}", listener.name));
        self.executor.execute(&tool(
            &listener.oracle_home,
            "lsnrctl",
            &format!("start {}", listener.name),
        ))?;
        Ok(())
    }

    /// Listeners, then database instances, then ASM
    pub fn stop_services(&self, topology: &Topology) -> PatchResult<()> {
        if topology.is_empty() {
            self.executor
                .log()
                .log_info("No instances or listeners found to stop.");
            return Ok(());
        }

        for listener in topology.listeners.values() {
            self.stop_listener(listener)?;
        }
        for instance in topology.database_instances() {
            self.stop_instance(instance, DEFAULT_STOP_MODE)?;
        }
        for instance in topology.asm_instances() {
            self.stop_instance(instance, DEFAULT_STOP_MODE)?;
        }
        Ok(())
    }

    /// ASM, then database instances in their recorded state, then listeners
    ///
    /// `force_open` opens every database regardless of its recorded state.
    pub fn start_services(&self, topology: &Topology, force_open: bool) -> PatchResult<()> {
        let log = self.executor.log();
        if topology.is_empty() {
            log.log_info("No instances or listeners found to start.");
            return Ok(());
        }

        for instance in topology.asm_instances() {
            self.start_instance(instance, StartMode::Open)?;
        }

        for instance in topology.database_instances() {
            let mode = match instance.initial_state() {
                _ if force_open => Some(StartMode::Open),
                Some(InitialState::Open) => Some(StartMode::Open),
                Some(InitialState::Mounted) => Some(StartMode::Mount),
                _ => None,
            };

            match mode {
                Some(mode) => self.start_instance(instance, mode)?,
                None => {
                    log.log_info(&format!(
                        "Database instance {} not started. Wrong initial state.",
                        instance.sid
                    ));
                    log.log_info(&format!(
                        "Database instance initial state: {}",
                        instance
                            .initial_state()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "None".to_string())
                    ));
                }
            }
        }

        for listener in topology.listeners.values() {
            self.start_listener(listener)?;
        }
        Ok(())
    }
}
