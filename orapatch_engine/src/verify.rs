//! Post-stop verification that nothing still runs from the home

use crate::errors::{PatchError, PatchResult};
use crate::executor::CommandExecutor;
use crate::inventory::OracleHome;
use crate::topology::process_table::{ASM_PMON, DATABASE_PMON};
use crate::topology::{InitialState, ProcessTable, Topology};

/// Fail when a process references the home or an expected-down instance
/// still has a live monitor process
///
/// Grid homes are skipped; the automated-apply tool manages their stack.
pub fn check_no_running_services(
    executor: &CommandExecutor,
    home: &OracleHome,
    topology: &Topology,
) -> PatchResult<()> {
    let log = executor.log();
    if home.is_grid {
        log.log_info("This is CRS configuration, opatchauto takes care.");
        log.log_info("Skip CHECK_RUNNING_SERVICES_FROM_OH.");
        return Ok(());
    }

    let processes = ProcessTable::capture(executor)?;
    let mut offenders = processes.referencing(&home.path)?;

    for instance in topology.instances.values() {
        if instance.initial_state() == Some(&InitialState::Down) {
            continue;
        }
        let prefix = if instance.is_asm() {
            ASM_PMON
        } else {
            DATABASE_PMON
        };
        if processes.pmon_running(prefix, &instance.sid)? {
            offenders.push(format!("{}_{}", prefix, instance.sid));
        }
    }

    if offenders.is_empty() {
        return Ok(());
    }

    for process in &offenders {
        log.log_warning(&format!("Still running: {}", process));
    }
    Err(PatchError::RunningServices {
        home: home.path.clone(),
        processes: offenders,
    })
}
