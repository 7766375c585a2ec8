//! Binary patching of the home and the checks around it

use super::staging;
use super::PatchRun;
use crate::config::constants::{markers, paths};
use crate::errors::{PatchError, PatchResult};
use crate::executor::{PromptTable, ShellCommand};
use crate::logging::codes;
use crate::outcome::{self, Classification, OutcomeClassifier, PatchPresence};
use crate::patch::{Component, PatchDescriptor};
use chrono::Local;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Lines of `crsctl check` output that do not report an online resource
pub(crate) fn count_not_online(output: &str) -> usize {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.ends_with(markers::RESOURCE_ONLINE_SUFFIX))
        .count()
}

/// `crs_home=` from the local registry pointer; `None` when absent
pub(crate) fn read_crs_home(olr_loc: &Path) -> PatchResult<Option<String>> {
    if !olr_loc.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(olr_loc).map_err(|e| PatchError::io(olr_loc, e))?;
    Ok(content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("crs_home="))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty()))
}

impl PatchRun<'_> {
    // ========================================================================
    // PRIVILEGED EXECUTION
    // ========================================================================

    /// `su -c` answered with the credential, or `sudo` without one
    pub(crate) fn run_privileged(&self, line: &str) -> PatchResult<String> {
        match &self.ctx.credential {
            Some(credential) => {
                let prompts = PromptTable::standard()?.with_password(credential.expose())?;
                let command = ShellCommand::new(format!("su -c \"{}\"", line))
                    .with_env("ORACLE_HOME", self.home.display());
                self.executor.execute_interactive(&command, &prompts)
            }
            None => {
                let command = ShellCommand::new(format!("sudo {}", line))
                    .with_env("ORACLE_HOME", self.home.display());
                self.executor.execute(&command)
            }
        }
    }

    // ========================================================================
    // OCM RESPONSE FILE
    // ========================================================================

    pub(crate) fn generate_ocm_file(&mut self) -> PatchResult<()> {
        let file = self
            .prefs
            .response_dir
            .join(format!(
                "{}{}.rsp",
                paths::OCM_FILE_PREFIX,
                Local::now().format(paths::OCM_TIMESTAMP_FORMAT)
            ))
            .display()
            .to_string();

        let command = ShellCommand::new(format!(
            "{}/OPatch/ocm/bin/emocmrsp -no_banner -output {}",
            self.home.display(),
            file
        ))
        .with_env("ORACLE_HOME", self.home.display());
        self.executor
            .execute_interactive(&command, &PromptTable::standard()?)?;

        self.ctx.log.log_debug(&format!("OCM response file: {}", file));
        self.ocm_file = Some(file);
        Ok(())
    }

    fn ocm_argument(&self) -> String {
        let needs_ocm = self.home.version.dialect.strategy().needs_ocm_response;
        match &self.ocm_file {
            Some(file) if needs_ocm => format!(" -ocmrf {}", file),
            _ => String::new(),
        }
    }

    // ========================================================================
    // ALREADY-APPLIED CHECK
    // ========================================================================

    /// Whether `opatch lspatches` reports the requested patch as present
    pub(crate) fn already_applied(&mut self) -> PatchResult<bool> {
        let command = self.opatch(&format!("lspatches -id {}", self.ctx.patch_id));
        let output = self.executor.execute(&command)?;

        match outcome::classify_presence(&output)? {
            PatchPresence::Present => {
                self.ctx.mark_patch_applied();
                self.ctx.log.log_info_with_code(
                    codes::progress::SKIPPED,
                    &format!(
                        "Patch {} is already applied to {}.",
                        self.ctx.patch_id,
                        self.home.display()
                    ),
                );
                Ok(true)
            }
            PatchPresence::Absent => Ok(false),
            PatchPresence::Unknown => Err(PatchError::UnrecognizedOutput {
                command: command.line().to_string(),
                message: "Unknown error for patch existence check.".to_string(),
            }),
        }
    }

    // ========================================================================
    // CLUSTER UPGRADE STATE
    // ========================================================================

    /// Dictionary patching on a cluster member needs a NORMAL upgrade state
    pub(crate) fn cluster_state_allows_dictionary(&self) -> PatchResult<bool> {
        let log = &self.ctx.log;
        log.log_info("Checking if cluster is in NORMAL upgrade state.");

        let crs_home = read_crs_home(&self.prefs.olr_loc)?;
        log.log_info(&format!("CRS_HOME: {}", crs_home.as_deref().unwrap_or("")));
        let Some(crs_home) = crs_home else {
            return Ok(true);
        };

        let output =
            self.run_privileged(&format!("{}/bin/crsctl query crs activeversion -f", crs_home))?;
        if outcome::cluster_state_is_normal(&output)? {
            return Ok(true);
        }

        log.log_info(&format!("Cluster state is: {}", output));
        log.log_info("Database dictionary won't be patched.");
        Ok(false)
    }

    // ========================================================================
    // APPLY
    // ========================================================================

    fn record_outcome(&mut self, classification: Classification, command: &str) -> PatchResult<()> {
        match classification {
            Classification::Applied => {
                self.ctx.mark_changed();
                self.ctx.log.log_info_with_code(
                    codes::progress::PATCH_APPLIED,
                    &format!("Patch applied to {}.", self.home.display()),
                );
                Ok(())
            }
            Classification::NoActionNeeded => {
                self.ctx.log.log_info_with_code(
                    codes::progress::NO_ACTION_NEEDED,
                    &format!("No need to apply this patch to {}.", self.home.display()),
                );
                Ok(())
            }
            Classification::Unrecognized => Err(PatchError::UnrecognizedOutput {
                command: command.to_string(),
                message: format!("Error during applying patch for: {}", self.home.display()),
            }),
        }
    }

    fn descriptors(&self) -> Vec<PatchDescriptor> {
        self.ctx.patches.values().cloned().collect()
    }

    pub(crate) fn patch_oh(&mut self) -> PatchResult<()> {
        if self.home.is_grid {
            self.patch_grid_oh()?;
            self.wait_for_stack()
        } else {
            self.patch_db_oh()
        }
    }

    fn patch_grid_oh(&mut self) -> PatchResult<()> {
        let dialect = self.home.version.dialect;
        let strategy = dialect.strategy();
        let classifier = OutcomeClassifier::auto_apply(strategy.auto_apply_success)?;

        for descriptor in self.descriptors() {
            let line = format!(
                "{home}/OPatch/{tool} {dir}{sub} -oh {home}{ocm}",
                home = self.home.display(),
                tool = strategy.auto_apply,
                dir = staging::base_dir(&self.ctx.stage, &descriptor),
                sub = staging::grid_apply_subpath(dialect, &descriptor)?,
                ocm = self.ocm_argument(),
            );
            let output = self.run_privileged(&line)?;
            self.record_outcome(classifier.classify(&output), &line)?;
        }
        Ok(())
    }

    fn patch_db_oh(&mut self) -> PatchResult<()> {
        let classifier = OutcomeClassifier::opatch_apply()?;

        for descriptor in self.descriptors() {
            let command = self.opatch(&format!(
                "apply -silent {}{}{}",
                staging::base_dir(&self.ctx.stage, &descriptor),
                staging::db_apply_subpath(&descriptor)?,
                self.ocm_argument()
            ));
            let output = self.executor.execute(&command)?;
            self.record_outcome(classifier.classify(&output), command.line())?;
        }
        Ok(())
    }

    pub(crate) fn patch_oh_ojvm(&mut self) -> PatchResult<()> {
        let classifier = OutcomeClassifier::opatch_apply()?;

        for descriptor in self.descriptors() {
            let Some(ojvm) = descriptor.component(Component::Ojvm) else {
                self.ctx
                    .log
                    .log_info("Skip OJVM as the patch could not be identified.");
                continue;
            };

            let command = self.opatch(&format!(
                "apply -silent {}/{}{}",
                staging::base_dir(&self.ctx.stage, &descriptor),
                ojvm,
                self.ocm_argument()
            ));
            let output = self.executor.execute(&command)?;
            self.record_outcome(classifier.classify(&output), command.line())?;
        }
        Ok(())
    }

    // ========================================================================
    // STACK HEALTH
    // ========================================================================

    /// Poll `crsctl check` until every resource reports online
    pub(crate) fn wait_for_stack(&self) -> PatchResult<()> {
        let log = &self.ctx.log;
        let (label, check) = if self.home.is_cluster() {
            ("CRS", "check crs")
        } else {
            ("HAS", "check has")
        };
        let command = ShellCommand::new(format!("{}/bin/crsctl {}", self.home.display(), check))
            .with_env("ORACLE_HOME", self.home.display());

        let poll = self.prefs.health_poll().max(Duration::from_secs(1));
        let budget = self.prefs.health_budget();
        let mut waited = Duration::ZERO;

        loop {
            let output = self.executor.execute(&command)?;
            if count_not_online(&output) == 0 {
                log.log_info_with_code(
                    codes::progress::STACK_ONLINE,
                    &format!("{} is online, continue...", label),
                );
                return Ok(());
            }

            if waited >= budget {
                log.log_info(&format!(
                    "Timeout: {} did not start within given {} seconds period",
                    label,
                    budget.as_secs()
                ));
                return Err(PatchError::ClusterHealthTimeout {
                    label,
                    budget_secs: budget.as_secs(),
                });
            }

            log.log_info(&format!(
                "{} is not online, check again in {} seconds...",
                label,
                poll.as_secs()
            ));
            self.sleeper.sleep(poll);
            waited += poll;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_count_not_online() {
        let output = "\
CRS-4638: Oracle High Availability Services is online
CRS-4537: Cluster Ready Services is online
CRS-4529: Cluster Synchronization Services is online
";
        assert_eq!(count_not_online(output), 0);

        let output = "\
CRS-4638: Oracle High Availability Services is online
CRS-4535: Cannot communicate with Cluster Ready Services
";
        assert_eq!(count_not_online(output), 1);
        assert_eq!(count_not_online(""), 0);
    }

    #[test]
    fn test_read_crs_home() {
        let dir = TempDir::new().unwrap();
        let olr = dir.path().join("olr.loc");
        assert_eq!(read_crs_home(&olr).unwrap(), None);

        fs::write(&olr, "olrconfig_loc=/u01/grid/cdata/node1.olr\ncrs_home=/u01/grid\n").unwrap();
        assert_eq!(read_crs_home(&olr).unwrap().as_deref(), Some("/u01/grid"));
    }
}
