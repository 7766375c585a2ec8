//! Prerequisite runs of `opatch prereq`

use super::staging;
use super::PatchRun;
use crate::errors::{PatchError, PatchResult};
use crate::executor::ShellCommand;
use crate::logging::codes;
use crate::outcome::PrereqCheck;

impl PatchRun<'_> {
    fn run_prereq(&self, check: PrereqCheck, dir: &str) -> PatchResult<()> {
        let command = self.opatch(&format!("prereq {} -phBaseDir {}", check.command(), dir));
        let output = self.executor.execute(&command)?;

        if !check.passed(&output)? {
            return Err(PatchError::PrerequisiteFailed {
                check: check.command(),
                home: self.home.path.clone(),
            });
        }

        self.ctx.log.log_info_with_code(
            codes::progress::PREREQUISITE_PASSED,
            &format!("{} passed for {}", check.command(), dir),
        );
        Ok(())
    }

    pub(crate) fn opatch(&self, args: &str) -> ShellCommand {
        ShellCommand::new(format!("{}/OPatch/opatch {}", self.home.display(), args))
            .with_env("ORACLE_HOME", self.home.display())
    }

    pub(crate) fn check_minimum_opatch_version(&self) -> PatchResult<()> {
        for descriptor in self.ctx.patches.values() {
            self.ctx.log.log_info(&format!(
                "Check minimum OPatch version for OH: {}",
                self.home.display()
            ));
            let dir = staging::min_opatch_dir(&self.ctx.stage, descriptor)?;
            self.run_prereq(PrereqCheck::MinimumOPatchVersion, &dir)?;
        }
        Ok(())
    }

    /// Conflict check then space check for every staged component
    pub(crate) fn check_conflict_against_oh(&self) -> PatchResult<()> {
        for descriptor in self.ctx.patches.values() {
            self.ctx
                .log
                .log_info(&format!("Check conflict for patch: {}", descriptor.label()));
            for dir in staging::conflict_dirs(&self.ctx.stage, descriptor) {
                self.run_prereq(PrereqCheck::ConflictAgainstOH, &dir)?;
                self.run_prereq(PrereqCheck::SystemSpace, &dir)?;
            }
        }
        Ok(())
    }
}
