//! Patch applier
//!
//! One `PatchEngine::run` call is one invocation. A run walks
//! `Idle -> PreparingInventory -> PreFlight -> Applying -> PostFlight -> Done`,
//! or goes through `CheckingPrerequisitesOnly` for the prerequisite
//! functions. The first error ends the run and leaves the installation as it
//! is.

pub mod binaries;
pub mod dictionary;
pub mod prereq;
pub mod staging;

use crate::config::EnginePreferences;
use crate::context::{Function, RunContext, RunPhase, RunRequest, RunResponse};
use crate::errors::{PatchError, PatchResult};
use crate::executor::{CommandExecutor, CommandRunner, SystemCommandExecutor};
use crate::inventory::{self, OracleHome};
use crate::lifecycle::ServiceController;
use crate::logging::{self, codes, LoggingService};
use crate::patch::PatchDescriptor;
use crate::topology::{Oratab, Topology, TopologyBuilder};
use crate::verify;
use std::sync::Arc;
use std::time::Duration;

/// Blocking wait used between cluster health polls
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Successful end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub changed: bool,
    /// Set by the already-applied check
    pub patch_applied: bool,
    pub msg: String,
}

impl RunOutcome {
    fn unchanged() -> Self {
        Self {
            changed: false,
            patch_applied: false,
            msg: "Finished.".to_string(),
        }
    }
}

pub struct PatchEngine {
    runner: Arc<dyn CommandRunner>,
    prefs: EnginePreferences,
    sleeper: Arc<dyn Sleeper>,
    log: Option<LoggingService>,
}

impl Default for PatchEngine {
    fn default() -> Self {
        Self::new(Arc::new(SystemCommandExecutor::new()))
    }
}

impl PatchEngine {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            prefs: EnginePreferences::default(),
            sleeper: Arc::new(ThreadSleeper),
            log: None,
        }
    }

    pub fn with_preferences(mut self, prefs: EnginePreferences) -> Self {
        self.prefs = prefs;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Use this service instead of one built from the request
    pub fn with_log(mut self, log: LoggingService) -> Self {
        self.log = Some(log);
        self
    }

    pub fn preferences(&self) -> &EnginePreferences {
        &self.prefs
    }

    fn log_for(&self, request: &RunRequest) -> LoggingService {
        match &self.log {
            Some(log) => log.clone(),
            None => logging::create_run_service(request.log_file.as_deref(), request.debug),
        }
    }

    /// Run one request; failures become a failed response
    pub fn run(&self, request: &RunRequest) -> RunResponse {
        let log = self.log_for(request);
        match self.try_run(request, &log) {
            Ok(outcome) => RunResponse::success(outcome.changed, outcome.msg),
            Err(err) => {
                let home = request
                    .oracle_home
                    .as_deref()
                    .map(|h| h.display().to_string())
                    .unwrap_or_default();
                log.log_error_with_context(
                    err.code(),
                    &format!("Module fail: {}", err),
                    vec![("function", request.function.as_str()), ("home", home.as_str())],
                );
                RunResponse::failure(&err)
            }
        }
    }

    pub fn try_run(&self, request: &RunRequest, log: &LoggingService) -> PatchResult<RunOutcome> {
        let function: Function = request.function.parse()?;

        match function {
            Function::StartLoggerSession => {
                logging::start_session(log, request.debug);
                return Ok(RunOutcome::unchanged());
            }
            Function::EndLoggerSession => {
                logging::end_session(log);
                return Ok(RunOutcome::unchanged());
            }
            _ => {}
        }

        let ctx = RunContext::from_request(request, function, &self.prefs.oratab, log.clone())?;
        if ctx.debug {
            log.log_info(&format!(
                "Debug is enabled for: [{}].",
                ctx.oracle_home.display()
            ));
        } else {
            log.log_info(&format!(
                "Debug is not enabled for: [{}].",
                ctx.oracle_home.display()
            ));
        }

        let executor = CommandExecutor::new(self.runner.clone(), log.clone(), &self.prefs)?;
        let mut run = PatchRun::prepare(ctx, executor, &self.prefs, self.sleeper.as_ref())?;
        run.dispatch()?;
        Ok(run.finish())
    }
}

// ============================================================================
// RUN
// ============================================================================

/// Everything one run owns once the home has been discovered
pub(crate) struct PatchRun<'e> {
    pub(crate) ctx: RunContext,
    pub(crate) executor: CommandExecutor,
    pub(crate) home: OracleHome,
    pub(crate) prefs: &'e EnginePreferences,
    pub(crate) sleeper: &'e dyn Sleeper,
    pub(crate) ocm_file: Option<String>,
}

impl<'e> PatchRun<'e> {
    fn prepare(
        mut ctx: RunContext,
        executor: CommandExecutor,
        prefs: &'e EnginePreferences,
        sleeper: &'e dyn Sleeper,
    ) -> PatchResult<Self> {
        ctx.enter(RunPhase::PreparingInventory);
        let home = inventory::discover_home(&ctx.oracle_home, &prefs.orainst_loc, &executor)?;

        Ok(Self {
            ctx,
            executor,
            home,
            prefs,
            sleeper,
            ocm_file: None,
        })
    }

    /// Descriptor of the requested patch
    pub(crate) fn descriptor(&self) -> PatchResult<&PatchDescriptor> {
        self.ctx
            .patches
            .get(&self.ctx.patch_id)
            .ok_or_else(|| PatchError::MalformedRecord {
                reason: format!("no record for patch {}", self.ctx.patch_id),
            })
    }

    fn banner(&self, step: &str) {
        self.ctx
            .log
            .log_banner(&format!("{} => {}", self.ctx.function, step));
    }

    fn skip(&self, message: &str) {
        self.ctx
            .log
            .log_info_with_code(codes::progress::SKIPPED, message);
    }

    /// Why a database-level function does not run, if it does not
    fn database_gate(&self) -> PatchResult<Option<String>> {
        let function = self.ctx.function;
        let descriptor = self.descriptor()?;

        if self.ctx.only_prereq {
            return Ok(Some(format!("Prerequisite-only run, skip {}.", function)));
        }
        if self.ctx.patch_only_oh || descriptor.only_oh {
            return Ok(Some(format!(
                "Oracle home only patching requested, skip {}.",
                function
            )));
        }
        if self.home.is_grid {
            return Ok(Some(format!(
                "This is CRS configuration, skip {}.",
                function
            )));
        }
        if function.is_ojvm() && descriptor.component(crate::patch::Component::Ojvm).is_none() {
            self.skip("Skip OJVM.");
            return Ok(Some(
                "OJVM patch number not defined in patch metadata file.".to_string(),
            ));
        }
        Ok(None)
    }

    fn dispatch(&mut self) -> PatchResult<()> {
        let function = self.ctx.function;

        match function {
            Function::CheckOpatchMinVersion => {
                self.ctx.enter(RunPhase::CheckingPrerequisitesOnly);
                self.ctx.log.log_banner("FUNC => CHECK_OPATCH_MIN_VERSION");
                self.check_minimum_opatch_version()?;
            }
            Function::CheckConflictAgainstOh => {
                self.ctx.enter(RunPhase::CheckingPrerequisitesOnly);
                self.ctx.log.log_banner("FUNC => CHECK_CONFLICT_AGAINST_OH");
                self.check_conflict_against_oh()?;
            }
            Function::PatchOh => {
                if self.ctx.only_prereq {
                    self.skip("Prerequisite-only run, skip PATCH_OH.");
                } else if self.ctx.verify_applied && self.already_applied()? {
                    self.skip("Skip PATCH_OH.");
                } else {
                    if self.home.version.dialect.strategy().needs_ocm_response {
                        self.generate_ocm_file()?;
                    }
                    self.pre_patch()?;
                    self.apply_banner();
                    self.patch_oh()?;
                    self.post_patch()?;
                }
            }
            Function::PatchOhOjvm => match self.database_gate()? {
                Some(reason) => self.skip(&reason),
                None => {
                    if self.home.version.dialect.strategy().needs_ocm_response {
                        self.generate_ocm_file()?;
                    }
                    self.pre_patch()?;
                    self.apply_banner();
                    self.patch_oh_ojvm()?;
                    self.post_patch()?;
                }
            },
            Function::PatchDb | Function::PatchDbOjvm => match self.database_gate()? {
                Some(reason) => self.skip(&reason),
                None => {
                    if self.home.is_cluster() && !self.cluster_state_allows_dictionary()? {
                        self.ctx.enter(RunPhase::Done);
                        return Ok(());
                    }
                    self.pre_patch()?;
                    self.apply_banner();
                    self.patch_databases(function == Function::PatchDbOjvm)?;
                    self.post_patch()?;
                }
            },
            Function::StartLoggerSession | Function::EndLoggerSession => {}
        }

        self.ctx.enter(RunPhase::Done);
        Ok(())
    }

    fn apply_banner(&mut self) {
        self.ctx.enter(RunPhase::Applying);
        self.ctx
            .log
            .log_banner(&format!("FUNC => {}", self.ctx.function));
    }

    /// Discover what runs from the home, stop it and verify it stopped
    fn pre_patch(&mut self) -> PatchResult<()> {
        self.ctx.enter(RunPhase::PreFlight);
        let dictionary = self.ctx.function.is_dictionary();
        let oratab = Oratab::load(&self.ctx.oratab)?;

        let mut topology = Topology::default();
        {
            let mut builder = TopologyBuilder::new(
                &self.executor,
                &self.home,
                &oratab,
                &self.ctx.hostname,
                &self.ctx.scope,
            );
            if dictionary {
                builder = builder.scoped_only();
            }

            self.banner("BUILD_INSTANCE_LIST");
            builder.build_instances(&mut topology)?;

            if !dictionary {
                self.banner("BUILD_LISTENER_LIST");
                builder.build_listeners(&mut topology)?;
            }
        }
        self.ctx.topology = topology;

        self.banner("STOP_SERVICES_FROM_OH");
        ServiceController::new(&self.executor, self.home.version.dialect)
            .stop_services(&self.ctx.topology)?;

        if !dictionary {
            self.banner("CHECK_RUNNING_SERVICES_FROM_OH");
            verify::check_no_running_services(&self.executor, &self.home, &self.ctx.topology)?;
        }
        Ok(())
    }

    /// Restart what `pre_patch` stopped
    fn post_patch(&mut self) -> PatchResult<()> {
        self.ctx.enter(RunPhase::PostFlight);
        self.banner("START_SERVICES_FROM_OH");
        ServiceController::new(&self.executor, self.home.version.dialect)
            .start_services(&self.ctx.topology, self.home.is_grid)
    }

    fn finish(self) -> RunOutcome {
        RunOutcome {
            changed: self.ctx.changed(),
            patch_applied: self.ctx.patch_applied(),
            msg: "Finished.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptedExecutor;
    use crate::logging::{LogLevel, MemoryLogger};

    fn engine(runner: &ScriptedExecutor) -> (PatchEngine, Arc<MemoryLogger>) {
        let memory = Arc::new(MemoryLogger::new());
        let engine = PatchEngine::new(Arc::new(runner.clone()))
            .with_log(LoggingService::new(memory.clone(), LogLevel::Debug));
        (engine, memory)
    }

    #[test]
    fn test_logger_sessions_are_unchanged() {
        let runner = ScriptedExecutor::new();
        let (engine, memory) = engine(&runner);

        let response = engine.run(&RunRequest::new(Function::StartLoggerSession));
        assert_eq!(response, RunResponse::success(false, "Finished."));
        let response = engine.run(&RunRequest::new(Function::EndLoggerSession));
        assert!(!response.changed);

        assert!(memory.contains("orapatch session start"));
        assert!(memory.contains("orapatch session end"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_unknown_function_fails() {
        let runner = ScriptedExecutor::new();
        let (engine, memory) = engine(&runner);

        let mut request = RunRequest::default();
        request.function = "REBUILD_HOME".to_string();
        let response = engine.run(&request);

        assert!(response.failed);
        assert_eq!(response.rc, 245);
        assert!(response.msg.contains("Unsupported function: REBUILD_HOME"));
        assert!(memory.contains("Module fail: Unsupported function"));
    }

    #[test]
    fn test_missing_parameters_fail_before_any_command() {
        let runner = ScriptedExecutor::new();
        let (engine, _) = engine(&runner);

        let response = engine.run(&RunRequest::new(Function::PatchOh));
        assert!(response.failed);
        assert!(response
            .msg
            .starts_with("[orapatch] module fail: Specify all required arguments."));
        assert!(runner.calls().is_empty());
    }
}
