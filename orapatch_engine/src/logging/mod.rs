//! Run log for orapatch
//!
//! A `LoggingService` is created per run and carried by the run context.
//! Sinks: the append-only run-log file, the `log` facade and memory.

pub mod codes;
pub mod events;
pub mod service;

pub use codes::Code;
pub use events::{LogEvent, LogLevel};
pub use service::{
    FacadeLogger, FileLogger, Logger, LoggingService, MemoryLogger, TeeLogger,
};

use std::path::Path;
use std::sync::Arc;

/// Rule printed above and below phase banners
pub const BANNER_RULE: &str = "==============================================";

/// Rule printed around session markers
pub const SESSION_RULE: &str = "--------------------------------";

/// Service for a run: run-log file (when given) plus the `log` facade
pub fn create_run_service(log_file: Option<&Path>, debug: bool) -> LoggingService {
    let min_level = if debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let mut sinks: Vec<Arc<dyn Logger>> = vec![Arc::new(FacadeLogger)];
    if let Some(path) = log_file {
        sinks.push(Arc::new(FileLogger::new(path)));
    }

    LoggingService::new(Arc::new(TeeLogger::new(sinks)), min_level)
}

/// Write the session start marker
pub fn start_session(service: &LoggingService, debug: bool) {
    service.log_bare(SESSION_RULE);
    service.log_info_with_code(codes::progress::SESSION_START, "orapatch session start");
    service.log_bare(SESSION_RULE);

    if debug {
        service.log_info("Global debug is enabled.");
    } else {
        service.log_info("Global debug is not enabled.");
    }
}

/// Write the session end marker
pub fn end_session(service: &LoggingService) {
    service.log_bare(SESSION_RULE);
    service.log_info_with_code(codes::progress::SESSION_END, "orapatch session end");
    service.log_bare(SESSION_RULE);
}
