// Internal modules
pub mod applier;
pub mod config;
pub mod context;
pub mod dialect;
pub mod errors;
pub mod executor;
pub mod inventory;
pub mod lifecycle;
pub mod logging;
pub mod outcome;
pub mod patch;
pub mod topology;
pub mod verify;

// Re-export key types for library consumers
pub use applier::{PatchEngine, RunOutcome, Sleeper, ThreadSleeper};
pub use config::EnginePreferences;
pub use context::{Credential, Function, RunPhase, RunRequest, RunResponse};
pub use errors::{PatchError, PatchResult};
pub use executor::{CommandRunner, ScriptedExecutor, SystemCommandExecutor};
