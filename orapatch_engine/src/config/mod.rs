//! Configuration for the patch engine
//!
//! `constants` holds the fixed tool markers and defaults, `runtime` the
//! preferences an operator can override through `ORAPATCH_*` variables.

pub mod constants;
pub mod runtime;

pub use runtime::EnginePreferences;
