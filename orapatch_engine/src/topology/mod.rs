//! Live topology rooted at a home: instances and listeners

pub mod builder;
pub mod instance;
pub mod oratab;
pub mod process_table;

pub use builder::{PatchScope, TopologyBuilder};
pub use instance::{
    DatabaseInstance, DatabaseMetadata, InitialState, InstanceRole, Listener, ListenerKey,
    Topology,
};
pub use oratab::{Oratab, OratabEntry};
pub use process_table::ProcessTable;
