//! Instance and listener records discovered for a run

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Open state recorded before services were stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InitialState {
    Open,
    Mounted,
    Down,
    Other(String),
}

impl InitialState {
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim().to_uppercase();
        match value.as_str() {
            "OPEN" => InitialState::Open,
            "MOUNTED" | "MOUNT" => InitialState::Mounted,
            "DOWN" => InitialState::Down,
            _ => InitialState::Other(value),
        }
    }
}

impl fmt::Display for InitialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialState::Open => write!(f, "OPEN"),
            InitialState::Mounted => write!(f, "MOUNTED"),
            InitialState::Down => write!(f, "DOWN"),
            InitialState::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Database-specific facts; ASM instances have none
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseMetadata {
    pub name: Option<String>,
    pub unique_name: String,
    pub is_rac: bool,
    pub is_standby: bool,
    pub initial_state: Option<InitialState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InstanceRole {
    Asm,
    Database(DatabaseMetadata),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInstance {
    pub sid: String,
    pub oracle_home: PathBuf,
    pub hostname: String,
    pub version: u32,
    /// Registered with Oracle Restart or the cluster-ware
    pub crs_registered: bool,
    pub role: InstanceRole,
    in_scope: bool,
}

impl DatabaseInstance {
    pub fn asm(sid: impl Into<String>, oracle_home: PathBuf, hostname: &str, version: u32) -> Self {
        Self {
            sid: sid.into(),
            oracle_home,
            hostname: hostname.to_string(),
            version,
            crs_registered: true,
            role: InstanceRole::Asm,
            in_scope: false,
        }
    }

    pub fn database(
        sid: impl Into<String>,
        oracle_home: PathBuf,
        hostname: &str,
        version: u32,
        crs_registered: bool,
        metadata: DatabaseMetadata,
    ) -> Self {
        Self {
            sid: sid.into(),
            oracle_home,
            hostname: hostname.to_string(),
            version,
            crs_registered,
            role: InstanceRole::Database(metadata),
            in_scope: false,
        }
    }

    /// Scope is decided once, at registration
    pub fn with_scope(mut self, in_scope: bool) -> Self {
        self.in_scope = in_scope && !self.is_standby() && !self.is_asm();
        self
    }

    pub fn in_scope(&self) -> bool {
        self.in_scope
    }

    pub fn is_asm(&self) -> bool {
        matches!(self.role, InstanceRole::Asm)
    }

    pub fn metadata(&self) -> Option<&DatabaseMetadata> {
        match &self.role {
            InstanceRole::Asm => None,
            InstanceRole::Database(metadata) => Some(metadata),
        }
    }

    pub fn unique_name(&self) -> Option<&str> {
        self.metadata().map(|m| m.unique_name.as_str())
    }

    pub fn is_rac(&self) -> bool {
        self.metadata().map(|m| m.is_rac).unwrap_or(false)
    }

    pub fn is_standby(&self) -> bool {
        self.metadata().map(|m| m.is_standby).unwrap_or(false)
    }

    pub fn initial_state(&self) -> Option<&InitialState> {
        self.metadata().and_then(|m| m.initial_state.as_ref())
    }

    /// Display name for log lines
    pub fn label(&self) -> String {
        match self.metadata() {
            Some(m) => format!(
                "{}/{}",
                m.name.as_deref().unwrap_or(&self.sid),
                m.unique_name
            ),
            None => self.sid.clone(),
        }
    }
}

/// Listener identity: name plus owning home
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ListenerKey {
    pub name: String,
    pub home: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listener {
    pub name: String,
    pub oracle_home: PathBuf,
}

impl Listener {
    pub fn new(name: impl Into<String>, oracle_home: PathBuf) -> Self {
        Self {
            name: name.into(),
            oracle_home,
        }
    }

    pub fn key(&self) -> ListenerKey {
        ListenerKey {
            name: self.name.clone(),
            home: self.oracle_home.clone(),
        }
    }
}

/// Instances keyed by SID, listeners by (name, home)
#[derive(Debug, Clone, Default, Serialize)]
pub struct Topology {
    pub instances: BTreeMap<String, DatabaseInstance>,
    pub listeners: BTreeMap<ListenerKey, Listener>,
}

impl Topology {
    pub fn register_instance(&mut self, instance: DatabaseInstance) {
        self.instances.insert(instance.sid.clone(), instance);
    }

    pub fn register_listener(&mut self, listener: Listener) {
        self.listeners.insert(listener.key(), listener);
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.listeners.is_empty()
    }

    pub fn asm_instances(&self) -> impl Iterator<Item = &DatabaseInstance> {
        self.instances.values().filter(|i| i.is_asm())
    }

    pub fn database_instances(&self) -> impl Iterator<Item = &DatabaseInstance> {
        self.instances.values().filter(|i| !i.is_asm())
    }
}
