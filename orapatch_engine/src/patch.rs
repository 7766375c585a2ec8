//! Patch descriptors built from raw patch metadata records

use crate::errors::{PatchError, PatchResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Sub-patches a patch bundle can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Component {
    ProactiveBundle,
    Grid,
    Database,
    Ocw,
    Ojvm,
    Acfs,
    DbWlm,
}

impl Component {
    /// Record key holding the component id
    pub fn key(&self) -> &'static str {
        match self {
            Component::ProactiveBundle => "patch_proactive_bp_id",
            Component::Grid => "patch_gi_id",
            Component::Database => "patch_db_id",
            Component::Ocw => "patch_ocw_id",
            Component::Ojvm => "patch_ojvm_id",
            Component::Acfs => "patch_acfs_id",
            Component::DbWlm => "patch_dbwlm_id",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Component::ProactiveBundle => "proactive bundle",
            Component::Grid => "grid infrastructure",
            Component::Database => "database",
            Component::Ocw => "OCW",
            Component::Ojvm => "OJVM",
            Component::Acfs => "ACFS",
            Component::DbWlm => "DBWLM",
        }
    }
}

/// Component ids of one patch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComponentIds {
    pub proactive_bp: Option<u64>,
    pub gi: Option<u64>,
    pub db: Option<u64>,
    pub ocw: Option<u64>,
    pub ojvm: Option<u64>,
    pub acfs: Option<u64>,
    pub dbwlm: Option<u64>,
}

impl ComponentIds {
    pub fn get(&self, component: Component) -> Option<u64> {
        match component {
            Component::ProactiveBundle => self.proactive_bp,
            Component::Grid => self.gi,
            Component::Database => self.db,
            Component::Ocw => self.ocw,
            Component::Ojvm => self.ojvm,
            Component::Acfs => self.acfs,
            Component::DbWlm => self.dbwlm,
        }
    }
}

/// Typed patch definition
///
/// The bundle, combo and grid classifications are derived once in `new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchDescriptor {
    pub patch_id: u64,
    pub components: ComponentIds,
    /// Staging directory relative to the staging root
    pub patch_dir: String,
    pub file: Option<String>,
    /// Binaries only, no dictionary changes
    pub only_oh: bool,
    pub description: String,
    is_bundle: bool,
    is_combo: bool,
    is_grid: bool,
}

impl PatchDescriptor {
    pub fn new(
        patch_id: u64,
        components: ComponentIds,
        patch_dir: impl Into<String>,
        file: Option<String>,
        only_oh: bool,
        description: impl Into<String>,
    ) -> Self {
        let is_bundle = components.proactive_bp.is_some();
        let is_combo = components.ojvm.is_some()
            && (components.proactive_bp.is_some()
                || components.db.is_some()
                || components.gi.is_some());
        let is_grid = components.gi.is_some();

        Self {
            patch_id,
            components,
            patch_dir: patch_dir.into(),
            file,
            only_oh,
            description: description.into(),
            is_bundle,
            is_combo,
            is_grid,
        }
    }

    /// Build a descriptor from a raw metadata record
    pub fn from_record(record: &Map<String, Value>) -> PatchResult<Self> {
        let patch_id = component_id(record, "patch_id")?.ok_or_else(|| malformed("missing patch_id"))?;

        let components = ComponentIds {
            proactive_bp: component_id(record, Component::ProactiveBundle.key())?,
            gi: component_id(record, Component::Grid.key())?,
            db: component_id(record, Component::Database.key())?,
            ocw: component_id(record, Component::Ocw.key())?,
            ojvm: component_id(record, Component::Ojvm.key())?,
            acfs: component_id(record, Component::Acfs.key())?,
            dbwlm: component_id(record, Component::DbWlm.key())?,
        };

        let patch_dir = text(record, "patch_dir")
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| malformed("missing patch_dir"))?;
        let only_oh = match record.get("only_oh") {
            Some(value) => to_bool(value)?,
            None => false,
        };

        Ok(Self::new(
            patch_id,
            components,
            patch_dir,
            text(record, "file").filter(|f| !f.is_empty()),
            only_oh,
            text(record, "desc").unwrap_or_default(),
        ))
    }

    pub fn is_bundle(&self) -> bool {
        self.is_bundle
    }

    pub fn is_combo(&self) -> bool {
        self.is_combo
    }

    pub fn is_grid(&self) -> bool {
        self.is_grid
    }

    pub fn component(&self, component: Component) -> Option<u64> {
        self.components.get(component)
    }

    /// Component id that a command needs; absence is a record error
    pub fn require(&self, component: Component, purpose: &'static str) -> PatchResult<u64> {
        self.component(component)
            .ok_or(PatchError::MissingComponent {
                patch_id: self.patch_id,
                component: component.name(),
                purpose,
            })
    }

    pub fn label(&self) -> String {
        if self.description.is_empty() {
            format!("patch {}", self.patch_id)
        } else {
            self.description.clone()
        }
    }
}

/// Descriptors requested in one run, keyed by patch id
pub type PatchSet = BTreeMap<u64, PatchDescriptor>;

/// Resolve the record for `patch_id` into a patch set
pub fn resolve_patch_set(patch_id: u64, record: &Value) -> PatchResult<PatchSet> {
    let map = record
        .as_object()
        .ok_or_else(|| malformed("patch record is not a map"))?;
    let descriptor = PatchDescriptor::from_record(map)?;

    if descriptor.patch_id != patch_id {
        return Err(malformed(&format!(
            "record describes patch {} but patch {} was requested",
            descriptor.patch_id, patch_id
        )));
    }

    let mut set = PatchSet::new();
    set.insert(descriptor.patch_id, descriptor);
    Ok(set)
}

fn malformed(reason: &str) -> PatchError {
    PatchError::MalformedRecord {
        reason: reason.to_string(),
    }
}

fn text(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ids may be numbers or numeric strings; blank and null mean absent
fn component_id(record: &Map<String, Value>, key: &str) -> PatchResult<Option<u64>> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|id| Some(id).filter(|id| *id != 0))
            .ok_or_else(|| malformed(&format!("{} is not a patch number: {}", key, n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| malformed(&format!("{} is not a patch number: {}", key, s))),
        Some(other) => Err(malformed(&format!(
            "{} is not a patch number: {}",
            key, other
        ))),
    }
}

/// Lenient boolean conversion; unknown spellings are rejected
pub fn to_bool(value: &Value) -> PatchResult<bool> {
    let text = match value {
        Value::Bool(b) => return Ok(*b),
        Value::Null => return Ok(false),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(a) if a.is_empty() => return Ok(false),
        Value::Object(o) if o.is_empty() => return Ok(false),
        other => other.to_string(),
    };

    match text.to_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" => Ok(true),
        "no" | "n" | "false" | "f" | "0" | "0.0" | "" | "none" => Ok(false),
        _ => Err(malformed(&format!(
            "Invalid value for boolean conversion: {}",
            text
        ))),
    }
}
