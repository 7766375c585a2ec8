//! Operating-system instance registry (`/etc/oratab`)

use crate::errors::{PatchError, PatchResult};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OratabEntry {
    pub sid: String,
    pub home: PathBuf,
    pub autostart: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Oratab {
    entries: Vec<OratabEntry>,
}

impl Oratab {
    pub fn load(path: &Path) -> PatchResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| PatchError::io(path, e))?;
        Ok(Self::parse(&content))
    }

    /// Parse `SID:HOME:FLAG` lines, skipping comments and blank lines
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let mut fields = line.split(':');
                let sid = fields.next()?.trim();
                let home = fields.next()?.trim();
                if sid.is_empty() || home.is_empty() {
                    return None;
                }
                Some(OratabEntry {
                    sid: sid.to_string(),
                    home: PathBuf::from(home.trim_end_matches('/')),
                    autostart: fields.next().map(|f| f.trim().to_string()),
                })
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[OratabEntry] {
        &self.entries
    }

    /// Entries pointing at `home`, in file order
    pub fn for_home<'a>(&'a self, home: &'a Path) -> impl Iterator<Item = &'a OratabEntry> + 'a {
        self.entries.iter().filter(move |entry| entry.home == home)
    }

    pub fn home_of(&self, sid: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|entry| entry.sid == sid)
            .map(|entry| entry.home.as_path())
    }
}
