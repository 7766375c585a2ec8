//! Staging sub-paths handed to the patch tools
//!
//! A descriptor's `patch_dir` is relative to the staging root. Combos nest
//! their components one or two levels deeper, and which level a tool wants
//! depends on the tool, the dialect and the descriptor class.

use crate::dialect::Dialect;
use crate::errors::PatchResult;
use crate::patch::{Component, PatchDescriptor};
use std::path::Path;

/// `<stage>/<dir>`
pub fn base_dir(stage: &Path, descriptor: &PatchDescriptor) -> String {
    format!(
        "{}/{}",
        stage.display().to_string().trim_end_matches('/'),
        descriptor.patch_dir
    )
}

/// Directory for `CheckMinimumOPatchVersion`
pub fn min_opatch_dir(stage: &Path, descriptor: &PatchDescriptor) -> PatchResult<String> {
    let base = base_dir(stage, descriptor);
    if !descriptor.is_combo() {
        return Ok(base);
    }

    let parent = if let Some(bp) = descriptor.component(Component::ProactiveBundle) {
        bp
    } else if let Some(gi) = descriptor.component(Component::Grid) {
        gi
    } else {
        return Ok(base);
    };
    let db = descriptor.require(Component::Database, "the minimum OPatch version check")?;
    Ok(format!("{}/{}/{}", base, parent, db))
}

/// Directories for the conflict and space checks
///
/// A combo gets one entry per patchable component under its bundle or grid
/// directory; anything else is checked once on the base directory.
pub fn conflict_dirs(stage: &Path, descriptor: &PatchDescriptor) -> Vec<String> {
    let base = base_dir(stage, descriptor);
    if !descriptor.is_combo() {
        return vec![base];
    }

    let parent = descriptor
        .component(Component::ProactiveBundle)
        .or_else(|| descriptor.component(Component::Grid));
    let combo_base = match parent {
        Some(id) => format!("{}/{}", base, id),
        None => base,
    };

    let dirs: Vec<String> = [
        Component::Database,
        Component::Ocw,
        Component::DbWlm,
        Component::Acfs,
    ]
    .into_iter()
    .filter_map(|component| descriptor.component(component))
    .map(|id| format!("{}/{}", combo_base, id))
    .collect();

    if dirs.is_empty() {
        vec![combo_base]
    } else {
        dirs
    }
}

/// Sub-path for the automated-apply wrapper on a grid home
pub fn grid_apply_subpath(dialect: Dialect, descriptor: &PatchDescriptor) -> PatchResult<String> {
    if !descriptor.is_combo() {
        return Ok(String::new());
    }

    match dialect {
        Dialect::New if descriptor.is_bundle() => {
            let bp = descriptor.require(Component::ProactiveBundle, "grid home patching")?;
            let db = descriptor.require(Component::Database, "grid home patching")?;
            Ok(format!("/{}/{}", bp, db))
        }
        Dialect::New | Dialect::Old => {
            let gi = descriptor.require(Component::Grid, "grid home patching")?;
            Ok(format!("/{}", gi))
        }
    }
}

/// Sub-path for `opatch apply` on a database home
///
/// A plain database patch is staged directly in its directory.
pub fn db_apply_subpath(descriptor: &PatchDescriptor) -> PatchResult<String> {
    const PURPOSE: &str = "database home patching";

    if descriptor.is_combo() {
        let db = descriptor.require(Component::Database, PURPOSE)?;
        let parent = if descriptor.is_bundle() {
            descriptor.component(Component::ProactiveBundle)
        } else if descriptor.is_grid() {
            descriptor.component(Component::Grid)
        } else {
            None
        };
        return Ok(match parent {
            Some(parent) => format!("/{}/{}", parent, db),
            None => format!("/{}", db),
        });
    }

    if descriptor.is_bundle() || descriptor.is_grid() {
        let db = descriptor.require(Component::Database, PURPOSE)?;
        return Ok(format!("/{}", db));
    }

    Ok(String::new())
}
