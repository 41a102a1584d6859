//! Directory-based persistence for pipelines, artifacts and their components.
//!
//! Every persistable component owns a directory holding a `metadata` document
//! and, for composites, one sub-directory per nested component saved with that
//! component's own routine. Loading goes through [`LoaderRegistry`], which
//! dispatches on the class recorded in each directory's metadata.

pub mod metadata;
pub mod registry;

pub use metadata::{read_metadata, read_metadata_expecting, write_metadata, Metadata};
pub use registry::LoaderRegistry;

use crate::config::PersistenceConfig;
use crate::error::{Result, ValsplitError};
use crate::types::{random_uid, ParamMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Options for a single save call
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOptions {
    /// Replace an existing non-empty target directory
    pub overwrite: bool,
    /// Pretty-print metadata documents
    pub pretty: bool,
    /// Also write the per-candidate models collected during fitting
    pub persist_sub_models: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            pretty: true,
            persist_sub_models: false,
        }
    }
}

impl SaveOptions {
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn with_sub_models(mut self) -> Self {
        self.persist_sub_models = true;
        self
    }

    /// Options passed to nested components. Sub-model persistence only
    /// applies to the artifact being saved, not to its descendants.
    pub fn nested(&self) -> Self {
        Self {
            persist_sub_models: false,
            ..self.clone()
        }
    }
}

impl From<&PersistenceConfig> for SaveOptions {
    fn from(config: &PersistenceConfig) -> Self {
        Self {
            overwrite: config.overwrite,
            pretty: config.pretty,
            persist_sub_models: config.persist_sub_models,
        }
    }
}

/// Save contract shared by every node of a persisted tree
pub trait Persistable {
    /// Implementation identity recorded as `class` in metadata
    fn identity(&self) -> &'static str;

    /// Fails if this component or anything it references cannot be saved.
    /// Called on the root before any file is written.
    fn ensure_persistable(&self, _options: &SaveOptions) -> Result<()> {
        Ok(())
    }

    /// Writes this component's layout into the existing, empty directory `path`
    fn save_to(&self, path: &Path, options: &SaveOptions) -> Result<()>;
}

/// Saves `component` at `path` after checking the whole tree is persistable.
///
/// The tree is written into a staging directory next to `path` and moved into
/// place once complete. A failed save leaves any previous artifact untouched.
pub fn save(component: &dyn Persistable, path: &Path, options: &SaveOptions) -> Result<()> {
    component.ensure_persistable(options)?;
    check_target(path, options.overwrite)?;

    let staging = staging_dir(path)?;
    log::debug!(
        "Saving {} to {} (staged at {})",
        component.identity(),
        path.display(),
        staging.display()
    );
    if let Err(e) = component.save_to(&staging, options) {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            log::warn!("Failed to remove {}: {}", staging.display(), cleanup);
        }
        return Err(e);
    }
    replace_target(path, &staging)
}

/// Saves a child component into `parent/name`
pub fn save_nested(
    component: &dyn Persistable,
    parent: &Path,
    name: &str,
    options: &SaveOptions,
) -> Result<()> {
    let path = parent.join(name);
    fs::create_dir_all(&path)?;
    component.save_to(&path, options)
}

/// Resolves the persistable view of a component or fails with a write error
pub fn require_persistable<'a>(
    component: Option<&'a dyn Persistable>,
    role: &str,
    uid: &str,
) -> Result<&'a dyn Persistable> {
    component.ok_or_else(|| {
        ValsplitError::persistence_write(format!(
            "{} {} does not support persistence",
            role, uid
        ))
    })
}

/// Fails if any float param is NaN or infinite. JSON has no encoding for them.
pub fn require_finite_params(params: &ParamMap, owner: &str) -> Result<()> {
    match params.first_non_finite() {
        Some(name) => Err(ValsplitError::persistence_write(format!(
            "{} has non-finite param '{}' which cannot be persisted",
            owner, name
        ))),
        None => Ok(()),
    }
}

/// Fails if `value` is NaN or infinite
pub fn require_finite(value: f64, name: &str, owner: &str) -> Result<()> {
    if value.is_finite() {
        return Ok(());
    }
    Err(ValsplitError::persistence_write(format!(
        "{} has non-finite {} ({}) which cannot be persisted",
        owner, name, value
    )))
}

fn check_target(path: &Path, overwrite: bool) -> Result<()> {
    if occupied(path)? && !overwrite {
        return Err(ValsplitError::persistence_write(format!(
            "path {} already exists; save with overwrite to replace it",
            path.display()
        )));
    }
    Ok(())
}

fn occupied(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    Ok(!path.is_dir() || fs::read_dir(path)?.next().is_some())
}

fn staging_dir(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        ValsplitError::persistence_write(format!("{} does not name a directory", path.display()))
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let staging = parent.join(format!(
        ".{}.{}",
        name.to_string_lossy(),
        random_uid("staging")
    ));
    fs::create_dir(&staging)?;
    Ok(staging)
}

fn replace_target(path: &Path, staging: &Path) -> Result<()> {
    if path.exists() {
        if occupied(path)? {
            log::warn!("Overwriting existing artifact at {}", path.display());
        }
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
    }
    fs::rename(staging, path)?;
    Ok(())
}
