use crate::error::{Result, ValsplitError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use super::SaveOptions;

/// File name of the metadata document inside every saved component directory
pub const METADATA_FILE: &str = "metadata";

/// On-disk metadata record.
///
/// `class`, `uid` and `paramMap` are required. Every other top-level key is an
/// extension field; readers look up the ones they know and ignore the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub class: String,
    pub uid: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "crateVersion", default)]
    pub crate_version: String,
    #[serde(rename = "paramMap")]
    pub param_map: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn new(class: &str, uid: &str, param_map: Map<String, Value>) -> Self {
        Self {
            class: class.to_string(),
            uid: uid.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            param_map,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// Required entry of `paramMap`
    pub fn param<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.param_map.get(name).ok_or_else(|| {
            ValsplitError::persistence_read(format!(
                "{} metadata is missing param '{}'",
                self.class, name
            ))
        })?;
        decode(&self.class, name, value.clone())
    }

    /// Entry of `paramMap` that may be absent or null
    pub fn optional_param<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.param_map.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(&self.class, name, value.clone()).map(Some),
        }
    }

    /// The whole `paramMap` decoded as one value
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        decode(&self.class, "paramMap", Value::Object(self.param_map.clone()))
    }

    /// Optional extension field
    pub fn extra_field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.extra.get(name) {
            Some(value) => decode(&self.class, name, value.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Required extension field
    pub fn require_extra<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.extra_field(name)?.ok_or_else(|| {
            ValsplitError::persistence_read(format!(
                "{} metadata is missing field '{}'",
                self.class, name
            ))
        })
    }
}

fn decode<T: DeserializeOwned>(class: &str, name: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        ValsplitError::persistence_read(format!("{} metadata has invalid '{}': {}", class, name, e))
    })
}

/// Writes `metadata` into the directory at `path`
pub fn write_metadata(path: &Path, metadata: &Metadata, options: &SaveOptions) -> Result<()> {
    let json = if options.pretty {
        serde_json::to_string_pretty(metadata)?
    } else {
        serde_json::to_string(metadata)?
    };
    fs::write(path.join(METADATA_FILE), json)?;
    Ok(())
}

/// Reads the metadata document of the component saved at `path`
pub fn read_metadata(path: &Path) -> Result<Metadata> {
    let file = path.join(METADATA_FILE);
    let contents = fs::read_to_string(&file).map_err(|e| {
        ValsplitError::persistence_read(format!("cannot read {}: {}", file.display(), e))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        ValsplitError::persistence_read(format!("corrupt metadata at {}: {}", file.display(), e))
    })
}

/// Reads metadata and requires its recorded class to be exactly `expected`
pub fn read_metadata_expecting(path: &Path, expected: &str) -> Result<Metadata> {
    let metadata = read_metadata(path)?;
    if metadata.class != expected {
        return Err(ValsplitError::persistence_read(format!(
            "expected class {} at {} but found {}",
            expected,
            path.display(),
            metadata.class
        )));
    }
    Ok(metadata)
}
