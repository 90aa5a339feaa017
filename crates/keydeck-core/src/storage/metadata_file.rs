//! JSON metadata store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fs::{read_optional, write_atomic};
use super::MetadataStore;
use crate::credential::{validate_name, KeyRecord};
use crate::error::{KeydeckError, Result};

/// Current on-disk format version
const FORMAT_VERSION: u32 = 1;

/// File format for persistent metadata
#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    version: u32,
    keys: BTreeMap<String, KeyRecord>,
}

/// Metadata store backed by a single JSON file
pub struct JsonMetadataStore {
    path: PathBuf,
}

impl JsonMetadataStore {
    /// Create a store for `path`. Nothing is read until [`MetadataStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl Into<String>) -> KeydeckError {
        KeydeckError::CorruptStore {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl MetadataStore for JsonMetadataStore {
    fn load(&self) -> Result<BTreeMap<String, KeyRecord>> {
        let Some(contents) = read_optional(&self.path).map_err(|e| KeydeckError::io(&self.path, e))?
        else {
            debug!("No metadata file at {:?}", self.path);
            return Ok(BTreeMap::new());
        };

        let file: MetadataFile =
            serde_json::from_str(&contents).map_err(|e| self.corrupt(e.to_string()))?;
        if file.version != FORMAT_VERSION {
            return Err(self.corrupt(format!("unsupported version {}", file.version)));
        }

        for (name, record) in &file.keys {
            validate_name(name).map_err(|_| self.corrupt(format!("invalid key name '{}'", name)))?;
            if name != &record.name {
                return Err(self.corrupt(format!(
                    "entry '{}' holds record named '{}'",
                    name, record.name
                )));
            }
        }

        debug!("Loaded {} key records from {:?}", file.keys.len(), self.path);
        Ok(file.keys)
    }

    fn save(&mut self, records: &BTreeMap<String, KeyRecord>) -> Result<()> {
        let file = MetadataFile {
            version: FORMAT_VERSION,
            keys: records.clone(),
        };
        let mut contents = serde_json::to_string_pretty(&file)?;
        contents.push('\n');

        write_atomic(&self.path, contents.as_bytes()).map_err(|e| KeydeckError::io(&self.path, e))?;

        debug!("Saved {} key records to {:?}", records.len(), self.path);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "JSON File"
    }
}
