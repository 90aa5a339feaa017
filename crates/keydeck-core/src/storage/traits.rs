//! Storage trait definitions

use std::collections::BTreeMap;
use std::path::Path;

use crate::credential::{KeyRecord, SecretValue};
use crate::error::Result;

/// Key-value persistence of secret values keyed by name
pub trait SecretStore {
    /// Retrieve a secret by name
    fn get(&self, name: &str) -> Result<Option<SecretValue>>;

    /// Store a secret, replacing any previous value
    fn set(&mut self, name: &str, value: &SecretValue) -> Result<()>;

    /// Remove a secret. Returns `false` if it was not present
    fn remove(&mut self, name: &str) -> Result<bool>;

    /// Check if a secret exists
    fn contains(&self, name: &str) -> Result<bool>;

    /// Names of all stored secrets, sorted
    fn names(&self) -> Result<Vec<String>>;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}

/// Persistence of the full set of key records
///
/// The record set is always loaded and saved as a whole, so a single `save`
/// is the unit of atomicity for metadata changes.
pub trait MetadataStore {
    /// Load every record, keyed by name
    fn load(&self) -> Result<BTreeMap<String, KeyRecord>>;

    /// Replace the persisted record set
    fn save(&mut self, records: &BTreeMap<String, KeyRecord>) -> Result<()>;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}

/// Durable, all-or-nothing replacement of a file's content
pub trait FileWriter {
    /// Replace `path` with `contents`. On error the previous content of
    /// `path` must be left untouched.
    fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;
}
