//! File-backed stores for secrets and key metadata
//!
//! This module provides:
//! 1. A dotenv-style secret store (name -> secret value)
//! 2. A JSON metadata store (name -> [`KeyRecord`](crate::credential::KeyRecord))
//! 3. The atomic write primitive every file in keydeck goes through

mod traits;
mod fs;
mod env_file;
mod metadata_file;

pub use traits::{FileWriter, MetadataStore, SecretStore};
pub use fs::{read_optional, AtomicFileWriter};
pub use env_file::EnvFileSecretStore;
pub use metadata_file::JsonMetadataStore;
