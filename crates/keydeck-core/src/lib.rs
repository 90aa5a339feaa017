//! # keydeck-core
//!
//! Core functionality for keydeck including:
//! - A name-keyed API key registry with at most one active key
//! - File-backed secret and metadata stores with atomic writes
//! - A built-in catalog of API providers
//! - Synthesis of the external tool's settings from the active key
//! - Merge / overwrite / preview reconciliation with backups

pub mod config;
pub mod credential;
pub mod error;
pub mod provider;
pub mod settings;
pub mod storage;
mod keydeck;

pub use config::AppConfig;
pub use credential::{
    mask_secret, Inconsistency, KeyFilter, KeyRecord, KeyRegistry, RepairAction, SecretValue,
};
pub use error::{ErrorKind, KeydeckError, Result};
pub use keydeck::Keydeck;
pub use provider::{ModelTiers, Provider, ProviderCatalog, ProviderProfile};
pub use settings::{
    ExistingDocument, FieldPath, Ownership, PreviewTarget, ReconcileMode, ReconciliationResult,
    SettingsDiff, SettingsDocument, SettingsReconciler, SettingsSynthesizer, SynthesisDefaults,
};
pub use storage::{EnvFileSecretStore, JsonMetadataStore, MetadataStore, SecretStore};
