//! External tool settings: document model, synthesis and reconciliation
//!
//! Data flows one way: the active key goes through [`SettingsSynthesizer`]
//! to produce a candidate document, and [`SettingsReconciler`] applies that
//! candidate to the target file (or previews it).

mod diff;
mod document;
mod merge;
mod reconciler;
mod synthesizer;
mod validate;

pub use diff::{diff_documents, ChangeKind, FieldChange, SettingsDiff};
pub use document::{FieldPath, SettingsDocument};
pub use merge::{merge_documents, Ownership};
pub use reconciler::{
    ExistingDocument, PreviewTarget, ReconcileMode, ReconcilePlan, ReconciliationResult,
    SettingsReconciler,
};
pub use synthesizer::{
    owned_paths, secret_paths, SettingsSynthesizer, SynthesisDefaults, AUTH_TOKEN_VAR,
    BASE_URL_VAR, ENV_SECTION, OWNED_ENV_VARS,
};
pub use validate::{inspect_target, validate_document, Severity, TargetReport, ValidationIssue};
