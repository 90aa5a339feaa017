//! CLI command implementations.

pub mod active;
pub mod add;
pub mod delete;
pub mod doctor;
pub mod export;
pub mod list;
pub mod use_key;
pub mod validate;

use std::path::Path;

use clap::Args;
use keydeck_core::{PreviewTarget, ReconcileMode, SettingsDocument};

/// Reconciliation mode flags shared by `use` and `export`
#[derive(Args, Debug, Default, Clone)]
#[group(multiple = false)]
pub struct ModeArgs {
    /// Keep existing settings and update only the fields keydeck manages
    #[arg(long)]
    pub merge: bool,

    /// Replace the settings file entirely
    #[arg(long)]
    pub overwrite: bool,

    /// Show what would change without writing (merge by default)
    #[arg(
        long,
        value_name = "MODE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "merge"
    )]
    pub preview: Option<PreviewTarget>,
}

impl ModeArgs {
    /// The mode given on the command line, if any
    pub fn explicit(&self) -> Option<ReconcileMode> {
        if let Some(target) = self.preview {
            Some(ReconcileMode::Preview(target))
        } else if self.overwrite {
            Some(ReconcileMode::Overwrite)
        } else if self.merge {
            Some(ReconcileMode::Merge)
        } else {
            None
        }
    }
}

/// Parse an overrides file, if one was given
pub fn load_overrides(path: Option<&Path>) -> anyhow::Result<Option<SettingsDocument>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read overrides {}: {}", path.display(), e))?;
    let doc = SettingsDocument::parse(&text)
        .map_err(|e| anyhow::anyhow!("Invalid overrides {}: {}", path.display(), e))?;
    Ok(Some(doc))
}
