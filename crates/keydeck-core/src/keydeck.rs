//! Main keydeck orchestration

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::credential::KeyRegistry;
use crate::error::Result;
use crate::settings::{
    inspect_target, PreviewTarget, ReconcileMode, ReconciliationResult, SettingsDocument,
    SettingsReconciler, SettingsSynthesizer, TargetReport,
};

/// Ties the key registry to the settings exporter
///
/// Activating a key and exporting settings are separate calls; nothing here
/// exports implicitly.
pub struct Keydeck {
    config: AppConfig,
    /// Key registry
    pub registry: KeyRegistry,
    synthesizer: SettingsSynthesizer,
    reconciler: SettingsReconciler,
}

impl Keydeck {
    /// Open the stores and target described by `config`
    pub fn open(config: AppConfig) -> Result<Self> {
        let registry = KeyRegistry::open_files(&config.secrets_path(), &config.metadata_path())?;
        let target = config.settings_target()?;
        let reconciler = SettingsReconciler::new(target).with_backup_dir(config.backup_dir.clone());
        let synthesizer = SettingsSynthesizer::new(config.synthesis.clone());

        debug!("Keydeck data directory: {:?}", config.data_dir);
        Ok(Self {
            config,
            registry,
            synthesizer,
            reconciler,
        })
    }

    /// Open with configuration from the environment and the default locations
    pub fn open_default() -> Result<Self> {
        Self::open(AppConfig::load()?)
    }

    /// Replace the reconciler (custom writer or target)
    pub fn with_reconciler(mut self, reconciler: SettingsReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &SettingsReconciler {
        &self.reconciler
    }

    /// Candidate document for the key `name`
    pub fn candidate(&self, name: &str, overrides: Option<&SettingsDocument>) -> Result<SettingsDocument> {
        let record = self.registry.get(name)?;
        let secret = self.registry.get_secret(name)?;
        let profile = self.registry.catalog().profile(record.provider)?;
        self.synthesizer.synthesize(record, &secret, profile, overrides)
    }

    /// Export settings for the active key into the target file
    pub fn export(
        &self,
        mode: ReconcileMode,
        overrides: Option<&SettingsDocument>,
    ) -> Result<ReconciliationResult> {
        let name = self.registry.get_active()?.name.clone();
        let candidate = self.candidate(&name, overrides)?;
        let ownership = self.synthesizer.ownership(overrides);
        let result = self.reconciler.reconcile(&candidate, mode, &ownership)?;

        if let ReconciliationResult::Applied { written, .. } = &result {
            info!("Exported key '{}' to {:?}", name, written);
        }
        Ok(result)
    }

    /// Diff the target against the settings `name` would produce, whether
    /// or not it is the active key
    pub fn preview_key(
        &self,
        name: &str,
        target: PreviewTarget,
        overrides: Option<&SettingsDocument>,
    ) -> Result<ReconciliationResult> {
        let candidate = self.candidate(name, overrides)?;
        let ownership = self.synthesizer.ownership(overrides);
        self.reconciler
            .reconcile(&candidate, ReconcileMode::Preview(target), &ownership)
    }

    /// Validate the current settings target
    pub fn inspect_target(&self) -> Result<TargetReport> {
        inspect_target(self.reconciler.target())
    }
}
