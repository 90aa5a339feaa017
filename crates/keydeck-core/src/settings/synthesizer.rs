//! Builds the external tool's settings from the active key

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::{FieldPath, SettingsDocument};
use super::merge::{merge_documents, Ownership};
use crate::credential::{KeyRecord, SecretValue};
use crate::error::{KeydeckError, Result};
use crate::provider::ProviderProfile;

/// Section holding the tool's environment variables
pub const ENV_SECTION: &str = "env";
pub const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";
pub const AUTH_TOKEN_VAR: &str = "ANTHROPIC_AUTH_TOKEN";
pub const FAST_MODEL_VAR: &str = "ANTHROPIC_DEFAULT_HAIKU_MODEL";
pub const BALANCED_MODEL_VAR: &str = "ANTHROPIC_DEFAULT_SONNET_MODEL";
pub const POWERFUL_MODEL_VAR: &str = "ANTHROPIC_DEFAULT_OPUS_MODEL";
pub const TIMEOUT_VAR: &str = "API_TIMEOUT_MS";
pub const TRAFFIC_VAR: &str = "CLAUDE_CODE_DISABLE_NONESSENTIAL_TRAFFIC";

/// Every `env` variable keydeck writes, in output order
pub const OWNED_ENV_VARS: [&str; 7] = [
    BASE_URL_VAR,
    AUTH_TOKEN_VAR,
    FAST_MODEL_VAR,
    BALANCED_MODEL_VAR,
    POWERFUL_MODEL_VAR,
    TIMEOUT_VAR,
    TRAFFIC_VAR,
];

/// Paths of the fields keydeck owns in the target document
pub fn owned_paths() -> Vec<FieldPath> {
    OWNED_ENV_VARS
        .iter()
        .map(|var| FieldPath::new([ENV_SECTION, *var]))
        .collect()
}

/// Paths whose values are secrets and must be masked for display
pub fn secret_paths() -> Vec<FieldPath> {
    vec![FieldPath::new([ENV_SECTION, AUTH_TOKEN_VAR])]
}

/// Fixed operational defaults written alongside the provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthesisDefaults {
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Turn off telemetry and other non-essential traffic
    pub disable_nonessential_traffic: bool,
}

impl Default for SynthesisDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: 3_000_000,
            disable_nonessential_traffic: true,
        }
    }
}

/// Settings synthesizer
#[derive(Debug, Clone, Default)]
pub struct SettingsSynthesizer {
    defaults: SynthesisDefaults,
}

impl SettingsSynthesizer {
    pub fn new(defaults: SynthesisDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &SynthesisDefaults {
        &self.defaults
    }

    /// Build the candidate document for `record`
    ///
    /// The output depends only on the inputs, so equal inputs give equal
    /// documents down to key order. `overrides` are deep-merged on top and
    /// win field by field.
    pub fn synthesize(
        &self,
        record: &KeyRecord,
        secret: &SecretValue,
        profile: &ProviderProfile,
        overrides: Option<&SettingsDocument>,
    ) -> Result<SettingsDocument> {
        if record.provider != profile.provider {
            return Err(KeydeckError::ProviderMismatch {
                record: record.name.clone(),
                record_provider: record.provider.to_string(),
                profile_provider: profile.provider.to_string(),
            });
        }

        let traffic_flag = if self.defaults.disable_nonessential_traffic {
            "1"
        } else {
            "0"
        };

        let mut env = Map::new();
        let mut put = |var: &str, value: &str| {
            env.insert(var.to_string(), Value::String(value.to_string()));
        };
        put(BASE_URL_VAR, profile.base_url);
        put(AUTH_TOKEN_VAR, secret.expose());
        put(FAST_MODEL_VAR, profile.default_models.fast);
        put(BALANCED_MODEL_VAR, profile.default_models.balanced);
        put(POWERFUL_MODEL_VAR, profile.default_models.powerful);
        put(TIMEOUT_VAR, &self.defaults.timeout_ms.to_string());
        put(TRAFFIC_VAR, traffic_flag);

        let mut root = Map::new();
        root.insert(ENV_SECTION.to_string(), Value::Object(env));
        let document = SettingsDocument::from_map(root);

        Ok(match overrides {
            Some(overrides) => merge_documents(&document, overrides, &Ownership::Candidate),
            None => document,
        })
    }

    /// Ownership to use when merging a document produced with `overrides`
    pub fn ownership(&self, overrides: Option<&SettingsDocument>) -> Ownership {
        let mut paths = owned_paths();
        if let Some(overrides) = overrides {
            paths.extend(overrides.leaf_paths());
        }
        Ownership::Paths(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Provider, ProviderCatalog};
    use serde_json::json;

    fn record(provider: Provider) -> KeyRecord {
        KeyRecord::new("WORK_KEY", provider).unwrap()
    }

    #[test]
    fn test_synthesize_anthropic() {
        let catalog = ProviderCatalog::builtin();
        let profile = catalog.resolve("anthropic").unwrap();
        let doc = SettingsSynthesizer::default()
            .synthesize(&record(Provider::Anthropic), &SecretValue::from("sk-ant-xyz"), profile, None)
            .unwrap();

        let expected = SettingsDocument::from_value(json!({
            "env": {
                "ANTHROPIC_BASE_URL": "https://api.anthropic.com",
                "ANTHROPIC_AUTH_TOKEN": "sk-ant-xyz",
                "ANTHROPIC_DEFAULT_HAIKU_MODEL": "claude-3-haiku-20240307",
                "ANTHROPIC_DEFAULT_SONNET_MODEL": "claude-3-5-sonnet-20241022",
                "ANTHROPIC_DEFAULT_OPUS_MODEL": "claude-3-opus-20240229",
                "API_TIMEOUT_MS": "3000000",
                "CLAUDE_CODE_DISABLE_NONESSENTIAL_TRAFFIC": "1"
            }
        }))
        .unwrap();
        assert_eq!(doc, expected);
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let profile = ProviderCatalog::builtin().resolve("glm").unwrap();
        let synth = SettingsSynthesizer::new(SynthesisDefaults {
            timeout_ms: 600_000,
            disable_nonessential_traffic: false,
        });
        let rec = record(Provider::Glm);
        let secret = SecretValue::from("glm-secret");

        let a = synth.synthesize(&rec, &secret, profile, None).unwrap();
        let b = synth.synthesize(&rec, &secret, profile, None).unwrap();
        assert_eq!(a.to_pretty_string().unwrap(), b.to_pretty_string().unwrap());
        assert_eq!(
            a.get(&FieldPath::parse("env.API_TIMEOUT_MS")),
            Some(&json!("600000"))
        );
        assert_eq!(
            a.get(&FieldPath::parse("env.CLAUDE_CODE_DISABLE_NONESSENTIAL_TRAFFIC")),
            Some(&json!("0"))
        );
    }

    #[test]
    fn test_overrides_win_field_by_field() {
        let profile = ProviderCatalog::builtin().resolve("glm").unwrap();
        let overrides = SettingsDocument::from_value(json!({
            "env": { "ANTHROPIC_DEFAULT_OPUS_MODEL": "glm-custom" },
            "alwaysThinkingEnabled": true
        }))
        .unwrap();

        let synth = SettingsSynthesizer::default();
        let doc = synth
            .synthesize(&record(Provider::Glm), &SecretValue::from("s"), profile, Some(&overrides))
            .unwrap();

        assert_eq!(
            doc.get(&FieldPath::parse("env.ANTHROPIC_DEFAULT_OPUS_MODEL")),
            Some(&json!("glm-custom"))
        );
        assert_eq!(
            doc.get(&FieldPath::parse("env.ANTHROPIC_DEFAULT_SONNET_MODEL")),
            Some(&json!("glm-4.6"))
        );
        assert_eq!(doc.get(&FieldPath::parse("alwaysThinkingEnabled")), Some(&json!(true)));

        let ownership = synth.ownership(Some(&overrides));
        assert!(ownership.owns(&FieldPath::parse("alwaysThinkingEnabled")));
        assert!(ownership.owns(&FieldPath::parse("env.ANTHROPIC_AUTH_TOKEN")));
        assert!(!ownership.owns(&FieldPath::parse("env.MY_VAR")));
    }

    #[test]
    fn test_provider_mismatch() {
        let profile = ProviderCatalog::builtin().resolve("glm").unwrap();
        let err = SettingsSynthesizer::default()
            .synthesize(&record(Provider::Anthropic), &SecretValue::from("s"), profile, None)
            .unwrap_err();
        assert!(matches!(err, KeydeckError::ProviderMismatch { .. }));
    }
}
