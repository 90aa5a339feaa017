//! Static provider catalog
//!
//! Maps a provider identifier to its base URL and default model tiers.
//! Adding a provider means adding a [`Provider`] variant and a catalog row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeydeckError, Result};

/// Known API vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Anthropic's first-party API
    Anthropic,
    /// Z.ai GLM through its Anthropic-compatible endpoint
    Glm,
}

impl Provider {
    /// Every provider, in catalog order
    pub const ALL: [Provider; 2] = [Provider::Anthropic, Provider::Glm];

    /// Stable identifier used on disk and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Glm => "glm",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = KeydeckError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| KeydeckError::UnknownProvider(s.to_string()))
    }
}

/// Default model per tier, ordered fast -> powerful
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTiers {
    pub fast: &'static str,
    pub balanced: &'static str,
    pub powerful: &'static str,
}

/// Everything needed to generate settings for one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider: Provider,
    pub display_name: &'static str,
    pub base_url: &'static str,
    pub default_models: ModelTiers,
    /// Prefix real secrets for this provider start with, if any
    pub secret_prefix: Option<&'static str>,
}

static BUILTIN_PROFILES: [ProviderProfile; 2] = [
    ProviderProfile {
        provider: Provider::Anthropic,
        display_name: "Anthropic",
        base_url: "https://api.anthropic.com",
        default_models: ModelTiers {
            fast: "claude-3-haiku-20240307",
            balanced: "claude-3-5-sonnet-20241022",
            powerful: "claude-3-opus-20240229",
        },
        secret_prefix: Some("sk-ant-"),
    },
    ProviderProfile {
        provider: Provider::Glm,
        display_name: "Z.ai GLM",
        base_url: "https://api.z.ai/api/anthropic",
        default_models: ModelTiers {
            fast: "glm-4.5",
            balanced: "glm-4.6",
            powerful: "glm-4.7",
        },
        secret_prefix: None,
    },
];

/// Immutable lookup table of provider profiles
#[derive(Debug, Clone, Copy)]
pub struct ProviderCatalog {
    profiles: &'static [ProviderProfile],
}

impl ProviderCatalog {
    /// The catalog shipped with keydeck
    pub fn builtin() -> Self {
        Self {
            profiles: &BUILTIN_PROFILES,
        }
    }

    /// A catalog over a caller-supplied table
    pub fn with_profiles(profiles: &'static [ProviderProfile]) -> Self {
        Self { profiles }
    }

    /// Resolve a provider identifier to its profile
    pub fn resolve(&self, provider_id: &str) -> Result<&'static ProviderProfile> {
        let provider: Provider = provider_id.parse()?;
        self.profile(provider)
    }

    /// Look up the profile of an already-parsed provider
    pub fn profile(&self, provider: Provider) -> Result<&'static ProviderProfile> {
        self.profiles
            .iter()
            .find(|p| p.provider == provider)
            .ok_or_else(|| KeydeckError::UnknownProvider(provider.to_string()))
    }

    /// All profiles in catalog order
    pub fn profiles(&self) -> &'static [ProviderProfile] {
        self.profiles
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
