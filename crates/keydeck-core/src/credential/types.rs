//! Key record type definitions

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeydeckError, Result};
use crate::provider::Provider;

/// Number of trailing characters [`mask_secret`] leaves visible
pub const VISIBLE_SECRET_CHARS: usize = 4;

/// Check that `name` can be used as a key name
///
/// Names are primary keys in both stores and become variable names in the
/// secret file, so they must be non-empty and free of whitespace and `=`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '=') {
        return Err(KeydeckError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Mask a secret for display, revealing only the last four characters.
/// Secrets of four characters or fewer are masked entirely.
pub fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= VISIBLE_SECRET_CHARS {
        return "*".repeat(len);
    }

    let tail: String = secret.chars().skip(len - VISIBLE_SECRET_CHARS).collect();
    format!("{}{}", "*".repeat(len - VISIBLE_SECRET_CHARS), tail)
}

/// Key metadata (safe to display)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Unique name, also the secret store key
    pub name: String,

    /// Provider the secret belongs to
    pub provider: Provider,

    /// User-defined purpose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Categorization tags
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Whether this is the key exported to settings
    #[serde(default)]
    pub active: bool,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp, never earlier than `created_at`
    pub updated_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Create a new, inactive record
    pub fn new(name: &str, provider: Provider) -> Result<Self> {
        validate_name(name)?;
        let now = Utc::now();

        Ok(Self {
            name: name.to_string(),
            provider,
            description: None,
            tags: BTreeSet::new(),
            active: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Bump `updated_at` without ever moving it backwards
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Case-insensitive tag membership
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Filters for [`KeyRegistry::list`](super::KeyRegistry::list); set filters are ANDed
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    /// Only records of this provider
    pub provider: Option<Provider>,
    /// Only records carrying this tag (case-insensitive)
    pub tag: Option<String>,
    /// Case-insensitive substring of name or description
    pub search: Option<String>,
}

impl KeyFilter {
    /// Filter that matches everything
    pub fn all() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Check a record against every set filter
    pub fn matches(&self, record: &KeyRecord) -> bool {
        if let Some(provider) = self.provider {
            if record.provider != provider {
                return false;
            }
        }

        if let Some(tag) = &self.tag {
            if !record.has_tag(tag) {
                return false;
            }
        }

        if let Some(text) = &self.search {
            let needle = text.to_lowercase();
            let in_name = record.name.to_lowercase().contains(&needle);
            let in_description = record
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }

        true
    }
}

/// Secret value - automatically zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretValue {
    value: String,
}

impl SecretValue {
    /// Wrap a secret value
    pub fn new(value: String) -> Self {
        Self { value }
    }

    /// Get the secret value (use carefully)
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Masked form suitable for display
    pub fn masked(&self) -> String {
        mask_secret(&self.value)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Clone for SecretValue {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("value", &"[REDACTED]")
            .finish()
    }
}
