//! Key registry for add / list / delete / activate

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::consistency::{active_names, detect, surviving_active, Inconsistency, RepairAction};
use super::types::{validate_name, KeyFilter, KeyRecord, SecretValue};
use crate::error::{KeydeckError, Result};
use crate::provider::ProviderCatalog;
use crate::storage::{EnvFileSecretStore, JsonMetadataStore, MetadataStore, SecretStore};

/// Registry composing the secret store and the metadata store
///
/// Every record has exactly one secret and at most one record is active.
/// Writes always go secret first, metadata second; a metadata failure after
/// a secret change is either rolled back or surfaced as an
/// [`Inconsistency`] that blocks `add`/`activate` until repaired.
pub struct KeyRegistry {
    /// Secret values keyed by name
    secrets: Box<dyn SecretStore>,
    /// Record persistence
    metadata: Box<dyn MetadataStore>,
    /// Provider lookup
    catalog: ProviderCatalog,
    /// Records as last persisted
    records: BTreeMap<String, KeyRecord>,
    /// Invariant violations currently on disk
    issues: Vec<Inconsistency>,
}

impl KeyRegistry {
    /// Open a registry over the given stores and check its invariants
    pub fn open(
        secrets: Box<dyn SecretStore>,
        metadata: Box<dyn MetadataStore>,
        catalog: ProviderCatalog,
    ) -> Result<Self> {
        let records = metadata.load()?;
        let issues = detect(&records, &secrets.names()?);

        for issue in &issues {
            warn!("Key store inconsistency: {}", issue);
        }
        info!(
            "Opened key registry with {} keys ({} / {})",
            records.len(),
            secrets.backend_name(),
            metadata.backend_name()
        );

        Ok(Self {
            secrets,
            metadata,
            catalog,
            records,
            issues,
        })
    }

    /// Open the default file-backed stores
    pub fn open_files(secrets_file: &Path, metadata_file: &Path) -> Result<Self> {
        Self::open(
            Box::new(EnvFileSecretStore::open(secrets_file)?),
            Box::new(JsonMetadataStore::new(metadata_file)),
            ProviderCatalog::builtin(),
        )
    }

    /// Provider catalog used for validation
    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Invariant violations found on disk
    pub fn issues(&self) -> &[Inconsistency] {
        &self.issues
    }

    /// Whether both stores agree and at most one key is active
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    fn ensure_consistent(&self) -> Result<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(KeydeckError::StateInconsistent(self.issues.clone()))
        }
    }

    fn recheck(&mut self) -> Result<()> {
        self.issues = detect(&self.records, &self.secrets.names()?);
        for issue in &self.issues {
            warn!("Key store inconsistency: {}", issue);
        }
        Ok(())
    }

    /// Add a new key: the secret is written first, metadata only if that succeeded
    pub fn add(
        &mut self,
        name: &str,
        provider_id: &str,
        secret: SecretValue,
        description: Option<String>,
        tags: impl IntoIterator<Item = String>,
    ) -> Result<KeyRecord> {
        validate_name(name)?;
        let profile = self.catalog.resolve(provider_id)?;
        if secret.is_empty() {
            return Err(KeydeckError::InvalidSecret(name.to_string()));
        }
        if self.records.contains_key(name) || self.secrets.contains(name)? {
            return Err(KeydeckError::DuplicateKey(name.to_string()));
        }
        self.ensure_consistent()?;

        let mut record = KeyRecord::new(name, profile.provider)?;
        record.description = description.filter(|d| !d.trim().is_empty());
        record.tags = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        self.secrets.set(name, &secret)?;

        let mut next = self.records.clone();
        next.insert(name.to_string(), record.clone());
        if let Err(e) = self.metadata.save(&next) {
            // Undo the secret so no orphan is left behind
            if let Err(rollback) = self.secrets.remove(name) {
                warn!("Could not roll back secret for '{}': {}", name, rollback);
                self.issues
                    .push(Inconsistency::SecretWithoutRecord(name.to_string()));
            }
            return Err(e);
        }
        self.records = next;

        info!("Added key: {} ({})", record.name, record.provider);
        Ok(record)
    }

    /// Records matching `filter`, ordered by creation time then name
    pub fn list<'a>(&'a self, filter: &'a KeyFilter) -> impl Iterator<Item = &'a KeyRecord> + 'a {
        let mut ordered: Vec<&KeyRecord> = self.records.values().collect();
        ordered.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        ordered.into_iter().filter(move |r| filter.matches(r))
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a record by name
    pub fn get(&self, name: &str) -> Result<&KeyRecord> {
        self.records
            .get(name)
            .ok_or_else(|| KeydeckError::NotFound(name.to_string()))
    }

    /// Get the secret of a key. Callers must only display it masked.
    pub fn get_secret(&self, name: &str) -> Result<SecretValue> {
        let secret = self
            .secrets
            .get(name)?
            .ok_or_else(|| KeydeckError::NotFound(name.to_string()))?;
        debug!("Read secret: {}", name);
        Ok(secret)
    }

    /// The single active record
    pub fn get_active(&self) -> Result<&KeyRecord> {
        let active = active_names(&self.records);
        match active.as_slice() {
            [] => Err(KeydeckError::NoActiveKey),
            [name] => self.get(name),
            _ => Err(KeydeckError::StateInconsistent(vec![
                Inconsistency::MultipleActive(active),
            ])),
        }
    }

    /// Delete a key's secret and metadata
    ///
    /// A key present in only one store is still deleted, which is how a
    /// half-deleted key is cleaned up.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let has_record = self.records.contains_key(name);
        let has_secret = self.secrets.contains(name)?;
        if !has_record && !has_secret {
            return Err(KeydeckError::NotFound(name.to_string()));
        }

        if has_secret {
            self.secrets.remove(name)?;
        }

        if has_record {
            let mut next = self.records.clone();
            next.remove(name);
            if let Err(e) = self.metadata.save(&next) {
                if has_secret {
                    self.recheck()?;
                    warn!("Secret for '{}' removed but metadata remains: {}", name, e);
                    return Err(KeydeckError::PartialDeleteInconsistency {
                        name: name.to_string(),
                        reason: e.to_string(),
                    });
                }
                return Err(e);
            }
            self.records = next;
        }

        self.recheck()?;
        info!("Deleted key: {}", name);
        Ok(())
    }

    /// Make `name` the active key
    ///
    /// The previous active record is deactivated and the target activated
    /// in one metadata write. Returns `(previous, current)`.
    pub fn activate(&mut self, name: &str) -> Result<(Option<KeyRecord>, KeyRecord)> {
        self.ensure_consistent()?;
        let target = self.get(name)?.clone();

        let previous = self.records.values().find(|r| r.active).cloned();
        if target.active {
            debug!("Key '{}' already active", name);
            return Ok((Some(target.clone()), target));
        }

        let now = Utc::now();
        let mut next = self.records.clone();
        let mut previous_updated = None;
        if let Some(prev) = &previous {
            if let Some(r) = next.get_mut(&prev.name) {
                r.active = false;
                r.touch(now);
                previous_updated = Some(r.clone());
            }
        }
        let current = match next.get_mut(name) {
            Some(r) => {
                r.active = true;
                r.touch(now);
                r.clone()
            }
            None => return Err(KeydeckError::NotFound(name.to_string())),
        };

        self.metadata.save(&next)?;
        self.records = next;

        info!(
            "Activated key: {} (previous: {})",
            name,
            previous_updated
                .as_ref()
                .map(|r| r.name.as_str())
                .unwrap_or("none")
        );
        Ok((previous_updated, current))
    }

    /// Clear the active flag. Returns the record that was active, if any.
    pub fn deactivate(&mut self) -> Result<Option<KeyRecord>> {
        let Some(name) = self.records.values().find(|r| r.active).map(|r| r.name.clone()) else {
            return Ok(None);
        };

        let mut next = self.records.clone();
        let mut updated = None;
        let now = Utc::now();
        for r in next.values_mut().filter(|r| r.active) {
            r.active = false;
            r.touch(now);
            if r.name == name {
                updated = Some(r.clone());
            }
        }

        self.metadata.save(&next)?;
        self.records = next;
        self.recheck()?;

        info!("Deactivated key: {}", name);
        Ok(updated)
    }

    /// Resolve every inconsistency: orphan records are dropped, orphan
    /// secrets removed, and only the most recently updated active record
    /// stays active.
    pub fn repair(&mut self) -> Result<Vec<RepairAction>> {
        let mut actions = Vec::new();
        if self.issues.is_empty() {
            return Ok(actions);
        }

        let secret_names = self.secrets.names()?;
        let mut next = self.records.clone();

        next.retain(|name, _| {
            let keep = secret_names.contains(name);
            if !keep {
                actions.push(RepairAction::DroppedRecord(name.clone()));
            }
            keep
        });

        if let Some(survivor) = surviving_active(&next) {
            let now = Utc::now();
            for r in next.values_mut().filter(|r| r.active && r.name != survivor) {
                r.active = false;
                r.touch(now);
                actions.push(RepairAction::Deactivated(r.name.clone()));
            }
        }

        if next != self.records {
            self.metadata.save(&next)?;
            self.records = next;
        }

        for name in secret_names {
            if !self.records.contains_key(&name) {
                self.secrets.remove(&name)?;
                actions.push(RepairAction::RemovedSecret(name));
            }
        }

        self.recheck()?;
        for action in &actions {
            info!("Repair: {}", action);
        }
        Ok(actions)
    }
}
