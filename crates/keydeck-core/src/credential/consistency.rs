//! Cross-store consistency checks

use std::collections::BTreeMap;
use std::fmt;

use super::types::KeyRecord;

/// A violation of the registry invariants found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// Metadata exists for a name that has no secret
    RecordWithoutSecret(String),
    /// A secret exists for a name that has no metadata
    SecretWithoutRecord(String),
    /// More than one record is flagged active
    MultipleActive(Vec<String>),
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordWithoutSecret(name) => write!(f, "'{}' has metadata but no secret", name),
            Self::SecretWithoutRecord(name) => write!(f, "'{}' has a secret but no metadata", name),
            Self::MultipleActive(names) => write!(f, "multiple active keys: {}", names.join(", ")),
        }
    }
}

/// One change made by [`KeyRegistry::repair`](super::KeyRegistry::repair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAction {
    /// A record without a secret was removed from metadata
    DroppedRecord(String),
    /// A secret without a record was removed from the secret store
    RemovedSecret(String),
    /// An extra active record was deactivated
    Deactivated(String),
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DroppedRecord(name) => write!(f, "dropped metadata for '{}'", name),
            Self::RemovedSecret(name) => write!(f, "removed orphaned secret '{}'", name),
            Self::Deactivated(name) => write!(f, "deactivated '{}'", name),
        }
    }
}

/// Compare the record set against the secret names
pub(crate) fn detect(
    records: &BTreeMap<String, KeyRecord>,
    secret_names: &[String],
) -> Vec<Inconsistency> {
    let mut issues = Vec::new();

    for name in records.keys() {
        if !secret_names.contains(name) {
            issues.push(Inconsistency::RecordWithoutSecret(name.clone()));
        }
    }

    for name in secret_names {
        if !records.contains_key(name) {
            issues.push(Inconsistency::SecretWithoutRecord(name.clone()));
        }
    }

    let active = active_names(records);
    if active.len() > 1 {
        issues.push(Inconsistency::MultipleActive(active));
    }

    issues
}

/// Names of all active records, sorted
pub(crate) fn active_names(records: &BTreeMap<String, KeyRecord>) -> Vec<String> {
    records
        .values()
        .filter(|r| r.active)
        .map(|r| r.name.clone())
        .collect()
}

/// Pick the active record that survives a repair: latest `updated_at`,
/// ties broken by the greatest name
pub(crate) fn surviving_active(records: &BTreeMap<String, KeyRecord>) -> Option<String> {
    records
        .values()
        .filter(|r| r.active)
        .max_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.name.cmp(&b.name))
        })
        .map(|r| r.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;

    fn record(name: &str, active: bool) -> KeyRecord {
        let mut r = KeyRecord::new(name, Provider::Anthropic).unwrap();
        r.active = active;
        r
    }

    fn records(list: Vec<KeyRecord>) -> BTreeMap<String, KeyRecord> {
        list.into_iter().map(|r| (r.name.clone(), r)).collect()
    }

    #[test]
    fn test_consistent_state() {
        let recs = records(vec![record("A", true), record("B", false)]);
        let secrets = vec!["A".to_string(), "B".to_string()];
        assert!(detect(&recs, &secrets).is_empty());
    }

    #[test]
    fn test_detects_orphans_and_multiple_active() {
        let recs = records(vec![record("A", true), record("B", true)]);
        let secrets = vec!["A".to_string(), "C".to_string()];

        let issues = detect(&recs, &secrets);
        assert_eq!(
            issues,
            vec![
                Inconsistency::RecordWithoutSecret("B".into()),
                Inconsistency::SecretWithoutRecord("C".into()),
                Inconsistency::MultipleActive(vec!["A".into(), "B".into()]),
            ]
        );
    }

    #[test]
    fn test_surviving_active_prefers_latest_then_name() {
        let mut a = record("A", true);
        let mut b = record("B", true);
        let t = a.updated_at;
        a.updated_at = t + chrono::Duration::seconds(5);
        b.updated_at = t;
        assert_eq!(surviving_active(&records(vec![a.clone(), b.clone()])), Some("A".into()));

        b.updated_at = a.updated_at;
        assert_eq!(surviving_active(&records(vec![a, b])), Some("B".into()));
    }
}
