//! Structural diff between two documents

use serde_json::{Map, Value};

use super::document::{FieldPath, SettingsDocument};
use crate::credential::mask_secret;

/// Kind of change at one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// One field-level difference
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub path: FieldPath,
    /// Value before, absent for additions
    pub old: Option<Value>,
    /// Value after, absent for removals
    pub new: Option<Value>,
}

impl FieldChange {
    pub fn kind(&self) -> ChangeKind {
        match (&self.old, &self.new) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Removed,
            _ => ChangeKind::Changed,
        }
    }
}

/// Field-by-field difference between two documents, ordered by path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDiff {
    pub changes: Vec<FieldChange>,
}

impl SettingsDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Changes of one kind
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter().filter(move |c| c.kind() == kind)
    }

    /// Copy of the diff with string values under `secret_paths` masked
    pub fn masked(&self, secret_paths: &[FieldPath]) -> SettingsDiff {
        let mask = |value: &Option<Value>| match value {
            Some(Value::String(s)) => Some(Value::String(mask_secret(s))),
            other => other.clone(),
        };

        SettingsDiff {
            changes: self
                .changes
                .iter()
                .map(|c| {
                    if secret_paths.iter().any(|p| c.path.starts_with(p)) {
                        FieldChange {
                            path: c.path.clone(),
                            old: mask(&c.old),
                            new: mask(&c.new),
                        }
                    } else {
                        c.clone()
                    }
                })
                .collect(),
        }
    }
}

/// Compute the structural diff turning `old` into `new`
///
/// Objects are compared key by key; added or removed objects are expanded
/// to their leaves so every reported change names a concrete field.
pub fn diff_documents(old: &SettingsDocument, new: &SettingsDocument) -> SettingsDiff {
    let mut changes = Vec::new();
    diff_maps(old.as_map(), new.as_map(), &FieldPath::default(), &mut changes);
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    SettingsDiff { changes }
}

fn diff_maps(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    prefix: &FieldPath,
    out: &mut Vec<FieldChange>,
) {
    for (key, old_value) in old {
        let path = prefix.child(key);
        match new.get(key) {
            None => one_sided(old_value, &path, false, out),
            Some(new_value) => match (old_value, new_value) {
                (Value::Object(a), Value::Object(b)) => diff_maps(a, b, &path, out),
                (a, b) if a != b => out.push(FieldChange {
                    path,
                    old: Some(a.clone()),
                    new: Some(b.clone()),
                }),
                _ => {}
            },
        }
    }

    for (key, new_value) in new {
        if !old.contains_key(key) {
            one_sided(new_value, &prefix.child(key), true, out);
        }
    }
}

fn one_sided(value: &Value, path: &FieldPath, added: bool, out: &mut Vec<FieldChange>) {
    if let Value::Object(map) = value {
        if !map.is_empty() {
            for (key, inner) in map {
                one_sided(inner, &path.child(key), added, out);
            }
            return;
        }
    }

    let (old, new) = if added {
        (None, Some(value.clone()))
    } else {
        (Some(value.clone()), None)
    };
    out.push(FieldChange {
        path: path.clone(),
        old,
        new,
    });
}
