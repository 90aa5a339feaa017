//! Ownership-aware deep merge

use serde_json::{Map, Value};

use super::document::{FieldPath, SettingsDocument};

/// Which fields of a candidate may replace existing values during Merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// The candidate owns every field it contains
    Candidate,
    /// Only these paths (and everything beneath them) are owned
    Paths(Vec<FieldPath>),
}

impl Ownership {
    /// Whether a field at `path` is owned by the candidate
    pub fn owns(&self, path: &FieldPath) -> bool {
        match self {
            Self::Candidate => true,
            Self::Paths(owned) => owned.iter().any(|p| path.starts_with(p)),
        }
    }

    /// Whether any owned path lies strictly beneath `path`
    pub fn owns_below(&self, path: &FieldPath) -> bool {
        match self {
            Self::Candidate => true,
            Self::Paths(owned) => owned
                .iter()
                .any(|p| p.segments().len() > path.segments().len() && p.starts_with(path)),
        }
    }
}

/// Deep union of `existing` and `candidate`
///
/// Fields only in one side are kept. Where both sides hold an object the
/// merge recurses; otherwise the candidate value wins only for owned paths
/// and the existing value is kept verbatim for everything else. A
/// non-object standing where an owned field needs a parent object is
/// replaced by the candidate's value. Applying
/// the same candidate twice gives the same result as applying it once.
pub fn merge_documents(
    existing: &SettingsDocument,
    candidate: &SettingsDocument,
    ownership: &Ownership,
) -> SettingsDocument {
    SettingsDocument::from_map(merge_maps(
        existing.as_map(),
        candidate.as_map(),
        &FieldPath::default(),
        ownership,
    ))
}

fn merge_maps(
    existing: &Map<String, Value>,
    candidate: &Map<String, Value>,
    prefix: &FieldPath,
    ownership: &Ownership,
) -> Map<String, Value> {
    let mut out = existing.clone();

    for (key, new_value) in candidate {
        let path = prefix.child(key);
        match out.get_mut(key) {
            None => {
                out.insert(key.clone(), new_value.clone());
            }
            Some(Value::Object(old_map)) if new_value.is_object() => {
                if let Value::Object(new_map) = new_value {
                    *old_map = merge_maps(old_map, new_map, &path, ownership);
                }
            }
            Some(old_value) => {
                if ownership.owns(&path) || (new_value.is_object() && ownership.owns_below(&path)) {
                    *old_value = new_value.clone();
                }
            }
        }
    }

    out
}
