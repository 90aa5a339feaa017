//! Settings document model

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Location of a field inside a document, one segment per object level
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from its segments
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path such as `env.API_TIMEOUT_MS`
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').filter(|s| !s.is_empty()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` equals `prefix` or lies underneath it
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub(crate) fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A JSON configuration document whose root is an object
///
/// Equality is structural: two documents are equal when they hold the same
/// fields with the same values, regardless of key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDocument(Map<String, Value>);

impl SettingsDocument {
    /// An empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse document text. The error string describes why it is not a document.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(value),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Wrap a JSON value; only objects are documents
    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(format!("expected a JSON object, found {}", json_type(&other))),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a field by path
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.0.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Set a field, creating intermediate objects and replacing any
    /// non-object value in the way
    pub fn set(&mut self, path: &FieldPath, value: Value) {
        let Some((last, parents)) = path.segments().split_last() else {
            return;
        };

        let mut current = &mut self.0;
        for segment in parents {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(map) = slot else {
                return;
            };
            current = map;
        }
        current.insert(last.clone(), value);
    }

    /// Paths of every non-object value (and of empty objects)
    pub fn leaf_paths(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        collect_leaves(&self.0, &FieldPath::default(), &mut out);
        out
    }

    /// Pretty JSON with a trailing newline, as written to disk
    pub fn to_pretty_string(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(&self.0)?;
        text.push('\n');
        Ok(text)
    }
}

fn collect_leaves(map: &Map<String, Value>, prefix: &FieldPath, out: &mut Vec<FieldPath>) {
    for (key, value) in map {
        let path = prefix.child(key);
        match value {
            Value::Object(inner) if !inner.is_empty() => collect_leaves(inner, &path, out),
            _ => out.push(path),
        }
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> SettingsDocument {
        SettingsDocument::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_requires_object() {
        assert!(SettingsDocument::parse("{\"a\": 1}").is_ok());
        assert!(SettingsDocument::parse("[1, 2]").unwrap_err().contains("an array"));
        assert!(SettingsDocument::parse("{ broken").is_err());
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a = SettingsDocument::parse(r#"{"x": 1, "y": {"p": true, "q": null}}"#).unwrap();
        let b = SettingsDocument::parse(r#"{"y": {"q": null, "p": true}, "x": 1}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_get_and_set_paths() {
        let mut d = doc(json!({ "env": { "A": "1" }, "flag": true }));
        assert_eq!(d.get(&FieldPath::parse("env.A")), Some(&json!("1")));
        assert_eq!(d.get(&FieldPath::parse("env.B")), None);
        assert_eq!(d.get(&FieldPath::parse("flag.inner")), None);

        d.set(&FieldPath::parse("env.B"), json!("2"));
        d.set(&FieldPath::parse("flag.inner"), json!(3));
        assert_eq!(d, doc(json!({ "env": { "A": "1", "B": "2" }, "flag": { "inner": 3 } })));
    }

    #[test]
    fn test_leaf_paths() {
        let d = doc(json!({ "env": { "A": "1", "B": {} }, "x": [1] }));
        let paths: Vec<String> = d.leaf_paths().iter().map(ToString::to_string).collect();
        assert_eq!(paths, vec!["env.A", "env.B", "x"]);
    }

    #[test]
    fn test_pretty_string_preserves_order() {
        let d = SettingsDocument::parse(r#"{"zeta": 1, "alpha": 2}"#).unwrap();
        let text = d.to_pretty_string().unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
        assert!(text.ends_with("}\n"));
    }
}
