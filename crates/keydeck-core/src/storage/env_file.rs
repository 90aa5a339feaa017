//! Dotenv-style secret store
//!
//! Secrets live in a single file, one `NAME="value"` per line. The file is
//! loaded once on open and rewritten atomically on every mutation; if the
//! rewrite fails the in-memory state is rolled back so memory and disk agree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::fs::{read_optional, write_atomic};
use super::SecretStore;
use crate::credential::{validate_name, SecretValue};
use crate::error::{KeydeckError, Result};

/// Secret store backed by a dotenv-format file
pub struct EnvFileSecretStore {
    /// Path of the env file
    path: PathBuf,
    /// In-memory copy of the file
    entries: BTreeMap<String, SecretValue>,
}

impl EnvFileSecretStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match read_optional(&path).map_err(|e| KeydeckError::io(&path, e))? {
            Some(contents) => parse(&contents).map_err(|reason| KeydeckError::CorruptStore {
                path: path.clone(),
                reason,
            })?,
            None => {
                debug!("No secret store at {:?}, starting empty", path);
                BTreeMap::new()
            }
        };

        debug!("Loaded {} secrets from {:?}", entries.len(), path);
        Ok(Self { path, entries })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let contents = render(&self.entries);
        write_atomic(&self.path, contents.as_bytes()).map_err(|e| KeydeckError::io(&self.path, e))
    }
}

impl SecretStore for EnvFileSecretStore {
    fn get(&self, name: &str) -> Result<Option<SecretValue>> {
        Ok(self.entries.get(name).cloned())
    }

    fn set(&mut self, name: &str, value: &SecretValue) -> Result<()> {
        validate_name(name)?;

        let previous = self.entries.insert(name.to_string(), value.clone());
        if let Err(e) = self.persist() {
            match previous {
                Some(old) => self.entries.insert(name.to_string(), old),
                None => self.entries.remove(name),
            };
            return Err(e);
        }

        debug!("Stored secret: {}", name);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<bool> {
        let Some(previous) = self.entries.remove(name) else {
            return Ok(false);
        };

        if let Err(e) = self.persist() {
            self.entries.insert(name.to_string(), previous);
            return Err(e);
        }

        debug!("Removed secret: {}", name);
        Ok(true)
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.entries.contains_key(name))
    }

    fn names(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "Env File"
    }
}

fn render(entries: &BTreeMap<String, SecretValue>) -> String {
    let mut out = String::new();
    for (name, value) in entries {
        out.push_str(name);
        out.push_str("=\"");
        for c in value.expose().chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                c => out.push(c),
            }
        }
        out.push_str("\"\n");
    }
    out
}

fn parse(contents: &str) -> std::result::Result<BTreeMap<String, SecretValue>, String> {
    let mut entries = BTreeMap::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let (name, value) = line
            .split_once('=')
            .ok_or_else(|| format!("line {}: expected NAME=value", idx + 1))?;
        let name = name.trim();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(format!("line {}: invalid name '{}'", idx + 1, name));
        }

        let value = parse_value(value.trim()).map_err(|e| format!("line {}: {}", idx + 1, e))?;
        entries.insert(name.to_string(), SecretValue::new(value));
    }

    Ok(entries)
}

fn parse_value(raw: &str) -> std::result::Result<String, String> {
    if let Some(inner) = raw.strip_prefix('\'') {
        return inner
            .strip_suffix('\'')
            .map(str::to_string)
            .ok_or_else(|| "unterminated single quote".to_string());
    }

    let Some(inner) = raw.strip_prefix('"') else {
        return Ok(raw.to_string());
    };

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => value.push('\n'),
                Some(other) => value.push(other),
                None => return Err("dangling escape".to_string()),
            },
            '"' => {
                return if chars.as_str().trim().is_empty() {
                    Ok(value)
                } else {
                    Err("trailing characters after closing quote".to_string())
                };
            }
            c => value.push(c),
        }
    }

    Err("unterminated double quote".to_string())
}
