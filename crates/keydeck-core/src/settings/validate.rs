//! Sanity checks on an exported settings document

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use super::document::{json_type, FieldPath, SettingsDocument};
use super::synthesizer::{AUTH_TOKEN_VAR, BASE_URL_VAR, ENV_SECTION, OWNED_ENV_VARS, TIMEOUT_VAR, TRAFFIC_VAR};
use crate::error::{KeydeckError, Result};
use crate::storage::read_optional;

const MIN_TOKEN_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One problem found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: FieldPath,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    fn error(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Check the `env` section of a settings document
///
/// Missing fields are not reported; a document keydeck never exported to is
/// still valid. Issues come back ordered by path.
pub fn validate_document(doc: &SettingsDocument) -> Vec<ValidationIssue> {
    let env_path = FieldPath::new([ENV_SECTION]);
    let Some(env) = doc.get(&env_path) else {
        return Vec::new();
    };
    let Value::Object(env) = env else {
        return vec![ValidationIssue::error(
            env_path,
            format!("must be an object, found {}", json_type(env)),
        )];
    };

    let mut issues = Vec::new();
    for (name, value) in env {
        let path = FieldPath::new([ENV_SECTION, name.as_str()]);
        let Value::String(text) = value else {
            issues.push(ValidationIssue::error(
                path,
                format!("must be a string, found {}", json_type(value)),
            ));
            continue;
        };

        match name.as_str() {
            BASE_URL_VAR => {
                if let Some(problem) = check_base_url(text) {
                    issues.push(ValidationIssue::error(path, problem));
                }
            }
            AUTH_TOKEN_VAR if text.trim().is_empty() => {
                issues.push(ValidationIssue::error(path, "must not be empty"));
            }
            AUTH_TOKEN_VAR if text.len() < MIN_TOKEN_LEN => {
                issues.push(ValidationIssue::warning(
                    path,
                    format!("seems too short (expected at least {} characters)", MIN_TOKEN_LEN),
                ));
            }
            TIMEOUT_VAR => match text.parse::<u64>() {
                Ok(ms) if ms > 0 => {}
                _ => issues.push(ValidationIssue::error(
                    path,
                    format!("must be a positive integer number of milliseconds, got '{}'", text),
                )),
            },
            TRAFFIC_VAR if text != "0" && text != "1" => {
                issues.push(ValidationIssue::warning(path, format!("expected \"0\" or \"1\", got '{}'", text)));
            }
            known if OWNED_ENV_VARS.contains(&known) => {}
            _ => issues.push(ValidationIssue::warning(path, "not managed by keydeck")),
        }
    }

    issues.sort_by(|a, b| a.path.cmp(&b.path));
    issues
}

fn check_base_url(text: &str) -> Option<String> {
    match Url::parse(text) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => None,
        Ok(url) => Some(format!("must be an http(s) URL, got scheme '{}'", url.scheme())),
        Err(e) => Some(format!("not an absolute URL: {}", e)),
    }
}

/// What `inspect_target` found at the settings path
#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    pub path: PathBuf,
    pub exists: bool,
    /// Parse failure, if the file exists but is not a document
    pub parse_error: Option<String>,
    pub issues: Vec<ValidationIssue>,
}

impl TargetReport {
    /// True when the file parses and has no error-level issues
    pub fn is_healthy(&self) -> bool {
        self.parse_error.is_none() && !self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// Read the settings target and validate it
pub fn inspect_target(path: &Path) -> Result<TargetReport> {
    let mut report = TargetReport {
        path: path.to_path_buf(),
        exists: false,
        parse_error: None,
        issues: Vec::new(),
    };

    let Some(text) = read_optional(path).map_err(|e| KeydeckError::io(path, e))? else {
        return Ok(report);
    };
    report.exists = true;

    match SettingsDocument::parse(&text) {
        Ok(doc) => report.issues = validate_document(&doc),
        Err(reason) => report.parse_error = Some(reason),
    }
    Ok(report)
}
