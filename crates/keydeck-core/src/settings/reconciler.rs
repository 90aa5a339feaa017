//! Settings reconciler
//!
//! Decides what the target file should become for a given mode and applies
//! the decision with a backup-then-atomic-replace discipline. Deciding is a
//! pure function of the two documents and the mode ([`SettingsReconciler::plan`]);
//! only [`SettingsReconciler::reconcile`] touches the disk.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use super::diff::{diff_documents, SettingsDiff};
use super::document::SettingsDocument;
use super::merge::{merge_documents, Ownership};
use crate::error::{KeydeckError, Result};
use crate::storage::{read_optional, AtomicFileWriter, FileWriter};

/// Backups beyond this many per second are refused
const MAX_BACKUP_SUFFIX: u32 = 1000;

/// What Preview simulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewTarget {
    #[default]
    Merge,
    Overwrite,
}

impl fmt::Display for PreviewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => f.write_str("merge"),
            Self::Overwrite => f.write_str("overwrite"),
        }
    }
}

impl FromStr for PreviewTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(format!("expected 'merge' or 'overwrite', got '{}'", other)),
        }
    }
}

/// Reconciliation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Keep user fields, replace owned fields
    Merge,
    /// Replace the whole file with the candidate
    Overwrite,
    /// Report the diff the given mode would produce; write nothing
    Preview(PreviewTarget),
}

impl ReconcileMode {
    pub fn is_preview(&self) -> bool {
        matches!(self, Self::Preview(_))
    }
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => f.write_str("merge"),
            Self::Overwrite => f.write_str("overwrite"),
            Self::Preview(target) => write!(f, "preview ({})", target),
        }
    }
}

/// State of the target file before reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum ExistingDocument {
    Absent,
    Parsed(SettingsDocument),
    /// The file exists but is not a JSON object
    Malformed { reason: String },
}

impl ExistingDocument {
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Outcome of [`SettingsReconciler::reconcile`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationResult {
    /// The new document is durably in place
    Applied {
        written: PathBuf,
        /// Copy of the prior file, `None` when there was no prior file
        backup: Option<PathBuf>,
    },
    /// Nothing was written
    PreviewOnly(SettingsDiff),
    /// The target already holds the result; nothing was written
    Unchanged,
}

/// Decision reached by [`SettingsReconciler::plan`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilePlan {
    Write(SettingsDocument),
    Preview(SettingsDiff),
    Unchanged,
}

/// Reconciles candidate documents against one target file
pub struct SettingsReconciler {
    target: PathBuf,
    backup_dir: Option<PathBuf>,
    writer: Box<dyn FileWriter>,
}

impl SettingsReconciler {
    /// Reconciler for `target`, backing up next to it
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            backup_dir: None,
            writer: Box::new(AtomicFileWriter),
        }
    }

    /// Put backups in `dir` instead of next to the target
    pub fn with_backup_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.backup_dir = dir;
        self
    }

    /// Replace the writer used for the final write
    pub fn with_writer(mut self, writer: Box<dyn FileWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Read and classify the current target file
    pub fn load_existing(&self) -> Result<ExistingDocument> {
        let text = read_optional(&self.target).map_err(|e| KeydeckError::io(&self.target, e))?;
        Ok(match text {
            None => ExistingDocument::Absent,
            Some(text) => match SettingsDocument::parse(&text) {
                Ok(doc) => ExistingDocument::Parsed(doc),
                Err(reason) => ExistingDocument::Malformed { reason },
            },
        })
    }

    /// Decide the outcome without touching the disk
    ///
    /// Merge over a malformed file fails with `MalformedExisting`; Overwrite
    /// and Preview treat a malformed file like an empty one.
    pub fn plan(
        &self,
        candidate: &SettingsDocument,
        existing: &ExistingDocument,
        mode: ReconcileMode,
        ownership: &Ownership,
    ) -> Result<ReconcilePlan> {
        let empty = SettingsDocument::new();
        let base = match existing {
            ExistingDocument::Parsed(doc) => doc,
            ExistingDocument::Absent => &empty,
            ExistingDocument::Malformed { reason } => {
                if mode == ReconcileMode::Merge {
                    return Err(KeydeckError::MalformedExisting {
                        path: self.target.clone(),
                        reason: reason.clone(),
                    });
                }
                &empty
            }
        };

        let result = |target: PreviewTarget| match target {
            PreviewTarget::Merge => merge_documents(base, candidate, ownership),
            PreviewTarget::Overwrite => candidate.clone(),
        };

        let next = match mode {
            ReconcileMode::Preview(target) => {
                return Ok(ReconcilePlan::Preview(diff_documents(base, &result(target))));
            }
            ReconcileMode::Merge => result(PreviewTarget::Merge),
            ReconcileMode::Overwrite => result(PreviewTarget::Overwrite),
        };

        match existing {
            ExistingDocument::Parsed(doc) if *doc == next => Ok(ReconcilePlan::Unchanged),
            _ => Ok(ReconcilePlan::Write(next)),
        }
    }

    /// Reconcile `candidate` into the target file
    ///
    /// Either the new document is fully in place (with a backup of any prior
    /// file) or the target is left exactly as it was.
    pub fn reconcile(
        &self,
        candidate: &SettingsDocument,
        mode: ReconcileMode,
        ownership: &Ownership,
    ) -> Result<ReconciliationResult> {
        let existing = self.load_existing()?;
        match self.plan(candidate, &existing, mode, ownership)? {
            ReconcilePlan::Preview(diff) => {
                debug!("Preview of {:?}: {} change(s)", self.target, diff.len());
                Ok(ReconciliationResult::PreviewOnly(diff))
            }
            ReconcilePlan::Unchanged => {
                debug!("{:?} already up to date", self.target);
                Ok(ReconciliationResult::Unchanged)
            }
            ReconcilePlan::Write(next) => {
                let contents = next.to_pretty_string()?;
                let backup = if existing.is_present() {
                    Some(self.backup()?)
                } else {
                    None
                };

                self.writer
                    .write(&self.target, contents.as_bytes())
                    .map_err(|source| KeydeckError::TargetUnwritable {
                        path: self.target.clone(),
                        source,
                    })?;

                info!("Wrote settings to {:?} ({})", self.target, mode);
                Ok(ReconciliationResult::Applied {
                    written: self.target.clone(),
                    backup,
                })
            }
        }
    }

    /// Copy the current target to a fresh timestamped backup file
    fn backup(&self) -> Result<PathBuf> {
        let dir = self.backup_location();
        let failed = |path: &Path, source: io::Error| KeydeckError::BackupFailed {
            path: path.to_path_buf(),
            source,
        };

        let contents = std::fs::read(&self.target).map_err(|e| failed(&self.target, e))?;
        std::fs::create_dir_all(&dir).map_err(|e| failed(&dir, e))?;

        let file_name = self
            .target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "settings.json".to_string());
        let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S").to_string();

        for n in 0..MAX_BACKUP_SUFFIX {
            let name = if n == 0 {
                format!("{}.{}.bak", file_name, stamp)
            } else {
                format!("{}.{}-{}.bak", file_name, stamp, n)
            };
            let path = dir.join(name);

            match create_new_private(&path) {
                Ok(mut file) => {
                    file.write_all(&contents)
                        .and_then(|_| file.sync_all())
                        .map_err(|e| failed(&path, e))?;
                    debug!("Backed up {:?} to {:?}", self.target, path);
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(failed(&path, e)),
            }
        }

        Err(failed(
            &dir,
            io::Error::new(io::ErrorKind::AlreadyExists, "no free backup file name"),
        ))
    }

    fn backup_location(&self) -> PathBuf {
        if let Some(dir) = &self.backup_dir {
            return dir.clone();
        }
        match self.target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

fn create_new_private(path: &Path) -> io::Result<std::fs::File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::diff::ChangeKind;
    use crate::settings::document::FieldPath;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    struct FailingWriter;

    impl FileWriter for FailingWriter {
        fn write(&self, _path: &Path, _contents: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "simulated crash before rename"))
        }
    }

    fn doc(value: Value) -> SettingsDocument {
        SettingsDocument::from_value(value).unwrap()
    }

    fn read_doc(path: &Path) -> SettingsDocument {
        SettingsDocument::parse(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn backups(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "bak"))
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_merge_keeps_user_fields() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        std::fs::write(&target, r#"{"foo": "bar", "model": "old"}"#).unwrap();

        let reconciler = SettingsReconciler::new(&target);
        let candidate = doc(json!({ "model": "new", "timeout": 30 }));
        let result = reconciler
            .reconcile(&candidate, ReconcileMode::Merge, &Ownership::Candidate)
            .unwrap();

        assert_eq!(read_doc(&target), doc(json!({ "foo": "bar", "model": "new", "timeout": 30 })));
        let ReconciliationResult::Applied { written, backup } = result else {
            panic!("expected Applied");
        };
        assert_eq!(written, target);
        let backup = backup.unwrap();
        assert_eq!(
            std::fs::read_to_string(&backup).unwrap(),
            r#"{"foo": "bar", "model": "old"}"#
        );
    }

    #[test]
    fn test_overwrite_without_existing_writes_candidate_and_no_backup() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");

        let candidate = doc(json!({ "env": { "A": "1" }, "b": [true] }));
        let result = SettingsReconciler::new(&target)
            .reconcile(&candidate, ReconcileMode::Overwrite, &Ownership::Candidate)
            .unwrap();

        assert_eq!(
            result,
            ReconciliationResult::Applied {
                written: target.clone(),
                backup: None,
            }
        );
        assert_eq!(read_doc(&target), candidate);
        assert!(backups(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_overwrite_discards_prior_content() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        std::fs::write(&target, r#"{"foo": "bar"}"#).unwrap();

        let candidate = doc(json!({ "model": "new" }));
        SettingsReconciler::new(&target)
            .reconcile(&candidate, ReconcileMode::Overwrite, &Ownership::Candidate)
            .unwrap();

        assert_eq!(read_doc(&target), candidate);
        assert_eq!(backups(temp_dir.path()).len(), 1);
    }

    #[test]
    fn test_failed_write_leaves_target_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        let original = "{\n  \"foo\": \"bar\",\n  \"model\": \"old\"\n}\n";
        std::fs::write(&target, original).unwrap();

        let reconciler = SettingsReconciler::new(&target).with_writer(Box::new(FailingWriter));
        let candidate = doc(json!({ "model": "new" }));

        for mode in [ReconcileMode::Merge, ReconcileMode::Overwrite] {
            let err = reconciler
                .reconcile(&candidate, mode, &Ownership::Candidate)
                .unwrap_err();
            assert!(matches!(err, KeydeckError::TargetUnwritable { .. }), "{:?}", err);
            assert_eq!(std::fs::read(&target).unwrap(), original.as_bytes());
        }

        // The disposable backups made before each failed write are kept
        assert_eq!(backups(temp_dir.path()).len(), 2);
    }

    #[test]
    fn test_backup_failure_aborts_write() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        std::fs::write(&target, r#"{"a": 1}"#).unwrap();

        // A regular file where the backup directory should be
        let blocker = temp_dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();

        let err = SettingsReconciler::new(&target)
            .with_backup_dir(Some(blocker.join("backups")))
            .reconcile(&doc(json!({ "a": 2 })), ReconcileMode::Overwrite, &Ownership::Candidate)
            .unwrap_err();

        assert!(matches!(err, KeydeckError::BackupFailed { .. }), "{:?}", err);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_backup_dir_and_unique_names() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        let backup_dir = temp_dir.path().join("backups");
        std::fs::write(&target, r#"{"n": 0}"#).unwrap();

        let reconciler = SettingsReconciler::new(&target).with_backup_dir(Some(backup_dir.clone()));
        for n in 1..=3 {
            reconciler
                .reconcile(&doc(json!({ "n": n })), ReconcileMode::Overwrite, &Ownership::Candidate)
                .unwrap();
        }

        let found = backups(&backup_dir);
        assert_eq!(found.len(), 3);
        for path in &found {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("settings.json."), "{}", name);
        }
        assert!(backups(temp_dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_backup_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        std::fs::write(&target, r#"{"a": 1}"#).unwrap();

        let result = SettingsReconciler::new(&target)
            .reconcile(&doc(json!({ "a": 2 })), ReconcileMode::Merge, &Ownership::Candidate)
            .unwrap();
        let ReconciliationResult::Applied { backup: Some(backup), .. } = result else {
            panic!("expected a backup");
        };
        let mode = std::fs::metadata(backup).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_preview_never_touches_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        std::fs::write(&target, r#"{"foo": "bar", "model": "old"}"#).unwrap();
        let before = std::fs::metadata(&target).unwrap().modified().unwrap();

        let reconciler = SettingsReconciler::new(&target);
        let candidate = doc(json!({ "model": "new", "timeout": 30 }));

        for _ in 0..3 {
            let merge = reconciler
                .reconcile(&candidate, ReconcileMode::Preview(PreviewTarget::Merge), &Ownership::Candidate)
                .unwrap();
            let ReconciliationResult::PreviewOnly(diff) = merge else {
                panic!("expected PreviewOnly");
            };
            assert_eq!(diff.of_kind(ChangeKind::Changed).count(), 1);
            assert_eq!(diff.of_kind(ChangeKind::Added).count(), 1);
            assert_eq!(diff.of_kind(ChangeKind::Removed).count(), 0);

            let overwrite = reconciler
                .reconcile(
                    &candidate,
                    ReconcileMode::Preview(PreviewTarget::Overwrite),
                    &Ownership::Candidate,
                )
                .unwrap();
            let ReconciliationResult::PreviewOnly(diff) = overwrite else {
                panic!("expected PreviewOnly");
            };
            let removed: Vec<String> = diff
                .of_kind(ChangeKind::Removed)
                .map(|c| c.path.to_string())
                .collect();
            assert_eq!(removed, vec!["foo"]);
        }

        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            r#"{"foo": "bar", "model": "old"}"#
        );
        assert_eq!(std::fs::metadata(&target).unwrap().modified().unwrap(), before);
        assert!(backups(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_preview_without_existing_is_all_additions() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");

        let result = SettingsReconciler::new(&target)
            .reconcile(
                &doc(json!({ "env": { "A": "1", "B": "2" } })),
                ReconcileMode::Preview(PreviewTarget::Merge),
                &Ownership::Candidate,
            )
            .unwrap();
        let ReconciliationResult::PreviewOnly(diff) = result else {
            panic!("expected PreviewOnly");
        };
        assert_eq!(diff.len(), 2);
        assert_eq!(diff.of_kind(ChangeKind::Added).count(), 2);
        assert!(!target.exists());
    }

    #[test]
    fn test_malformed_existing() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        std::fs::write(&target, "{ not json").unwrap();

        let reconciler = SettingsReconciler::new(&target);
        let candidate = doc(json!({ "a": 1 }));

        assert!(matches!(
            reconciler.load_existing().unwrap(),
            ExistingDocument::Malformed { .. }
        ));

        let err = reconciler
            .reconcile(&candidate, ReconcileMode::Merge, &Ownership::Candidate)
            .unwrap_err();
        assert!(matches!(err, KeydeckError::MalformedExisting { .. }));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{ not json");

        let preview = reconciler
            .reconcile(&candidate, ReconcileMode::Preview(PreviewTarget::Merge), &Ownership::Candidate)
            .unwrap();
        let ReconciliationResult::PreviewOnly(diff) = preview else {
            panic!("expected PreviewOnly");
        };
        assert_eq!(diff.of_kind(ChangeKind::Added).count(), 1);

        let applied = reconciler
            .reconcile(&candidate, ReconcileMode::Overwrite, &Ownership::Candidate)
            .unwrap();
        let ReconciliationResult::Applied { backup: Some(backup), .. } = applied else {
            panic!("expected Applied with backup");
        };
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
        assert_eq!(read_doc(&target), candidate);
    }

    #[test]
    fn test_unchanged_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        std::fs::write(&target, r#"{"model": "new", "foo": "bar"}"#).unwrap();

        let result = SettingsReconciler::new(&target)
            .reconcile(&doc(json!({ "model": "new" })), ReconcileMode::Merge, &Ownership::Candidate)
            .unwrap();

        assert_eq!(result, ReconciliationResult::Unchanged);
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            r#"{"model": "new", "foo": "bar"}"#
        );
        assert!(backups(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_plan_respects_ownership() {
        let reconciler = SettingsReconciler::new("unused.json");
        let existing = ExistingDocument::Parsed(doc(json!({ "env": { "OWNED": "old", "MINE": "x" } })));
        let candidate = doc(json!({ "env": { "OWNED": "new", "MINE": "y" } }));
        let ownership = Ownership::Paths(vec![FieldPath::parse("env.OWNED")]);

        let plan = reconciler
            .plan(&candidate, &existing, ReconcileMode::Merge, &ownership)
            .unwrap();
        assert_eq!(
            plan,
            ReconcilePlan::Write(doc(json!({ "env": { "OWNED": "new", "MINE": "x" } })))
        );
    }

    #[test]
    fn test_merge_replaces_non_object_env() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("settings.json");
        std::fs::write(&target, r#"{"env": "oops", "x": 1}"#).unwrap();

        let candidate = doc(json!({ "env": { "ANTHROPIC_AUTH_TOKEN": "tok", "ANTHROPIC_BASE_URL": "https://b" } }));
        let ownership = Ownership::Paths(vec![
            FieldPath::parse("env.ANTHROPIC_AUTH_TOKEN"),
            FieldPath::parse("env.ANTHROPIC_BASE_URL"),
        ]);
        let result = SettingsReconciler::new(&target)
            .reconcile(&candidate, ReconcileMode::Merge, &ownership)
            .unwrap();

        assert!(matches!(result, ReconciliationResult::Applied { backup: Some(_), .. }));
        assert_eq!(
            read_doc(&target),
            doc(json!({
                "env": { "ANTHROPIC_AUTH_TOKEN": "tok", "ANTHROPIC_BASE_URL": "https://b" },
                "x": 1
            }))
        );
    }

    #[test]
    fn test_preview_target_from_str() {
        assert_eq!("Merge".parse::<PreviewTarget>().unwrap(), PreviewTarget::Merge);
        assert_eq!("overwrite".parse::<PreviewTarget>().unwrap(), PreviewTarget::Overwrite);
        assert!("both".parse::<PreviewTarget>().is_err());
    }
}
