//! Pre-install snapshots of the configuration directory.
//!
//! A backup is a timestamp-named directory under the backup root:
//!
//! ```text
//! <backup_root>/20240101_120000/
//!     manifest.json     # when, what, how much, content digest
//!     data/             # verbatim copy of the configuration directory
//! ```
//!
//! The undo descriptor is pushed only after the copy fully succeeded. A
//! failed backup leaves no undo obligation behind: no work happened, so there
//! is nothing to reverse. Backups are never pruned here; retention is an
//! external concern.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use time::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::fsutil;
use crate::ledger::{RollbackLedger, UndoAction};

const MANIFEST_FILENAME: &str = "manifest.json";
const DATA_DIRNAME: &str = "data";

/// Metadata stored alongside every backup.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupManifest {
    pub created_at_utc: String,
    pub source_dir: PathBuf,
    pub entries: u64,
    pub digest_sha256: String,
}

/// Creates snapshots under a fixed backup root.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_root: PathBuf,
}

impl BackupManager {
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
        }
    }

    /// Snapshot `source_dir` and register the restore obligation.
    ///
    /// Returns the backup directory (the one containing `manifest.json`).
    /// On any failure nothing is pushed to the ledger.
    pub fn backup_config(
        &self,
        source_dir: &Path,
        ledger: &mut RollbackLedger,
    ) -> Result<PathBuf> {
        if !source_dir.is_dir() {
            bail!(
                "configuration directory '{}' does not exist",
                source_dir.display()
            );
        }

        let backup_dir = self.create_backup_dir()?;
        let data_dir = backup_dir.join(DATA_DIRNAME);

        let entries = fsutil::copy_dir_recursive(source_dir, &data_dir).with_context(|| {
            format!(
                "snapshotting '{}' into '{}'",
                source_dir.display(),
                data_dir.display()
            )
        })?;

        let manifest = BackupManifest {
            created_at_utc: utc_timestamp_rfc3339()?,
            source_dir: source_dir.to_path_buf(),
            entries,
            digest_sha256: fsutil::dir_digest(&data_dir)?,
        };
        let manifest_path = backup_dir.join(MANIFEST_FILENAME);
        let bytes = serde_json::to_vec_pretty(&manifest).context("serializing backup manifest")?;
        fs::write(&manifest_path, bytes)
            .with_context(|| format!("writing manifest '{}'", manifest_path.display()))?;

        // The copy is durable; only now does a restore obligation exist.
        ledger.push(UndoAction::RestoreConfig {
            backup: data_dir,
            original: source_dir.to_path_buf(),
        });

        info!(
            backup = %backup_dir.display(),
            entries,
            "configuration snapshot created"
        );
        Ok(backup_dir)
    }

    /// Create a uniquely named `<root>/<YYYYMMDD_HHMMSS>` directory. A suffix
    /// disambiguates two sessions started within the same second.
    fn create_backup_dir(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.backup_root).with_context(|| {
            format!("creating backup root '{}'", self.backup_root.display())
        })?;

        let stamp = backup_timestamp()?;
        for attempt in 0..100 {
            let name = if attempt == 0 {
                stamp.clone()
            } else {
                format!("{stamp}-{attempt}")
            };
            let candidate = self.backup_root.join(&name);
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("creating backup directory '{}'", candidate.display())
                    });
                }
            }
        }
        bail!(
            "could not find a free backup directory name under '{}'",
            self.backup_root.display()
        )
    }
}

/// Load the manifest of an existing backup directory.
pub fn read_manifest(backup_dir: &Path) -> Result<BackupManifest> {
    let path = backup_dir.join(MANIFEST_FILENAME);
    let bytes =
        fs::read(&path).with_context(|| format!("reading manifest '{}'", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing manifest '{}'", path.display()))
}

fn backup_timestamp() -> Result<String> {
    let format = format_description::parse("[year][month][day]_[hour][minute][second]")
        .context("building backup timestamp format")?;
    OffsetDateTime::now_utc()
        .format(&format)
        .context("formatting backup timestamp")
}

fn utc_timestamp_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&format_description::well_known::Rfc3339)
        .context("formatting RFC 3339 timestamp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_backup_copies_and_registers_undo() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("etc/kernelctl");
        write(&source, "kernel.conf", "default=6.1.0");
        write(&source, "profiles/dev.conf", "debug=1");

        let manager = BackupManager::new(temp.path().join("backups"));
        let mut ledger = RollbackLedger::new();
        let backup_dir = manager.backup_config(&source, &mut ledger).unwrap();

        assert_eq!(
            fs::read_to_string(backup_dir.join("data/kernel.conf")).unwrap(),
            "default=6.1.0"
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(
            ledger.entries()[0],
            UndoAction::RestoreConfig {
                backup: backup_dir.join("data"),
                original: source,
            }
        );
    }

    #[test]
    fn test_manifest_records_digest() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("cfg");
        write(&source, "a.conf", "alpha");

        let manager = BackupManager::new(temp.path().join("backups"));
        let mut ledger = RollbackLedger::new();
        let backup_dir = manager.backup_config(&source, &mut ledger).unwrap();

        let manifest = read_manifest(&backup_dir).unwrap();
        assert_eq!(manifest.source_dir, source);
        assert_eq!(manifest.entries, 1);
        assert_eq!(
            manifest.digest_sha256,
            fsutil::dir_digest(&backup_dir.join("data")).unwrap()
        );
    }

    #[test]
    fn test_failed_backup_pushes_nothing() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new(temp.path().join("backups"));
        let mut ledger = RollbackLedger::new();

        let missing = temp.path().join("does-not-exist");
        assert!(manager.backup_config(&missing, &mut ledger).is_err());
        assert!(ledger.is_empty());
        // nothing half-created either
        assert!(!temp.path().join("backups").exists());
    }

    #[test]
    fn test_two_backups_same_second_get_distinct_dirs() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("cfg");
        write(&source, "a.conf", "alpha");

        let manager = BackupManager::new(temp.path().join("backups"));
        let mut ledger = RollbackLedger::new();
        let first = manager.backup_config(&source, &mut ledger).unwrap();
        let second = manager.backup_config(&source, &mut ledger).unwrap();
        assert_ne!(first, second);
        assert_eq!(ledger.len(), 2);
    }
}
