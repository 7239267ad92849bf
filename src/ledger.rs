//! Rollback ledger: the undo log for one installation session.
//!
//! Every component that mutates system state records how to reverse the
//! mutation *before* performing it, by pushing an [`UndoAction`] here. The
//! ledger is the single source of truth for pending undo work; no component
//! keeps separate undo state.
//!
//! On failure the orchestrator drains the ledger most-recent-first, so later
//! mutations (which may depend on earlier state) are reversed before earlier
//! ones. On success the ledger is discarded wholesale and the mutations become
//! permanent.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::boot::{self, BootEnv};
use crate::fsutil;

/// A recorded, self-contained instruction for reversing one mutation.
///
/// Payloads are owned values: by the time the ledger drains, the stack frames
/// that produced them are long gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    /// Copy a backed-up file back over the original.
    RestoreFile { backup: PathBuf, original: PathBuf },
    /// Delete an installed artifact.
    RemoveFile { path: PathBuf },
    /// Replace the configuration directory with its snapshot.
    RestoreConfig { backup: PathBuf, original: PathBuf },
    /// Strip the named kernel from the bootloader configuration and queue a
    /// bootloader metadata refresh.
    RemoveKernelEntry { kernel_name: String },
}

/// What a drain accomplished. When `boot_refresh_queued` is set, the caller
/// owes a (best-effort) bootloader metadata refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub attempted: usize,
    pub failed: usize,
    pub boot_refresh_queued: bool,
}

/// Ordered sequence of pending undo actions for one session.
///
/// Append-only during the forward pass; consumed destructively on rollback.
/// Owned by the [`crate::install::InstallationSession`], never a process-wide
/// singleton.
#[derive(Debug, Default)]
pub struct RollbackLedger {
    entries: Vec<UndoAction>,
}

impl RollbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an undo obligation. Must be called before the corresponding
    /// destructive action happens. Infallible: a failure to grow the backing
    /// vector aborts the process, which is the correct outcome for an
    /// obligation that could not be recorded.
    pub fn push(&mut self, action: UndoAction) {
        tracing::debug!(?action, "recorded undo action");
        self.entries.push(action);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Execute every pending inverse, most-recently-pushed first.
    ///
    /// Best effort: a failed inverse is logged and counted but never stops the
    /// drain. The ledger is empty afterwards, so a second call is a no-op.
    pub fn drain_and_rollback(&mut self, env: &BootEnv) -> RollbackReport {
        let mut report = RollbackReport::default();

        while let Some(action) = self.entries.pop() {
            report.attempted += 1;
            match execute_inverse(&action, env) {
                Ok(queued_refresh) => {
                    if queued_refresh {
                        report.boot_refresh_queued = true;
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(?action, "undo action failed: {err:#}");
                }
            }
        }

        info!(
            attempted = report.attempted,
            failed = report.failed,
            "rollback drain complete"
        );
        report
    }

    /// Drop all pending actions without executing them. Called once the
    /// session commits; the recorded mutations are now permanent.
    pub fn discard(&mut self) {
        info!(discarded = self.entries.len(), "ledger discarded on commit");
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[UndoAction] {
        &self.entries
    }
}

/// Apply one inverse action. Returns whether a bootloader refresh is owed.
fn execute_inverse(action: &UndoAction, env: &BootEnv) -> Result<bool> {
    match action {
        UndoAction::RestoreFile { backup, original } => {
            if let Some(parent) = original.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory '{}'", parent.display()))?;
            }
            fs::copy(backup, original).with_context(|| {
                format!(
                    "restoring '{}' from '{}'",
                    original.display(),
                    backup.display()
                )
            })?;
            Ok(false)
        }
        UndoAction::RemoveFile { path } => {
            if path.is_dir() {
                fs::remove_dir_all(path)
                    .with_context(|| format!("removing directory '{}'", path.display()))?;
            } else if path.exists() {
                fs::remove_file(path)
                    .with_context(|| format!("removing file '{}'", path.display()))?;
            }
            Ok(false)
        }
        UndoAction::RestoreConfig { backup, original } => {
            fsutil::replace_dir_with(backup, original).with_context(|| {
                format!(
                    "restoring config '{}' from snapshot '{}'",
                    original.display(),
                    backup.display()
                )
            })?;
            Ok(false)
        }
        UndoAction::RemoveKernelEntry { kernel_name } => {
            boot::remove_kernel_entry(env, kernel_name)?;
            Ok(true)
        }
    }
}
