//! Installed-kernel inventory and removal.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::boot::{self, BootEnv};

const IMAGE_PREFIX: &str = "vmlinuz-";

/// One kernel image found in the boot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelImage {
    /// Release name, e.g. "6.1.0-custom" (the part after `vmlinuz-`).
    pub name: String,
    pub image_path: PathBuf,
    pub is_running: bool,
}

/// Scan the boot directory for installed kernel images, sorted by name.
pub fn scan_installed(env: &BootEnv) -> Result<Vec<KernelImage>> {
    let running = current_kernel_release().unwrap_or_default();

    let mut kernels = Vec::new();
    let entries = fs::read_dir(&env.boot_dir)
        .with_context(|| format!("reading boot directory '{}'", env.boot_dir.display()))?;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("iterating boot directory '{}'", env.boot_dir.display()))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(release) = name.strip_prefix(IMAGE_PREFIX) {
            kernels.push(KernelImage {
                name: release.to_string(),
                image_path: entry.path(),
                is_running: release == running,
            });
        }
    }

    kernels.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(kernels)
}

/// Release string of the currently running kernel, from `/proc/version`.
pub fn current_kernel_release() -> Option<String> {
    let contents = fs::read_to_string("/proc/version").ok()?;
    parse_proc_version(&contents)
}

/// Extract the release from a `/proc/version` line
/// ("Linux version 6.1.0-x (...) ..." -> "6.1.0-x").
pub fn parse_proc_version(contents: &str) -> Option<String> {
    let rest = contents.strip_prefix("Linux version ")?;
    let release = rest.split_whitespace().next()?;
    (!release.is_empty()).then(|| release.to_string())
}

/// Remove a named kernel: its boot artifacts, its modules directory, and its
/// bootloader entry. With `refresh` set, bootloader metadata is regenerated
/// afterwards (best effort).
///
/// Removal is deliberate (the operator asked for it), so individual missing
/// files are skipped silently and other failures only warn: the goal is to
/// take out as much of the kernel as possible.
pub fn remove_kernel(env: &BootEnv, kernel_name: &str, refresh: bool) -> Result<()> {
    if !boot::is_valid_kernel_name(kernel_name) {
        anyhow::bail!("'{kernel_name}' is not a valid kernel name");
    }
    info!(kernel_name, "removing kernel");

    for path in boot::kernel_artifact_paths(env, kernel_name) {
        if !path.exists() {
            continue;
        }
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), "could not remove artifact: {err}");
        }
    }

    let modules = boot::kernel_modules_path(env, kernel_name);
    if modules.is_dir() {
        if let Err(err) = fs::remove_dir_all(&modules) {
            warn!(path = %modules.display(), "could not remove modules: {err}");
        }
    }

    boot::remove_kernel_entry(env, kernel_name)
        .with_context(|| format!("removing bootloader entry for '{kernel_name}'"))?;

    if refresh {
        match boot::refresh_step() {
            Some(step) => {
                let result = crate::process::StepRunner::default().run_step(&step);
                if !result.is_success() {
                    warn!(%result, "bootloader refresh after removal failed");
                }
            }
            None => warn!("no bootloader refresh tool found, skipping refresh"),
        }
    }

    info!(kernel_name, "kernel removed");
    Ok(())
}

/// List kernel packages the host package manager knows about.
///
/// Output goes straight to the operator's terminal; this is a convenience
/// view, not part of the install pipeline.
pub fn list_available() -> Result<()> {
    use std::process::Command;

    let candidates: &[(&str, &[&str])] = &[
        ("apt", &["list", "--all-versions", "linux-image-*"]),
        ("dnf", &["list", "--available", "kernel*"]),
        ("pacman", &["-Ss", "^linux$"]),
    ];

    for (manager, args) in candidates {
        if which::which(manager).is_err() {
            continue;
        }
        info!(manager, "listing available kernels");
        let status = Command::new(manager)
            .args(*args)
            .status()
            .with_context(|| format!("running '{manager}'"))?;
        if !status.success() {
            warn!(manager, "package manager query exited with {status}");
        }
        return Ok(());
    }

    anyhow::bail!("no supported package manager found (apt, dnf, or pacman)")
}
