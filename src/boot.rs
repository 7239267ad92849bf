//! Bootloader integration.
//!
//! The bootloader configuration is treated as opaque text plus one structural
//! assumption: GRUB-style `menuentry ... { ... }` blocks. Adding entries is
//! delegated to the distribution's own refresh tool (`update-grub` or
//! `grub-mkconfig`); removing an entry on rollback strips the matching block
//! textually so it works even when the refresh tool is unavailable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::process::StepSpec;

/// Paths the bootloader integration operates on.
///
/// Carried explicitly (never read from globals) so tests can point it at a
/// temporary directory.
#[derive(Debug, Clone)]
pub struct BootEnv {
    pub boot_dir: PathBuf,
    pub grub_cfg: PathBuf,
    pub modules_dir: PathBuf,
}

impl BootEnv {
    pub fn from_config(config: &Config) -> Self {
        Self {
            boot_dir: config.boot_dir.clone(),
            grub_cfg: config.grub_cfg.clone(),
            modules_dir: config.modules_dir.clone(),
        }
    }
}

/// A kernel name must be a single path component: joining it under a
/// directory may never escape that directory.
pub fn is_valid_kernel_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains("..")
}

/// True when a config line refers to `kernel_name` itself, not to a release
/// that merely starts with it ("6.1.0" must not match "6.1.0-test"). Tokens
/// match exactly or as the `-<name>` suffix of an artifact path like
/// `/boot/vmlinuz-<name>`.
fn line_mentions_kernel(line: &str, kernel_name: &str) -> bool {
    let suffix = format!("-{kernel_name}");
    line.split_whitespace().any(|token| {
        let token = token.trim_matches(|c: char| matches!(c, '\'' | '"' | '{' | '}'));
        token == kernel_name || token.ends_with(&suffix)
    })
}

/// Strip every `menuentry` block that mentions `kernel_name` from GRUB
/// configuration text. Pure function; the input is returned unchanged when no
/// block matches.
pub fn strip_kernel_entry(content: &str, kernel_name: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.trim_start().starts_with("menuentry") {
            // Capture the whole block, counting braces across lines.
            let start = i;
            let mut depth = 0i32;
            loop {
                depth += lines[i].matches('{').count() as i32;
                depth -= lines[i].matches('}').count() as i32;
                i += 1;
                if depth <= 0 || i >= lines.len() {
                    break;
                }
            }
            let block = &lines[start..i];
            if block.iter().any(|l| line_mentions_kernel(l, kernel_name)) {
                continue; // drop the block
            }
            out.extend_from_slice(block);
        } else {
            out.push(line);
            i += 1;
        }
    }

    let mut result = out.join("\n");
    if content.ends_with('\n') && !result.is_empty() {
        result.push('\n');
    }
    result
}

/// Remove the named kernel's entry from the bootloader configuration file.
///
/// A missing configuration file is not an error: there is nothing to strip.
pub fn remove_kernel_entry(env: &BootEnv, kernel_name: &str) -> Result<()> {
    if !env.grub_cfg.exists() {
        info!(
            grub_cfg = %env.grub_cfg.display(),
            "bootloader config missing, nothing to strip"
        );
        return Ok(());
    }

    let content = fs::read_to_string(&env.grub_cfg)
        .with_context(|| format!("reading bootloader config '{}'", env.grub_cfg.display()))?;
    let stripped = strip_kernel_entry(&content, kernel_name);
    if stripped == content {
        info!(kernel_name, "no bootloader entry matched");
        return Ok(());
    }

    fs::write(&env.grub_cfg, stripped)
        .with_context(|| format!("writing bootloader config '{}'", env.grub_cfg.display()))?;
    info!(kernel_name, "removed bootloader entry");
    Ok(())
}

/// Locate the host's GRUB refresh tool in PATH.
fn find_refresh_tool() -> Option<(PathBuf, Vec<String>)> {
    if let Ok(path) = which::which("update-grub") {
        return Some((path, Vec::new()));
    }
    if let Ok(path) = which::which("grub-mkconfig") {
        return Some((path, vec!["-o".to_string(), "/boot/grub/grub.cfg".to_string()]));
    }
    if let Ok(path) = which::which("grub2-mkconfig") {
        return Some((
            path,
            vec!["-o".to_string(), "/boot/grub2/grub.cfg".to_string()],
        ));
    }
    None
}

/// Declarative bootloader-refresh step, or `None` when the host has no
/// refresh tool in PATH.
pub fn refresh_step() -> Option<StepSpec> {
    let (tool, args) = find_refresh_tool()?;
    Some(StepSpec::new("refresh bootloader", &tool.to_string_lossy(), "/").args(args))
}

/// Paths of the on-disk artifacts belonging to one named kernel.
pub fn kernel_artifact_paths(env: &BootEnv, kernel_name: &str) -> Vec<PathBuf> {
    vec![
        env.boot_dir.join(format!("vmlinuz-{kernel_name}")),
        env.boot_dir.join(format!("initrd.img-{kernel_name}")),
        env.boot_dir.join(format!("System.map-{kernel_name}")),
        env.boot_dir.join(format!("config-{kernel_name}")),
    ]
}

/// The modules directory belonging to one named kernel.
pub fn kernel_modules_path(env: &BootEnv, kernel_name: &str) -> PathBuf {
    env.modules_dir.join(kernel_name)
}

#[cfg(test)]
pub(crate) fn test_env(root: &Path) -> BootEnv {
    BootEnv {
        boot_dir: root.join("boot"),
        grub_cfg: root.join("boot/grub/grub.cfg"),
        modules_dir: root.join("lib/modules"),
    }
}
