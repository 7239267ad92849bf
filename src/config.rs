//! Configuration loading.
//!
//! A small TOML file controls where backups, boot artifacts, and logs live
//! and how long build steps may run. Every value has a default; the file only
//! needs to name what it overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

const CONFIG_FILENAME: &str = "kernelctl.toml";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root under which timestamp-named backup directories are created.
    pub backup_root: PathBuf,
    /// Directory holding kernel images (vmlinuz-*, initrd.img-*, ...).
    pub boot_dir: PathBuf,
    /// Bootloader configuration file, treated as opaque text.
    pub grub_cfg: PathBuf,
    /// Per-kernel module directories live under here.
    pub modules_dir: PathBuf,
    /// Configuration directory snapshotted before an install.
    pub config_dir: PathBuf,
    /// Default kernel source tree for source installs.
    pub default_source_dir: PathBuf,
    /// Lock and session bookkeeping.
    pub state_dir: PathBuf,
    /// Per-step deadline for build/install commands. `None` = unlimited.
    pub step_timeout: Option<Duration>,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_root: PathBuf::from("/var/lib/kernelctl/backups"),
            boot_dir: PathBuf::from("/boot"),
            grub_cfg: PathBuf::from("/boot/grub/grub.cfg"),
            modules_dir: PathBuf::from("/lib/modules"),
            config_dir: PathBuf::from("/etc/kernelctl"),
            default_source_dir: PathBuf::from("/usr/src/linux"),
            state_dir: PathBuf::from("/var/lib/kernelctl"),
            step_timeout: None,
            log_dir: PathBuf::from("/var/log/kernelctl"),
        }
    }
}

/// On-disk shape; everything optional so partial files overlay the defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    paths: Option<PathsToml>,
    install: Option<InstallToml>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PathsToml {
    backup_root: Option<PathBuf>,
    boot_dir: Option<PathBuf>,
    grub_cfg: Option<PathBuf>,
    modules_dir: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct InstallToml {
    default_source_dir: Option<PathBuf>,
    step_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the first file found among the well-known
    /// locations; defaults when none exists.
    pub fn load() -> Result<Self> {
        for path in candidate_paths() {
            if path.is_file() {
                debug!(path = %path.display(), "loading config");
                return Self::load_from(&path);
            }
        }
        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        let parsed: ConfigToml = toml::from_str(&raw)
            .with_context(|| format!("parsing config '{}'", path.display()))?;
        Ok(Self::from_toml(parsed))
    }

    fn from_toml(parsed: ConfigToml) -> Self {
        let mut config = Self::default();
        if let Some(paths) = parsed.paths {
            if let Some(v) = paths.backup_root {
                config.backup_root = v;
            }
            if let Some(v) = paths.boot_dir {
                config.boot_dir = v;
            }
            if let Some(v) = paths.grub_cfg {
                config.grub_cfg = v;
            }
            if let Some(v) = paths.modules_dir {
                config.modules_dir = v;
            }
            if let Some(v) = paths.config_dir {
                config.config_dir = v;
            }
            if let Some(v) = paths.state_dir {
                config.state_dir = v;
            }
            if let Some(v) = paths.log_dir {
                config.log_dir = v;
            }
        }
        if let Some(install) = parsed.install {
            if let Some(v) = install.default_source_dir {
                config.default_source_dir = v;
            }
            if let Some(secs) = install.step_timeout_secs {
                config.step_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
        }
        config
    }

    /// Root all paths under `root`. Test installs run against a scratch tree
    /// instead of the live system.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            backup_root: root.join("var/lib/kernelctl/backups"),
            boot_dir: root.join("boot"),
            grub_cfg: root.join("boot/grub/grub.cfg"),
            modules_dir: root.join("lib/modules"),
            config_dir: root.join("etc/kernelctl"),
            default_source_dir: root.join("usr/src/linux"),
            state_dir: root.join("var/lib/kernelctl"),
            step_timeout: None,
            log_dir: root.join("var/log/kernelctl"),
        }
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/kernelctl").join(CONFIG_FILENAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("kernelctl").join(CONFIG_FILENAME));
    }
    paths.push(PathBuf::from(CONFIG_FILENAME));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::from_toml(ConfigToml::default());
        assert_eq!(config.boot_dir, PathBuf::from("/boot"));
        assert_eq!(config.step_timeout, None);
    }

    #[test]
    fn test_partial_file_overlays_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            "[paths]\nbackup_root = \"/srv/backups\"\n\n[install]\nstep_timeout_secs = 3600\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backup_root, PathBuf::from("/srv/backups"));
        assert_eq!(config.step_timeout, Some(Duration::from_secs(3600)));
        // untouched default
        assert_eq!(config.grub_cfg, PathBuf::from("/boot/grub/grub.cfg"));
    }

    #[test]
    fn test_zero_timeout_means_unlimited() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[install]\nstep_timeout_secs = 0\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.step_timeout, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[paths]\nbckup_root = \"/typo\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_rooted_at_keeps_layout() {
        let temp = TempDir::new().unwrap();
        let config = Config::rooted_at(temp.path());
        assert!(config.grub_cfg.starts_with(temp.path()));
        assert!(config.grub_cfg.ends_with("boot/grub/grub.cfg"));
    }
}
