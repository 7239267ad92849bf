//! Preflight dependency resolution.
//!
//! Probes the host for the external tools a kernel build needs before
//! anything destructive happens. This prevents cryptic mid-build errors.
//!
//! The probe is a read-only check: spawning `which <tool>` and testing the
//! exit status. A probe that cannot even run counts as "missing", never as a
//! fatal error — preflight must not be able to fail harder than the thing it
//! guards.

use std::process::Command;

use tracing::debug;

/// Required host tools for building a kernel from source.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("gcc", "gcc"),
    ("make", "make"),
    ("bc", "bc"),
    ("flex", "flex"),
    ("bison", "bison"),
    ("rsync", "rsync"),
    ("cpio", "cpio"),
    ("xz", "xz-utils"),
];

/// Optional tools. Probed and reported but never block an install.
pub const OPTIONAL_TOOLS: &[(&str, &str)] = &[("ccache", "ccache"), ("pahole", "dwarves")];

/// Outcome of a dependency probe. Plain owned value, created fresh per check.
#[derive(Debug, Clone, Default)]
pub struct DependencyStatus {
    pub required_total: usize,
    pub required_present: usize,
    pub optional_total: usize,
    pub optional_present: usize,
    /// Missing required tool names, in probe order.
    pub missing_required: Vec<String>,
    /// Missing optional tool names, in probe order.
    pub missing_optional: Vec<String>,
}

impl DependencyStatus {
    /// True when every required tool is present.
    pub fn satisfied(&self) -> bool {
        self.missing_required.is_empty()
    }
}

/// Check if a command exists on the host system.
///
/// Uses `which` to locate the command in PATH.
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Best-effort version probe: first line of `<tool> --version`.
pub fn tool_version(tool: &str) -> Option<String> {
    let output = Command::new(tool).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(|line| line.trim().to_string())
}

/// Probe all required and optional tools.
///
/// Read-only; no side effects beyond spawning probe processes.
pub fn check() -> DependencyStatus {
    check_tools(REQUIRED_TOOLS, OPTIONAL_TOOLS)
}

/// Probe explicit tool lists. Split out so tests can inject their own lists.
pub fn check_tools(
    required: &[(&str, &str)],
    optional: &[(&str, &str)],
) -> DependencyStatus {
    let mut status = DependencyStatus::default();

    for (tool, _package) in required {
        status.required_total += 1;
        if command_exists(tool) {
            status.required_present += 1;
            debug!(tool, version = tool_version(tool), "required tool found");
        } else {
            debug!(tool, "required tool missing");
            status.missing_required.push((*tool).to_string());
        }
    }

    for (tool, _package) in optional {
        status.optional_total += 1;
        if command_exists(tool) {
            status.optional_present += 1;
        } else {
            status.missing_optional.push((*tool).to_string());
        }
    }

    status
}

/// Human-readable install hint for a list of missing tools.
pub fn install_hint(missing: &[String]) -> String {
    let all: Vec<(&str, &str)> = REQUIRED_TOOLS
        .iter()
        .chain(OPTIONAL_TOOLS.iter())
        .copied()
        .collect();
    missing
        .iter()
        .map(|tool| {
            let package = all
                .iter()
                .find(|(t, _)| t == tool)
                .map(|(_, p)| *p)
                .unwrap_or(tool.as_str());
            format!("  {} (install: {})", tool, package)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        // 'ls' should exist on any Unix system
        assert!(command_exists("ls"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_tools_all_present() {
        let status = check_tools(&[("ls", "coreutils"), ("cat", "coreutils")], &[]);
        assert!(status.satisfied());
        assert_eq!(status.required_total, 2);
        assert_eq!(status.required_present, 2);
        assert!(status.missing_required.is_empty());
    }

    #[test]
    fn test_check_tools_missing_required() {
        let status = check_tools(
            &[("ls", "coreutils"), ("nonexistent_command_xyz", "fake")],
            &[],
        );
        assert!(!status.satisfied());
        assert_eq!(status.required_present, 1);
        assert_eq!(status.missing_required, vec!["nonexistent_command_xyz"]);
    }

    #[test]
    fn test_missing_optional_does_not_block() {
        let status = check_tools(&[("ls", "coreutils")], &[("no_such_optional_tool", "fake")]);
        assert!(status.satisfied());
        assert_eq!(status.missing_optional, vec!["no_such_optional_tool"]);
    }

    #[test]
    fn test_install_hint_names_package() {
        let hint = install_hint(&["xz".to_string()]);
        assert!(hint.contains("xz-utils"));
    }
}
