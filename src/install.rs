//! Installation orchestrator.
//!
//! The only component allowed to decide between commit and rollback. One
//! session walks the phase machine
//!
//! ```text
//! CheckingDeps -> BackingUp -> Building -> InstallingArtifacts
//!     -> UpdatingBootConfig -> Committed
//! ```
//!
//! with `RolledBack` reachable from any non-terminal phase. The first two
//! phases are preflight: nothing destructive has happened, so their failures
//! need no rollback. From `Building` on, every failure drains the session
//! ledger before the error propagates.
//!
//! Sessions serialize through an exclusive advisory lock: the ledger and the
//! backup root belong to exactly one writer at a time.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::backup::BackupManager;
use crate::boot::{self, BootEnv};
use crate::config::Config;
use crate::deps::{self, DependencyStatus};
use crate::feedback::Feedback;
use crate::ledger::{RollbackLedger, UndoAction};
use crate::process::{StepResult, StepRunner, StepSpec, StepsOutcome};

const LOCK_FILENAME: &str = "session.lock";

/// Phases of one installation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CheckingDeps,
    BackingUp,
    Building,
    InstallingArtifacts,
    UpdatingBootConfig,
    Committed,
    RolledBack,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::CheckingDeps => "dependency check",
            Phase::BackingUp => "backup",
            Phase::Building => "build",
            Phase::InstallingArtifacts => "artifact install",
            Phase::UpdatingBootConfig => "boot configuration update",
            Phase::Committed => "committed",
            Phase::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Everything an installation can report upward. Callers never see raw OS
/// error codes; `exit_code` gives the stable process exit mapping.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("missing required tools:\n{}", deps::install_hint(.missing))]
    Dependency { missing: Vec<String> },

    /// Preflight failure: the snapshot never happened, nothing was mutated.
    #[error("backup failed: {0}")]
    Backup(anyhow::Error),

    /// A build/install step failed; rollback was attempted.
    #[error("step '{step}' {result} during {phase}")]
    Step {
        phase: Phase,
        step: String,
        result: StepResult,
    },

    /// Bootloader integration failed; rollback was attempted.
    #[error("boot configuration update failed: step '{step}' {result}")]
    BootConfig { step: String, result: StepResult },

    /// An undo obligation could not be recorded. Fatal; the process must not
    /// continue mutating state it cannot reverse.
    #[error("could not record an undo obligation")]
    LedgerIntegrity,

    #[error("another installation session is active")]
    SessionActive,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl InstallError {
    /// Stable exit-code mapping for the CLI (0 is success).
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallError::Dependency { .. } => 1,
            InstallError::Backup(_) => 2,
            InstallError::Step { .. } => 3,
            InstallError::BootConfig { .. } => 4,
            InstallError::LedgerIntegrity => 5,
            InstallError::SessionActive => 6,
            InstallError::InvalidRequest(_) => 7,
        }
    }
}

/// Result of a committed installation.
#[derive(Debug)]
pub struct InstallOutcome {
    pub kernel_name: String,
    pub backup_dir: PathBuf,
    pub message: String,
}

/// The ordered external commands for one installation, split by phase.
/// Declarative: the executor never assembles shell strings.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub build_steps: Vec<StepSpec>,
    pub install_steps: Vec<StepSpec>,
    pub boot_steps: Vec<StepSpec>,
}

impl InstallPlan {
    /// Classic source build: configure, compile, install modules and image.
    pub fn for_source(config: &Config, source_path: &Path) -> Result<Self, InstallError> {
        let jobs = match std::thread::available_parallelism() {
            Ok(n) => n.get(),
            Err(err) => {
                warn!("could not detect CPU count ({err}), using 4 jobs");
                4
            }
        };
        let make = |name: &str, args: &[&str]| {
            let mut step = StepSpec::new(name, "make", source_path).args(args.iter().copied());
            if let Some(timeout) = config.step_timeout {
                step = step.timeout(timeout);
            }
            step
        };

        Ok(Self {
            build_steps: vec![
                make("make mrproper", &["mrproper"]),
                make("make defconfig", &["defconfig"]),
                make("make", &[&format!("-j{jobs}")]),
            ],
            install_steps: vec![
                make("make modules_install", &["modules_install"]),
                make("make install", &["install"]),
            ],
            boot_steps: vec![required_refresh_step()?],
        })
    }

    /// Repository install through the host package manager.
    pub fn for_repository(config: &Config, kernel_name: &str) -> Result<Self, InstallError> {
        let candidates: &[(&str, &[&str])] = &[
            ("apt-get", &["install", "-y"]),
            ("dnf", &["install", "-y"]),
            ("pacman", &["-S", "--noconfirm"]),
        ];

        let (manager, args) = candidates
            .iter()
            .find(|(manager, _)| which::which(manager).is_ok())
            .ok_or_else(|| InstallError::Dependency {
                missing: vec!["apt-get".to_string(), "dnf".to_string(), "pacman".to_string()],
            })?;

        let mut step = StepSpec::new(&format!("{manager} install"), manager, "/")
            .args(args.iter().copied())
            .arg(kernel_name);
        if let Some(timeout) = config.step_timeout {
            step = step.timeout(timeout);
        }

        Ok(Self {
            build_steps: Vec::new(),
            install_steps: vec![step],
            boot_steps: vec![required_refresh_step()?],
        })
    }
}

/// The bootloader refresh tool is as mandatory as the build tools; a host
/// without one is caught in preflight, before anything is mutated.
fn required_refresh_step() -> Result<StepSpec, InstallError> {
    boot::refresh_step().ok_or_else(|| InstallError::Dependency {
        missing: vec!["update-grub".to_string()],
    })
}

/// Mutable state of one install request, ledger included. Created when the
/// install is requested, dropped when the orchestrator returns; the ledger is
/// owned here, never process-global.
#[derive(Debug)]
pub struct InstallationSession {
    pub kernel_name: String,
    pub source_path: Option<PathBuf>,
    pub phase: Phase,
    pub ledger: RollbackLedger,
}

impl InstallationSession {
    fn new(kernel_name: &str, source_path: Option<&Path>) -> Self {
        Self {
            kernel_name: kernel_name.to_string(),
            source_path: source_path.map(Path::to_path_buf),
            phase: Phase::CheckingDeps,
            ledger: RollbackLedger::new(),
        }
    }
}

/// Exclusive advisory lock serializing installation sessions.
struct SessionLock {
    file: File,
    path: PathBuf,
}

impl SessionLock {
    fn acquire(state_dir: &Path) -> Result<Self, InstallError> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("creating state directory '{}'", state_dir.display()))
            .map_err(InstallError::Backup)?;
        let path = state_dir.join(LOCK_FILENAME);
        let file = File::create(&path)
            .with_context(|| format!("creating lock file '{}'", path.display()))
            .map_err(InstallError::Backup)?;
        if file.try_lock_exclusive().is_err() {
            return Err(InstallError::SessionActive);
        }
        Ok(Self { file, path })
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            warn!(path = %self.path.display(), "releasing session lock failed: {err}");
        }
    }
}

/// Drives installation sessions to commit or rollback.
pub struct Installer<'fb> {
    config: Config,
    runner: StepRunner,
    feedback: &'fb dyn Feedback,
}

impl<'fb> Installer<'fb> {
    pub fn new(config: Config, feedback: &'fb dyn Feedback) -> Self {
        Self {
            config,
            runner: StepRunner::default(),
            feedback,
        }
    }

    #[cfg(test)]
    fn with_runner(mut self, runner: StepRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Build and install a kernel from a source tree.
    pub fn install_from_source(
        &self,
        source_path: &Path,
        kernel_name: &str,
    ) -> Result<InstallOutcome, InstallError> {
        validate_kernel_name(kernel_name)?;
        if !source_path.is_dir() {
            return Err(InstallError::InvalidRequest(format!(
                "source path '{}' does not exist",
                source_path.display()
            )));
        }
        if !source_path.join("Makefile").exists() {
            return Err(InstallError::InvalidRequest(format!(
                "'{}' is not a kernel source tree (no Makefile)",
                source_path.display()
            )));
        }

        let plan = InstallPlan::for_source(&self.config, source_path)?;
        self.run_session(kernel_name, Some(source_path), deps::check(), plan)
    }

    /// Install a packaged kernel from the configured repository.
    pub fn install_from_repository(
        &self,
        kernel_name: &str,
    ) -> Result<InstallOutcome, InstallError> {
        validate_kernel_name(kernel_name)?;
        let plan = InstallPlan::for_repository(&self.config, kernel_name)?;
        // Repository installs need no build toolchain; the package manager
        // probe in the plan builder is the dependency check.
        self.run_session(kernel_name, None, DependencyStatus::default(), plan)
    }

    /// Walk one session through the phase machine.
    fn run_session(
        &self,
        kernel_name: &str,
        source_path: Option<&Path>,
        status: DependencyStatus,
        plan: InstallPlan,
    ) -> Result<InstallOutcome, InstallError> {
        let mut session = InstallationSession::new(kernel_name, source_path);
        let env = BootEnv::from_config(&self.config);

        info!(kernel_name, "installation session started");

        // -- CheckingDeps: pure preflight, filesystem untouched on failure.
        // Runs before the lock is taken so a refused install writes nothing,
        // not even the lock file.
        session.phase = Phase::CheckingDeps;
        self.feedback.info("Checking dependencies...");
        if !status.satisfied() {
            self.feedback
                .error("Missing required tools, installation aborted");
            return Err(InstallError::Dependency {
                missing: status.missing_required,
            });
        }
        if !status.missing_optional.is_empty() {
            self.feedback.warning(&format!(
                "Optional tools missing: {}",
                status.missing_optional.join(", ")
            ));
        }

        let _lock = SessionLock::acquire(&self.config.state_dir)?;

        // -- BackingUp: failure here means no snapshot and no mutation,
        //    so there is still nothing to roll back.
        session.phase = Phase::BackingUp;
        self.feedback.info("Backing up configuration...");
        let manager = BackupManager::new(&self.config.backup_root);
        let backup_dir = manager
            .backup_config(&self.config.config_dir, &mut session.ledger)
            .map_err(|err| {
                self.feedback.error("Backup failed, installation aborted");
                InstallError::Backup(err)
            })?;

        // -- Building
        self.feedback.info("Building kernel...");
        self.run_phase(&mut session, &env, &plan, Phase::Building, &plan.build_steps)?;

        // -- InstallingArtifacts: record removal obligations for everything
        //    the steps may create, then create it. `make install` hooks can
        //    already touch the bootloader config, so the entry-removal
        //    obligation is recorded here, not in the boot phase.
        session.phase = Phase::InstallingArtifacts;
        for path in boot::kernel_artifact_paths(&env, kernel_name) {
            session.ledger.push(UndoAction::RemoveFile { path });
        }
        session.ledger.push(UndoAction::RemoveFile {
            path: boot::kernel_modules_path(&env, kernel_name),
        });
        session.ledger.push(UndoAction::RemoveKernelEntry {
            kernel_name: kernel_name.to_string(),
        });
        self.feedback.info("Installing artifacts...");
        self.run_phase(
            &mut session,
            &env,
            &plan,
            Phase::InstallingArtifacts,
            &plan.install_steps,
        )?;

        // -- UpdatingBootConfig
        session.phase = Phase::UpdatingBootConfig;
        self.feedback.info("Updating boot configuration...");
        if let StepsOutcome::Failed { step, result, .. } = self.runner.run_steps(&plan.boot_steps)
        {
            self.feedback.error("Boot configuration update failed");
            self.rollback(&mut session, &env, &plan);
            return Err(InstallError::BootConfig { step, result });
        }

        // -- Committed: the mutations are now permanent.
        session.phase = Phase::Committed;
        session.ledger.discard();
        let message = format!("Kernel '{kernel_name}' installed successfully");
        self.feedback.info(&message);
        info!(kernel_name, "installation committed");

        Ok(InstallOutcome {
            kernel_name: kernel_name.to_string(),
            backup_dir,
            message,
        })
    }

    fn run_phase(
        &self,
        session: &mut InstallationSession,
        env: &BootEnv,
        plan: &InstallPlan,
        phase: Phase,
        steps: &[StepSpec],
    ) -> Result<(), InstallError> {
        session.phase = phase;
        match self.runner.run_steps(steps) {
            StepsOutcome::Completed => Ok(()),
            StepsOutcome::Failed { step, result, .. } => {
                self.feedback
                    .error(&format!("Step '{step}' failed ({result}), rolling back"));
                self.rollback(session, env, plan);
                Err(InstallError::Step {
                    phase,
                    step,
                    result,
                })
            }
        }
    }

    /// Drain the ledger and settle any queued bootloader refresh. Draining an
    /// already-drained session is a no-op, so re-entry is harmless.
    fn rollback(&self, session: &mut InstallationSession, env: &BootEnv, plan: &InstallPlan) {
        session.phase = Phase::RolledBack;
        let report = session.ledger.drain_and_rollback(env);

        if report.boot_refresh_queued {
            // Fire-and-forget: a failed refresh is logged but the top-level
            // outcome stays "failed, rollback attempted".
            if let StepsOutcome::Failed { step, result, .. } =
                self.runner.run_steps(&plan.boot_steps)
            {
                warn!(step = %step, %result, "bootloader refresh after rollback failed");
            }
        }

        if report.failed > 0 {
            self.feedback.warning(&format!(
                "Rollback attempted {} undo actions, {} failed (see log)",
                report.attempted, report.failed
            ));
        } else {
            self.feedback
                .info(&format!("Rolled back {} actions", report.attempted));
        }
    }
}

fn validate_kernel_name(kernel_name: &str) -> Result<(), InstallError> {
    if !boot::is_valid_kernel_name(kernel_name) {
        return Err(InstallError::InvalidRequest(format!(
            "'{kernel_name}' is not a valid kernel name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::RecordingFeedback;
    use crate::fsutil;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// A scratch system tree with a config dir and a grub config.
    fn scratch_system(temp: &TempDir) -> Config {
        let config = Config::rooted_at(temp.path());
        write(&config.config_dir.join("kernel.conf"), "default=old\n");
        write(
            &config.grub_cfg,
            "set default=0\nmenuentry 'old' {\n    linux /boot/vmlinuz-old\n}\n",
        );
        config
    }

    fn sh(name: &str, cwd: &Path, script: &str) -> StepSpec {
        StepSpec::new(name, "sh", cwd).args(["-c", script])
    }

    fn ok_plan(cwd: &Path) -> InstallPlan {
        InstallPlan {
            build_steps: vec![sh("build", cwd, "true")],
            install_steps: vec![sh("install", cwd, "true")],
            boot_steps: vec![sh("refresh", cwd, "true")],
        }
    }

    fn all_present() -> DependencyStatus {
        DependencyStatus::default()
    }

    fn missing(tool: &str) -> DependencyStatus {
        DependencyStatus {
            required_total: 1,
            missing_required: vec![tool.to_string()],
            ..DependencyStatus::default()
        }
    }

    fn fast_runner() -> StepRunner {
        let mut runner = StepRunner::default();
        runner.poll_interval = Duration::from_millis(5);
        runner.term_grace = Duration::from_millis(20);
        runner
    }

    #[test]
    fn test_missing_dependency_leaves_filesystem_untouched() {
        let temp = TempDir::new().unwrap();
        let config = scratch_system(&temp);
        let before = fsutil::dir_digest(temp.path()).unwrap();

        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config.clone(), &feedback);
        let err = installer
            .run_session("test-kernel", None, missing("make"), ok_plan(temp.path()))
            .unwrap_err();

        match err {
            InstallError::Dependency { missing } => assert_eq!(missing, vec!["make"]),
            other => panic!("expected Dependency, got {other:?}"),
        }
        assert!(!config.backup_root.exists());
        // Not even the session lock file: the whole tree is untouched.
        assert_eq!(before, fsutil::dir_digest(temp.path()).unwrap());
    }

    #[test]
    fn test_backup_failure_needs_no_rollback() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::rooted_at(temp.path());
        config.config_dir = temp.path().join("missing-config-dir");

        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config.clone(), &feedback);
        let err = installer
            .run_session("test-kernel", None, all_present(), ok_plan(temp.path()))
            .unwrap_err();

        assert!(matches!(err, InstallError::Backup(_)));
        assert!(!config.backup_root.exists());
    }

    #[test]
    fn test_build_step_failure_rolls_back_config() {
        let temp = TempDir::new().unwrap();
        let config = scratch_system(&temp);
        let config_digest_before = fsutil::dir_digest(&config.config_dir).unwrap();

        // Step 2 of 5 fails; step 1 already tampered with the config dir.
        let tamper = format!(
            "echo tampered > {}",
            config.config_dir.join("kernel.conf").display()
        );
        let plan = InstallPlan {
            build_steps: vec![
                sh("tamper", temp.path(), &tamper),
                sh("fail", temp.path(), "exit 1"),
                sh("never", temp.path(), "true"),
            ],
            install_steps: vec![sh("i1", temp.path(), "true"), sh("i2", temp.path(), "true")],
            boot_steps: vec![sh("refresh", temp.path(), "true")],
        };

        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config.clone(), &feedback);
        let err = installer
            .run_session("test-kernel", None, all_present(), plan)
            .unwrap_err();

        match err {
            InstallError::Step {
                phase,
                step,
                result,
            } => {
                assert_eq!(phase, Phase::Building);
                assert_eq!(step, "fail");
                assert_eq!(result, StepResult::NonZeroExit(1));
            }
            other => panic!("expected Step, got {other:?}"),
        }
        // Rollback restored the pre-backup snapshot byte for byte.
        assert_eq!(
            config_digest_before,
            fsutil::dir_digest(&config.config_dir).unwrap()
        );
        // The backup itself is retained for inspection.
        assert!(config.backup_root.exists());
    }

    #[test]
    fn test_install_failure_removes_artifacts_and_boot_entry() {
        let temp = TempDir::new().unwrap();
        let config = scratch_system(&temp);
        let env = BootEnv::from_config(&config);

        // The install step drops artifacts and a grub entry, then fails.
        let fake_install = format!(
            "touch {boot}/vmlinuz-test-kernel && \
             mkdir -p {modules}/test-kernel && \
             printf 'menuentry \"t\" {{\\n    linux /boot/vmlinuz-test-kernel\\n}}\\n' >> {grub} && \
             exit 1",
            boot = env.boot_dir.display(),
            modules = env.modules_dir.display(),
            grub = env.grub_cfg.display(),
        );
        let plan = InstallPlan {
            build_steps: vec![sh("build", temp.path(), "true")],
            install_steps: vec![sh("install", temp.path(), &fake_install)],
            boot_steps: vec![sh("refresh", temp.path(), "true")],
        };

        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config.clone(), &feedback);
        let err = installer
            .run_session("test-kernel", None, all_present(), plan)
            .unwrap_err();

        assert!(matches!(
            err,
            InstallError::Step {
                phase: Phase::InstallingArtifacts,
                ..
            }
        ));
        assert!(!env.boot_dir.join("vmlinuz-test-kernel").exists());
        assert!(!env.modules_dir.join("test-kernel").exists());
        let grub = fs::read_to_string(&env.grub_cfg).unwrap();
        assert!(!grub.contains("test-kernel"));
        assert!(grub.contains("vmlinuz-old"));
    }

    #[test]
    fn test_boot_config_failure_rolls_back() {
        let temp = TempDir::new().unwrap();
        let config = scratch_system(&temp);
        let config_digest_before = fsutil::dir_digest(&config.config_dir).unwrap();

        let plan = InstallPlan {
            build_steps: vec![sh("build", temp.path(), "true")],
            install_steps: vec![sh("install", temp.path(), "true")],
            boot_steps: vec![sh("refresh", temp.path(), "exit 2")],
        };

        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config.clone(), &feedback);
        let err = installer
            .run_session("test-kernel", None, all_present(), plan)
            .unwrap_err();

        match err {
            InstallError::BootConfig { result, .. } => {
                assert_eq!(result, StepResult::NonZeroExit(2));
            }
            other => panic!("expected BootConfig, got {other:?}"),
        }
        assert_eq!(
            config_digest_before,
            fsutil::dir_digest(&config.config_dir).unwrap()
        );
    }

    #[test]
    fn test_commit_discards_ledger_and_later_failure_replays_nothing() {
        let temp = TempDir::new().unwrap();
        let config = scratch_system(&temp);

        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config.clone(), &feedback);
        let outcome = installer
            .run_session("kernel-one", None, all_present(), ok_plan(temp.path()))
            .unwrap();
        assert_eq!(outcome.kernel_name, "kernel-one");
        assert!(outcome.backup_dir.exists());

        // The committed session's mutations are permanent: change the config
        // dir, fail a second session, and verify the rollback restores the
        // *new* content, not anything from the first session.
        write(&config.config_dir.join("kernel.conf"), "default=new\n");
        let digest_after_edit = fsutil::dir_digest(&config.config_dir).unwrap();

        let failing_plan = InstallPlan {
            build_steps: vec![sh("fail", temp.path(), "exit 1")],
            install_steps: vec![],
            boot_steps: vec![sh("refresh", temp.path(), "true")],
        };
        installer
            .run_session("kernel-two", None, all_present(), failing_plan)
            .unwrap_err();

        assert_eq!(
            digest_after_edit,
            fsutil::dir_digest(&config.config_dir).unwrap()
        );
    }

    #[test]
    fn test_concurrent_session_is_refused() {
        let temp = TempDir::new().unwrap();
        let config = scratch_system(&temp);

        let _held = SessionLock::acquire(&config.state_dir).unwrap();

        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config, &feedback);
        let err = installer
            .run_session("test-kernel", None, all_present(), ok_plan(temp.path()))
            .unwrap_err();
        assert!(matches!(err, InstallError::SessionActive));
    }

    #[test]
    fn test_timed_out_step_reported_distinctly() {
        let temp = TempDir::new().unwrap();
        let config = scratch_system(&temp);

        let plan = InstallPlan {
            build_steps: vec![sh("slow", temp.path(), "sleep 5").timeout(Duration::from_millis(50))],
            install_steps: vec![],
            boot_steps: vec![sh("refresh", temp.path(), "true")],
        };

        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config, &feedback).with_runner(fast_runner());
        let err = installer
            .run_session("test-kernel", None, all_present(), plan)
            .unwrap_err();

        match err {
            InstallError::Step { result, .. } => assert_eq!(result, StepResult::TimedOut),
            other => panic!("expected Step, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_kernel_names_rejected() {
        let temp = TempDir::new().unwrap();
        let config = Config::rooted_at(temp.path());
        let feedback = RecordingFeedback::default();
        let installer = Installer::new(config, &feedback);

        for bad in ["", "a/b", "../escape"] {
            let err = installer.install_from_repository(bad).unwrap_err();
            assert!(matches!(err, InstallError::InvalidRequest(_)), "{bad}");
        }
    }

    #[test]
    fn test_exit_code_mapping_is_stable() {
        assert_eq!(
            InstallError::Dependency { missing: vec![] }.exit_code(),
            1
        );
        assert_eq!(
            InstallError::Backup(anyhow::anyhow!("x")).exit_code(),
            2
        );
        assert_eq!(
            InstallError::Step {
                phase: Phase::Building,
                step: "make".to_string(),
                result: StepResult::NonZeroExit(1),
            }
            .exit_code(),
            3
        );
        assert_eq!(
            InstallError::BootConfig {
                step: "refresh".to_string(),
                result: StepResult::NonZeroExit(1),
            }
            .exit_code(),
            4
        );
        assert_eq!(InstallError::LedgerIntegrity.exit_code(), 5);
        assert_eq!(InstallError::SessionActive.exit_code(), 6);
        assert_eq!(
            InstallError::InvalidRequest("x".to_string()).exit_code(),
            7
        );
    }
}
