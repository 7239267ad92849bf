//! Supervised execution of external build/install steps.
//!
//! Steps are declarative values (program + args + working directory), never
//! shell strings assembled here. Each step runs as an isolated child process;
//! the parent polls for exit on a fixed tick rather than blocking, so a
//! per-step deadline can be enforced without OS timer signals.
//!
//! Timeout handling is a two-phase state machine,
//! `Running -> TermSent -> KillSent`: on deadline the child gets SIGTERM, a
//! short grace window, and then SIGKILL. The machine drives a
//! [`ProcessHandle`] trait so it can be exercised in tests with a fake handle,
//! no real processes involved. Caller-requested cancellation converges on the
//! same path as a forced timeout with zero grace.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// One external command in a build/install sequence.
#[derive(Debug, Clone)]
pub struct StepSpec {
    /// Short label used in logs and error reports.
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Per-step deadline; `None` means wait indefinitely.
    pub timeout: Option<Duration>,
}

impl StepSpec {
    pub fn new(name: &str, program: &str, cwd: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: Vec::new(),
            cwd: cwd.into(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Terminal state of one supervised step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Success,
    NonZeroExit(i32),
    KilledBySignal(i32),
    /// The step hit its deadline and was terminated by the supervisor.
    /// Distinct from both plain failure and an externally delivered signal.
    TimedOut,
    SpawnFailed(String),
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Success)
    }
}

impl std::fmt::Display for StepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepResult::Success => write!(f, "success"),
            StepResult::NonZeroExit(code) => write!(f, "exited with status {code}"),
            StepResult::KilledBySignal(sig) => write!(f, "killed by signal {sig}"),
            StepResult::TimedOut => write!(f, "timed out"),
            StepResult::SpawnFailed(err) => write!(f, "could not run: {err}"),
        }
    }
}

/// Outcome of a whole step sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepsOutcome {
    Completed,
    Failed {
        index: usize,
        step: String,
        result: StepResult,
    },
}

/// How a child process ended, as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Code(i32),
    Signal(i32),
}

/// Minimal view of a child process the supervisor needs. Implemented for
/// [`std::process::Child`]; tests inject a fake.
pub trait ProcessHandle {
    /// Non-blocking exit poll. `Ok(None)` while still running.
    fn poll_exit(&mut self) -> io::Result<Option<ExitKind>>;
    /// Request graceful termination (SIGTERM). Best effort.
    fn send_term(&mut self);
    /// Force termination (SIGKILL). Best effort.
    fn send_kill(&mut self);
}

impl ProcessHandle for Child {
    fn poll_exit(&mut self) -> io::Result<Option<ExitKind>> {
        match self.try_wait()? {
            None => Ok(None),
            Some(status) => {
                if let Some(code) = status.code() {
                    Ok(Some(ExitKind::Code(code)))
                } else if let Some(sig) = status.signal() {
                    Ok(Some(ExitKind::Signal(sig)))
                } else {
                    // Neither code nor signal should be unreachable on Unix.
                    Ok(Some(ExitKind::Code(-1)))
                }
            }
        }
    }

    fn send_term(&mut self) {
        // The child may already be gone; a failed kill(2) is fine here.
        unsafe {
            libc::kill(self.id() as libc::pid_t, libc::SIGTERM);
        }
    }

    fn send_kill(&mut self) {
        let _ = self.kill();
    }
}

/// Supervision phases of the graceful-then-forceful termination machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    TermSent { grace_deadline: Instant },
    KillSent,
}

/// Runs ordered step lists under supervision.
///
/// `poll_interval` is the non-blocking wait tick (1 second in production);
/// `term_grace` is how long a child gets between SIGTERM and SIGKILL.
pub struct StepRunner {
    pub poll_interval: Duration,
    pub term_grace: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for StepRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            term_grace: Duration::from_secs(2),
            cancel: None,
        }
    }
}

impl StepRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cancellation flag. A set flag is treated as a forced timeout
    /// with zero grace.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Execute steps strictly in order. Step *n+1* never starts unless step
    /// *n* succeeded; the first non-success aborts the rest and is reported
    /// upward unretried (retries are the orchestrator's call, never ours).
    pub fn run_steps(&self, steps: &[StepSpec]) -> StepsOutcome {
        for (index, step) in steps.iter().enumerate() {
            info!(
                step = %step.name,
                program = %step.program,
                cwd = %step.cwd.display(),
                "running step {}/{}",
                index + 1,
                steps.len()
            );
            let result = self.run_step(step);
            if !result.is_success() {
                warn!(step = %step.name, %result, "step failed, aborting sequence");
                return StepsOutcome::Failed {
                    index,
                    step: step.name.clone(),
                    result,
                };
            }
        }
        StepsOutcome::Completed
    }

    /// Spawn one step and supervise it to completion.
    pub fn run_step(&self, spec: &StepSpec) -> StepResult {
        let mut child = match Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => return StepResult::SpawnFailed(format!("spawn failed: {err}")),
        };

        self.supervise(&mut child, spec.timeout)
    }

    /// Drive the two-phase supervision machine over any process handle.
    pub fn supervise<H: ProcessHandle>(
        &self,
        handle: &mut H,
        timeout: Option<Duration>,
    ) -> StepResult {
        let start = Instant::now();
        let mut phase = Phase::Running;

        loop {
            match handle.poll_exit() {
                Ok(Some(kind)) => {
                    // Once termination was initiated by us, the result is
                    // TimedOut no matter how the child actually ended.
                    return match phase {
                        Phase::Running => match kind {
                            ExitKind::Code(0) => StepResult::Success,
                            ExitKind::Code(code) => StepResult::NonZeroExit(code),
                            ExitKind::Signal(sig) => StepResult::KilledBySignal(sig),
                        },
                        Phase::TermSent { .. } | Phase::KillSent => StepResult::TimedOut,
                    };
                }
                Ok(None) => {}
                // Distinct from a spawn failure: the child exists but its
                // exit status can no longer be observed.
                Err(err) => {
                    return StepResult::SpawnFailed(format!("exit status poll failed: {err}"))
                }
            }

            let cancelled = self
                .cancel
                .as_ref()
                .map(|flag| flag.load(Ordering::Relaxed))
                .unwrap_or(false);

            match phase {
                Phase::Running => {
                    let deadline_hit =
                        timeout.map(|limit| start.elapsed() >= limit).unwrap_or(false);
                    if cancelled || deadline_hit {
                        debug!(cancelled, "deadline reached, sending SIGTERM");
                        handle.send_term();
                        let grace = if cancelled { Duration::ZERO } else { self.term_grace };
                        phase = Phase::TermSent {
                            grace_deadline: Instant::now() + grace,
                        };
                        continue;
                    }
                }
                Phase::TermSent { grace_deadline } => {
                    if Instant::now() >= grace_deadline {
                        debug!("grace window elapsed, sending SIGKILL");
                        handle.send_kill();
                        phase = Phase::KillSent;
                        continue;
                    }
                }
                Phase::KillSent => {}
            }

            thread::sleep(self.poll_interval);
        }
    }
}
