//! Transactional kernel installation for Linux hosts.
//!
//! kernelctl builds or fetches a kernel, installs its artifacts, and wires it
//! into the bootloader as one all-or-nothing session. Every destructive step
//! records its inverse in a rollback ledger *before* it runs; any failure
//! drains the ledger most-recent-first and leaves the host as it was. Only a
//! committed session makes the mutations permanent.
//!
//! # Architecture
//!
//! ```text
//! install::Installer (orchestrator, owns the phase machine)
//!     │
//!     ├── deps       preflight tool probes
//!     ├── backup     config-directory snapshots
//!     ├── process    supervised external steps (timeout, TERM→KILL)
//!     ├── ledger     the undo log, drained on failure
//!     ├── boot       bootloader entries and refresh
//!     └── kernels    installed-kernel inventory and removal
//! ```
//!
//! The library never talks to a terminal directly; operator-facing status goes
//! through the [`feedback::Feedback`] trait and diagnostics through `tracing`.

pub mod backup;
pub mod boot;
pub mod config;
pub mod deps;
pub mod feedback;
pub mod fsutil;
pub mod install;
pub mod kernels;
pub mod ledger;
pub mod logging;
pub mod process;

pub use config::Config;
pub use install::{InstallError, InstallOutcome, Installer};
