//! Exit-time release of lock files.
//!
//! Rust has no `atexit` hook that runs on every termination path, so the
//! embedding binary opts in:
//!
//! - Hold an [`ExitCleanupGuard`] in `main`. Normal termination drops it.
//! - Call [`spawn_signal_cleanup`] to handle SIGINT/SIGTERM.
//!
//! Both paths drain the lock registry at most once per process. A hard crash
//! (SIGKILL, abort) cannot be covered; stale lock files left that way are what
//! `force` and `lockOverride` exist for.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use crate::{
    lockfile::registry::{self, CleanupReport},
    Result,
};

static EXIT_CLEANUP_DONE: AtomicBool = AtomicBool::new(false);

/// Release every lock file this process still holds.
///
/// Returns `None` if exit cleanup already ran.
pub fn run_exit_cleanup() -> Option<CleanupReport> {
    if EXIT_CLEANUP_DONE.swap(true, Ordering::SeqCst) {
        return None;
    }

    let report = registry::release_all_sync();
    if !report.released.is_empty() || !report.failed.is_empty() {
        tracing::info!(
            released = report.released.len(),
            failed = report.failed.len(),
            "Released leftover lock files at exit"
        );
    }
    Some(report)
}

/// Runs exit cleanup when dropped.
#[derive(Debug)]
#[must_use = "exit cleanup runs when the guard is dropped"]
pub struct ExitCleanupGuard {
    _private: (),
}

impl ExitCleanupGuard {
    pub const fn install() -> Self {
        Self { _private: () }
    }
}

impl Drop for ExitCleanupGuard {
    fn drop(&mut self) {
        let _ = run_exit_cleanup();
    }
}

/// Exit status for SIGINT, `128 + 2`.
pub const SIGINT_EXIT_STATUS: i32 = 130;
/// Exit status for SIGTERM, `128 + 15`.
pub const SIGTERM_EXIT_STATUS: i32 = 143;

/// Installed SIGINT/SIGTERM listeners.
///
/// Installing them replaces the default signal disposition, so whoever holds
/// this owns process termination from then on.
#[derive(Debug)]
pub struct ExitSignals {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ExitSignals {
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownHook` if a handler cannot be installed.
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        use crate::Error;

        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| Error::ShutdownHook(format!("failed to set up SIGINT: {e}")))?;
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| Error::ShutdownHook(format!("failed to set up SIGTERM: {e}")))?;
        Ok(Self { sigint, sigterm })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next exit signal and return the conventional exit status.
    ///
    /// `None` if no signal can arrive any more.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Option<i32> {
        tokio::select! {
            Some(()) = self.sigint.recv() => {
                tracing::info!("Received SIGINT");
                Some(SIGINT_EXIT_STATUS)
            }
            Some(()) = self.sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                Some(SIGTERM_EXIT_STATUS)
            }
            else => None,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Option<i32> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C");
                Some(SIGINT_EXIT_STATUS)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ctrl-C handler failed");
                None
            }
        }
    }
}

/// Wait for an exit signal, then release leftover lock files.
///
/// Returns the exit status to terminate with. Does not exit.
pub async fn cleanup_on_exit_signal(signals: &mut ExitSignals) -> Option<i32> {
    let status = signals.recv().await?;
    let _ = run_exit_cleanup();
    Some(status)
}

/// Release lock files on SIGINT/SIGTERM, then exit with the conventional
/// `128 + signal` status.
///
/// Must be called from within a tokio runtime. The spawned task owns process
/// termination.
///
/// # Errors
///
/// Returns `ShutdownHook` if the signal handlers cannot be installed.
pub fn spawn_signal_cleanup() -> Result<JoinHandle<()>> {
    let mut signals = ExitSignals::install()?;
    Ok(tokio::spawn(async move {
        if let Some(status) = cleanup_on_exit_signal(&mut signals).await {
            std::process::exit(status);
        }
    }))
}
