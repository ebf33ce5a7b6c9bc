//! # Fleetlock Core
//!
//! Update lock coordination for the device fleet agent.
//!
//! Decides whether an update operation against an application's containers may
//! proceed, serializes in-process and cross-process locks, and vetoes reboots
//! while the host OS is mid-update.
//!
//! ## Components
//!
//! - [`lockfile`]: cross-process advisory lock files created through an atomic,
//!   non-retrying exclusive-create primitive, with a process-wide registry used
//!   for exit cleanup.
//! - [`coordinator`]: per-application update lock combining an in-process
//!   read/write lock with one lock file pair per service.
//! - [`hup`]: host OS update breadcrumb detection.
//! - [`shutdown`]: exit hooks that release leftover lock files.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` / `expect()` / `panic!()` outside tests
//! - No `unsafe` - safe Rust only
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fleetlock_core::{
//!     config::{load_config, MemoryConfigStore},
//!     AppId, LockCoordinator, LockOptions,
//! };
//!
//! # async fn run() -> fleetlock_core::Result<()> {
//! let config = load_config(None)?;
//! let store = Arc::new(MemoryConfigStore::from_config(&config));
//! let coordinator = LockCoordinator::from_config(&config, store);
//!
//! coordinator
//!     .with_lock(Some(AppId::new(42)), LockOptions::new(), || async {
//!         // mutate containers here
//!         Ok::<_, fleetlock_core::Error>(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod config;
pub mod coordinator;
mod error;
pub mod hup;
pub mod lockfile;
pub mod shutdown;
mod types;

pub use coordinator::{LockCoordinator, LockOptions, ReadLockGuard};
pub use error::{Error, IoErrorKind, LockedReason, Result};
pub use hup::HupGuard;
pub use lockfile::{AdvisoryLockfile, Identity};
pub use shutdown::{spawn_signal_cleanup, ExitCleanupGuard, ExitSignals};
pub use types::AppId;
