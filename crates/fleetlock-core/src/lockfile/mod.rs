//! Cross-process advisory lock files.
//!
//! A lock file is taken by an atomic, non-retrying exclusive-create primitive
//! running under an unprivileged identity. The primitive's atomicity is the
//! only arbiter of cross-process mutual exclusion.
//!
//! Every lock file this process takes is also recorded in a process-wide
//! registry. The registry is bookkeeping for exit cleanup, never a source of
//! truth for exclusion: see [`registry`].
//!
//! # Layout
//!
//! ```text
//! <base>/<app_id>/<service>/updates.lock
//! <base>/<app_id>/<service>/resin-updates.lock
//! ```
//!
//! Both file names are honored. A service is locked when either exists.

mod operations;
mod paths;
mod primitive;
pub mod registry;
mod types;

pub use operations::AdvisoryLockfile;
pub use paths::{app_lock_dir, lock_paths, service_lock_dir, LEGACY_LOCK_FILE, LOCK_FILE};
pub use primitive::{
    CreateFailure, ExclusiveCreate, LockfileCommand, NativeCreate, LOCKFILE_EXISTS_EXIT_CODE,
};
pub use types::{Identity, LockfileError};
