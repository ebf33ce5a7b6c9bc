//! Lock file domain types.

use std::path::PathBuf;

use thiserror::Error;

use crate::IoErrorKind;

/// The identity the exclusive-create primitive runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    uid: Option<u32>,
}

impl Identity {
    /// Run as `uid`.
    #[must_use]
    pub const fn user(uid: u32) -> Self {
        Self { uid: Some(uid) }
    }

    /// Run as whoever this process already is.
    #[must_use]
    pub const fn inherit() -> Self {
        Self { uid: None }
    }

    #[must_use]
    pub const fn uid(self) -> Option<u32> {
        self.uid
    }
}

/// Outcome of a failed lock file operation.
///
/// `AlreadyHeld` is contention. Every other variant is an environment failure
/// and must reach the caller unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockfileError {
    #[error("lock file already exists: {}", path.display())]
    AlreadyHeld { path: PathBuf },

    #[error("exclusive create failed for {}: {detail} (exit code: {code:?})", path.display())]
    Primitive {
        path: PathBuf,
        code: Option<i32>,
        detail: String,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoErrorKind,
    },
}
