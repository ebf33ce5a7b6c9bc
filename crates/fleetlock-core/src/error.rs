//! Error types for the update lock subsystem.
//!
//! Errors fall into three categories:
//!
//! - **Contention**: [`Error::UpdatesLocked`]. User-facing, recoverable by
//!   waiting or forcing.
//! - **Environment**: [`Error::LockPrimitive`], [`Error::Io`],
//!   [`Error::ShutdownHook`]. The host is broken in a way this crate cannot fix.
//! - **Internal**: [`Error::InternalInconsistency`], [`Error::Config`].
//!   A collaborator answered something it should never answer.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::AppId;

/// Result alias defaulting to the crate [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why updates are currently locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockedReason {
    /// A service lock file is held by another actor.
    Service { app_id: AppId, service_name: String },
    /// A host OS update left a breadcrumb behind.
    HostUpdateInProgress,
}

impl fmt::Display for LockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service {
                app_id,
                service_name,
            } => write!(
                f,
                "Updates are locked for application {app_id}, service '{service_name}'"
            ),
            Self::HostUpdateInProgress => write!(f, "Waiting for Host OS update to finish"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Updates are locked by another actor or by a host update.
    #[error("{0}")]
    UpdatesLocked(LockedReason),

    /// The exclusive-create primitive failed for a reason other than contention.
    #[error("lock primitive failed for {}: {detail} (exit code: {code:?})", path.display())]
    LockPrimitive {
        path: PathBuf,
        code: Option<i32>,
        detail: String,
    },

    /// A collaborator returned an answer that should be impossible.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Filesystem operation outside the lock primitive failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoErrorKind,
    },

    /// Configuration could not be loaded or validated.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Exit hook could not be installed.
    #[error("failed to install shutdown hook: {0}")]
    ShutdownHook(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: err.into(),
        }
    }

    /// Contention that clears by waiting or forcing.
    #[must_use]
    pub const fn is_updates_locked(&self) -> bool {
        matches!(self, Self::UpdatesLocked(_))
    }

    /// Failures that indicate a broken environment rather than contention.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_updates_locked()
    }

    /// The application/service pair holding the lock, when known.
    #[must_use]
    pub fn locked_service(&self) -> Option<(AppId, &str)> {
        match self {
            Self::UpdatesLocked(LockedReason::Service {
                app_id,
                service_name,
            }) => Some((*app_id, service_name.as_str())),
            _ => None,
        }
    }
}

/// IO error kinds (cloneable, no source chain issues)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoErrorKind {
    NotFound,
    PermissionDenied,
    AlreadyExists,
    Other(String),
}

impl fmt::Display for IoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for IoErrorKind {}

impl From<io::Error> for IoErrorKind {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            _ => Self::Other(err.to_string()),
        }
    }
}
