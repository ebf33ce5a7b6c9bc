//! The atomic, non-retrying exclusive-create primitive.
//!
//! Implementations must distinguish "destination already exists" from every
//! other failure. Nothing else about them is assumed.

use std::{fmt, io, path::Path, path::PathBuf, process::Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use super::types::Identity;

/// `lockfile` exits with `EX_CANTCREAT` when the destination exists and
/// retries are disabled.
pub const LOCKFILE_EXISTS_EXIT_CODE: i32 = 73;

/// Why an exclusive create did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateFailure {
    AlreadyExists,
    Failed { code: Option<i32>, detail: String },
}

/// Create a file at `path` if and only if it does not exist, as `identity`.
#[async_trait]
pub trait ExclusiveCreate: Send + Sync + fmt::Debug {
    async fn create(&self, path: &Path, identity: Identity) -> Result<(), CreateFailure>;
}

/// Shells out to procmail's `lockfile -r 0`.
#[derive(Debug, Clone)]
pub struct LockfileCommand {
    binary: PathBuf,
}

impl LockfileCommand {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ExclusiveCreate for LockfileCommand {
    async fn create(&self, path: &Path, identity: Identity) -> Result<(), CreateFailure> {
        let mut command = Command::new(&self.binary);
        command
            .arg("-r")
            .arg("0")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        if let Some(uid) = identity.uid() {
            command.uid(uid);
        }
        #[cfg(not(unix))]
        let _ = identity;

        let output = command.output().await.map_err(|e| CreateFailure::Failed {
            code: None,
            detail: format!("failed to run {}: {e}", self.binary.display()),
        })?;

        match output.status.code() {
            Some(0) => Ok(()),
            Some(LOCKFILE_EXISTS_EXIT_CODE) => Err(CreateFailure::AlreadyExists),
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let detail = if stderr.is_empty() {
                    format!("{} exited with {}", self.binary.display(), output.status)
                } else {
                    stderr
                };
                Err(CreateFailure::Failed { code, detail })
            }
        }
    }
}

/// `O_CREAT | O_EXCL` followed by a `chown` to the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCreate;

#[async_trait]
impl ExclusiveCreate for NativeCreate {
    async fn create(&self, path: &Path, identity: Identity) -> Result<(), CreateFailure> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o644);

        match options.open(path).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(CreateFailure::AlreadyExists)
            }
            Err(e) => return Err(failed(&e)),
        }

        if let Err(e) = assign_owner(path, identity) {
            // Never leave a lock file behind that the caller does not know it holds.
            if let Err(cleanup) = tokio::fs::remove_file(path).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %cleanup,
                    "Failed to remove lock file after ownership change failed"
                );
            }
            return Err(failed(&e));
        }

        Ok(())
    }
}

#[cfg(unix)]
fn assign_owner(path: &Path, identity: Identity) -> io::Result<()> {
    identity
        .uid()
        .map_or(Ok(()), |uid| std::os::unix::fs::chown(path, Some(uid), None))
}

#[cfg(not(unix))]
fn assign_owner(_path: &Path, _identity: Identity) -> io::Result<()> {
    Ok(())
}

fn failed(err: &io::Error) -> CreateFailure {
    CreateFailure::Failed {
        code: err.raw_os_error(),
        detail: err.to_string(),
    }
}
