//! Release management subsystem.
//!
//! # Layout
//! ```text
//! <working_dir>/conf.d/
//!     release-20240101.1/     one immutable snapshot per deployment
//!     release-20240101.2/
//!     current -> release-20240101.2
//!     .deploy.lock            advisory lock, held while a deployment runs
//! ```
//!
//! # Deployment
//! ```text
//! lock → select target → read previous → stage → publish → check
//!                                                     │
//!                                          rejected   ▼
//!                                 rollback (previous, or remove current)
//! ```
//!
//! # Design Decisions
//! - A failed release directory is left on disk for inspection
//! - `current` is swapped with rename(2) over a temporary symlink
//! - One deployment per config root at a time, enforced by flock(2) on
//!   the lock file so a crashed run never leaves the root locked

pub mod checker;
pub mod manager;
pub mod version;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use checker::{CheckError, CommandChecker, ConfigChecker};
pub use manager::{DeployError, DeployLock, ReleaseManager, RollbackOutcome};
pub use version::{latest_release, InvalidReleaseName, ReleaseId};

/// Filesystem-level release failures.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("release directory {0} already exists")]
    Exists(PathBuf),

    #[error("fragment path {0} must be relative and stay inside the release")]
    InvalidFragmentPath(PathBuf),

    #[error("another deployment holds {0}")]
    Locked(PathBuf),
}

impl ReleaseError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| ReleaseError::Io {
            action,
            path,
            source,
        }
    }
}
