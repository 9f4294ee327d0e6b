//! Versioned release directories and the `current` symlink.

use std::fmt;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};

use chrono::{Local, NaiveDate};
use thiserror::Error;

use crate::directives::Fragment;
use crate::release::checker::{CheckError, ConfigChecker};
use crate::release::version::{latest_release, ReleaseId};
use crate::release::ReleaseError;

const CURRENT: &str = "current";
const CURRENT_TMP: &str = ".current.tmp";
const LOCK_FILE: &str = ".deploy.lock";

/// What rollback did after a rejected release.
#[derive(Debug)]
pub enum RollbackOutcome {
    /// `current` points at the previous release again.
    Restored(PathBuf),
    /// There was no previous release; `current` was removed.
    Removed,
    /// Rollback itself failed; `current` may be missing or stale.
    Failed(ReleaseError),
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackOutcome::Restored(path) => write!(f, "rolled back to {}", path.display()),
            RollbackOutcome::Removed => write!(f, "no previous release, current removed"),
            RollbackOutcome::Failed(e) => write!(f, "rollback failed: {}", e),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// The release was published but the check rejected it.
    #[error("release {} rejected: {}; {}", .release.display(), .source, .rollback)]
    Rejected {
        release: PathBuf,
        #[source]
        source: CheckError,
        rollback: RollbackOutcome,
    },
}

/// Exclusive hold on a config root.
///
/// An advisory lock on `.deploy.lock`; the kernel drops it when the
/// handle closes, including when the process dies. The file itself stays.
#[derive(Debug)]
pub struct DeployLock {
    _file: File,
    path: PathBuf,
}

impl DeployLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Manages the releases of one config root (`<working_dir>/conf.d`).
#[derive(Debug, Clone)]
pub struct ReleaseManager {
    root: PathBuf,
    today: Option<NaiveDate>,
}

impl ReleaseManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            today: None,
        }
    }

    /// Pin the date used for new release names.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current_link(&self) -> PathBuf {
        self.root.join(CURRENT)
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Take the per-root deployment lock.
    pub fn lock(&self) -> Result<DeployLock, ReleaseError> {
        fs::create_dir_all(&self.root).map_err(ReleaseError::io("create", &self.root))?;
        let path = self.root.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(ReleaseError::io("open", &path))?;
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(ReleaseError::Locked(path)),
            Err(TryLockError::Error(e)) => return Err(ReleaseError::io("lock", &path)(e)),
        }

        // holder pid, informational only
        file.set_len(0).map_err(ReleaseError::io("truncate", &path))?;
        writeln!(file, "{}", std::process::id()).map_err(ReleaseError::io("write", &path))?;
        tracing::debug!(lock = %path.display(), "Deploy lock taken");
        Ok(DeployLock { _file: file, path })
    }

    /// Directory the next release is written to.
    pub fn select_target(&self) -> Result<PathBuf, ReleaseError> {
        let latest = latest_release(&self.root).map_err(ReleaseError::io("scan", &self.root))?;
        let id = ReleaseId::next_after(latest, self.today());
        Ok(self.root.join(id.dir_name()))
    }

    /// Release `current` points at, if any.
    pub fn previous_release(&self) -> Result<Option<PathBuf>, ReleaseError> {
        let link = self.current_link();
        match fs::read_link(&link) {
            Ok(target) if target.is_absolute() => Ok(Some(target)),
            Ok(target) => Ok(Some(self.root.join(target))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReleaseError::io("read", link)(e)),
        }
    }

    /// Write every fragment under `target`, which must not exist yet.
    pub fn stage(&self, target: &Path, fragments: &[Fragment]) -> Result<(), ReleaseError> {
        for fragment in fragments {
            if !is_contained(&fragment.path) {
                return Err(ReleaseError::InvalidFragmentPath(fragment.path.clone()));
            }
        }
        if target.exists() {
            return Err(ReleaseError::Exists(target.to_path_buf()));
        }
        fs::create_dir_all(target).map_err(ReleaseError::io("create", target))?;

        for fragment in fragments {
            let path = target.join(&fragment.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(ReleaseError::io("create", parent))?;
            }
            fs::write(&path, &fragment.contents).map_err(ReleaseError::io("write", &path))?;
        }
        tracing::info!(release = %target.display(), files = fragments.len(), "Release staged");
        Ok(())
    }

    /// Point `current` at `target`.
    pub fn publish(&self, target: &Path) -> Result<(), ReleaseError> {
        let relative = target.strip_prefix(&self.root).unwrap_or(target);
        let tmp = self.root.join(CURRENT_TMP);
        match fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ReleaseError::io("remove", tmp)(e)),
        }
        symlink(relative, &tmp).map_err(ReleaseError::io("link", &tmp))?;

        let link = self.current_link();
        if let Err(e) = fs::rename(&tmp, &link) {
            let _ = fs::remove_file(&tmp);
            return Err(ReleaseError::io("replace", link)(e));
        }
        tracing::info!(current = %relative.display(), "Release published");
        Ok(())
    }

    /// Remove `current`. A missing link is not an error.
    pub fn unpublish(&self) -> Result<(), ReleaseError> {
        let link = self.current_link();
        match fs::remove_file(&link) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReleaseError::io("remove", link)(e)),
        }
    }

    /// Restore `previous`, or remove `current` when there is none.
    pub fn rollback(&self, previous: Option<&Path>) -> Result<RollbackOutcome, ReleaseError> {
        match previous {
            Some(previous) => {
                self.publish(previous)?;
                Ok(RollbackOutcome::Restored(previous.to_path_buf()))
            }
            None => {
                self.unpublish()?;
                Ok(RollbackOutcome::Removed)
            }
        }
    }

    /// Stage, publish and check a new release, rolling back on rejection.
    pub fn deploy<C>(&self, fragments: &[Fragment], checker: &C) -> Result<PathBuf, DeployError>
    where
        C: ConfigChecker + ?Sized,
    {
        let _lock = self.lock()?;
        let target = self.select_target()?;
        let previous = self.previous_release()?;
        tracing::info!(
            release = %target.display(),
            previous = ?previous,
            "Deploying release"
        );

        // A failure up to and including publish leaves `current` as it
        // was: the swap is a single rename, so there is nothing to roll back.
        self.stage(&target, fragments)?;
        self.publish(&target)?;

        match checker.check() {
            Ok(()) => {
                tracing::info!(release = %target.display(), "Configuration check passed");
                Ok(target)
            }
            Err(source) => {
                tracing::warn!(release = %target.display(), error = %source, "Configuration check failed");
                let rollback = match self.rollback(previous.as_deref()) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(error = %e, "Rollback failed");
                        RollbackOutcome::Failed(e)
                    }
                };
                tracing::info!(outcome = %rollback, "Rollback finished");
                Err(DeployError::Rejected {
                    release: target,
                    source,
                    rollback,
                })
            }
        }
    }
}

fn is_contained(path: &Path) -> bool {
    path.components().count() > 0
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
