use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};

/// Name of the sentinel file that marks the queue as busy.
pub const LOCK_FILE: &str = "COMPILE_LOCK";

/// Exclusive ownership of a job queue.
///
/// The lock is a sentinel file created with `O_EXCL` and holding the
/// identity of its owner. It is removed when the guard is dropped, so every
/// way out of a job (success, error, or a child killed by a signal) releases
/// it.
#[derive(Debug)]
pub struct JobLock {
    path: Utf8PathBuf,
    owner: String,
}

impl JobLock {
    /// Take the lock in `dir`. Returns `Ok(None)` if it is already held.
    pub fn try_acquire(dir: &Utf8Path) -> Result<Option<Self>> {
        Self::try_acquire_as(dir, owner_identity())
    }

    /// Take the lock in `dir` on behalf of `owner`.
    pub fn try_acquire_as<S: Into<String>>(
        dir: &Utf8Path,
        owner: S,
    ) -> Result<Option<Self>> {
        let path = dir.join(LOCK_FILE);
        let owner = owner.into();
        let mut file =
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    log::debug!("{} is held", path);
                    return Ok(None);
                }
                Err(e) => {
                    return Err(Error::fs(format!("creating lock {path}"), e));
                }
            };
        if let Err(e) = writeln!(file, "{owner}") {
            let _ = fs::remove_file(&path);
            return Err(Error::fs(format!("writing lock {path}"), e));
        }
        let lock = Self { path, owner };
        log::info!("Acquired {} as {}", lock.path, lock.owner);
        Ok(Some(lock))
    }

    /// Who holds the lock in `dir`, if anyone.
    pub fn holder(dir: &Utf8Path) -> Option<String> {
        let text = fs::read_to_string(dir.join(LOCK_FILE)).ok()?;
        Some(text.trim().to_string())
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        // Only remove the file if it is still ours.
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim() == self.owner => {
                if let Err(e) = fs::remove_file(&self.path) {
                    log::warn!("could not release {}: {}", self.path, e);
                } else {
                    log::info!("Released {}", self.path);
                }
            }
            Ok(text) => log::warn!(
                "{} now belongs to {}, leaving it",
                self.path,
                text.trim()
            ),
            Err(e) => log::warn!("lock {} vanished: {}", self.path, e),
        }
    }
}

fn owner_identity() -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".into());
    format!("pid {} user {}", std::process::id(), user)
}
