//! Per-profile advisory locks.
//!
//! A lock is a file under `<root>/locks/` created with `create_new`, which gives
//! single-winner semantics across processes. The guard removes the file on drop,
//! so every exit path (including `?` early returns) releases it.

use crate::core::config::LockConfig;
use crate::core::error::TeamError;
use crate::core::store::TeamRoot;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

const RETRY_INTERVAL_MS: u64 = 25;

#[derive(Debug)]
pub struct ProfileLock {
    path: PathBuf,
    _file: File,
}

impl ProfileLock {
    /// Block until the lock for `team` is held or `config.timeout_ms` elapses.
    pub fn acquire(root: &TeamRoot, team: &str, config: &LockConfig) -> Result<Self, TeamError> {
        let locks_dir = root.locks_dir();
        fs::create_dir_all(&locks_dir).map_err(TeamError::IoError)?;
        let lock_path = locks_dir.join(format!("{}.lock", team));
        let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);

        loop {
            if let Some(lock) = try_acquire(&lock_path)? {
                tracing::debug!(team, "profile lock acquired");
                return Ok(lock);
            }
            if is_stale(&lock_path, config.stale_after_secs) {
                tracing::warn!(team, path = %lock_path.display(), "breaking stale profile lock");
                let _ = fs::remove_file(&lock_path);
                continue;
            }
            if Instant::now() >= deadline {
                return Err(TeamError::Locked(team.to_string()));
            }
            thread::sleep(Duration::from_millis(RETRY_INTERVAL_MS));
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn try_acquire(lock_path: &Path) -> Result<Option<ProfileLock>, TeamError> {
    let mut file = match OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(err) => return Err(TeamError::IoError(err)),
    };
    let _ = writeln!(file, "{}", std::process::id());

    Ok(Some(ProfileLock {
        path: lock_path.to_path_buf(),
        _file: file,
    }))
}

fn is_stale(lock_path: &Path, stale_after_secs: u64) -> bool {
    let Ok(meta) = fs::metadata(lock_path) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age.as_secs() >= stale_after_secs)
}
