//! File helpers: staged writes and best-effort JSON reads.

use crate::core::error::TeamError;
use crate::core::time;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Write `contents` to a sibling temp file, then rename over `path`.
/// Readers see either the old file or the new one, never a truncated one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TeamError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(TeamError::IoError)?;
    }
    let tmp = staging_path(path);
    if let Err(e) = fs::write(&tmp, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(TeamError::IoError(e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        TeamError::IoError(e)
    })
}

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), TeamError> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    write_atomic(path, body.as_bytes())
}

/// Read JSON, treating a missing or unparseable file as `T::default()`.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable file, using empty default");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed JSON, using empty default");
            T::default()
        }
    }
}

/// Read JSON that must exist and parse.
pub fn read_json_strict<T: DeserializeOwned>(path: &Path) -> Result<T, TeamError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TeamError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(TeamError::IoError(e)),
    };
    serde_json::from_str(&raw).map_err(|e| TeamError::MalformedData {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Trimmed text content, or `None` when the file is missing.
pub fn read_trimmed(path: &Path) -> Result<Option<String>, TeamError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TeamError::IoError(e)),
    }
}

/// Copy `src` to `dst` through a staged write.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), TeamError> {
    let bytes = fs::read(src).map_err(TeamError::IoError)?;
    write_atomic(dst, &bytes)
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp-{}", name, time::new_event_id()))
}
