//! Journal store: titled lessons with body files, merged by title similarity.
//!
//! A merge asks TF-IDF for the closest existing titles, then accepts a
//! candidate only when the literal token overlap clears the threshold.
//! Matches bump `frequency`; everything else is appended with its body.

use crate::core::error::TeamError;
use crate::core::fsio;
use crate::core::similarity::title_similarity;
use crate::core::store::{TeamPaths, is_plain_file_name};
use crate::core::tfidf::{self, Searchable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

fn default_frequency() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub file: String,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    /// Fields written by other tools, carried through merges untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JournalEntry {
    pub fn new(title: &str, file: &str) -> Self {
        Self {
            title: title.to_string(),
            tags: BTreeSet::new(),
            file: file.to_string(),
            frequency: 1,
            extra: serde_json::Map::new(),
        }
    }
}

impl Searchable for JournalEntry {
    fn search_text(&self) -> &str {
        &self.title
    }

    fn search_tags(&self) -> Vec<&str> {
        self.tags.iter().map(String::as_str).collect()
    }
}

/// A journal on disk: `index.json` plus an `entries/` directory of bodies.
#[derive(Debug, Clone)]
pub struct JournalDir {
    pub dir: PathBuf,
}

impl JournalDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn of_team(paths: &TeamPaths) -> Self {
        Self::new(paths.journal_dir())
    }

    pub fn index(&self) -> PathBuf {
        self.dir.join("index.json")
    }

    pub fn entries(&self) -> PathBuf {
        self.dir.join("entries")
    }

    /// Best-effort read of the index.
    pub fn load(&self) -> Vec<JournalEntry> {
        fsio::read_json_or_default(&self.index())
    }

    pub fn save(&self, entries: &[JournalEntry]) -> Result<(), TeamError> {
        fsio::write_json_atomic(&self.index(), entries)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub entries: Vec<JournalEntry>,
    /// Indices into the source slice of entries that were appended.
    pub appended: Vec<usize>,
    /// Where each appended entry landed in `entries`, parallel to `appended`.
    pub appended_at: Vec<usize>,
    pub folded: usize,
}

impl MergeOutcome {
    pub fn new_count(&self) -> usize {
        self.appended.len()
    }
}

/// Index of the target entry `entry` duplicates, if any.
fn find_duplicate(entry: &JournalEntry, target: &[JournalEntry], threshold: f64) -> Option<usize> {
    if let Some(idx) = target.iter().position(|t| t.title == entry.title) {
        return Some(idx);
    }
    tfidf::rank(&entry.title, target)
        .into_iter()
        .find(|r| title_similarity(&entry.title, &target[r.index].title) > threshold)
        .map(|r| r.index)
}

/// Merge `source` into `target`. Pure: bodies are placed by [`merge_dirs`].
pub fn merge(source: &[JournalEntry], target: Vec<JournalEntry>, threshold: f64) -> MergeOutcome {
    let mut out = MergeOutcome {
        entries: target,
        ..Default::default()
    };
    for (idx, entry) in source.iter().enumerate() {
        match find_duplicate(entry, &out.entries, threshold) {
            Some(hit) => {
                let existing = &mut out.entries[hit];
                existing.frequency = existing.frequency.saturating_add(1);
                out.folded += 1;
            }
            None => {
                out.appended_at.push(out.entries.len());
                out.entries.push(entry.clone());
                out.appended.push(idx);
            }
        }
    }
    out
}

/// Copy the body files of `entries`, replacing same-named files in `target`.
/// Unsafe or missing references are skipped with a warning; returns how many
/// were copied.
pub fn copy_bodies(
    source: &JournalDir,
    target: &JournalDir,
    entries: &[&JournalEntry],
) -> Result<usize, TeamError> {
    let mut copied = 0;
    for entry in entries {
        if entry.file.is_empty() {
            continue;
        }
        if !is_plain_file_name(&entry.file) {
            tracing::warn!(file = %entry.file, title = %entry.title, "skipping unsafe journal file reference");
            continue;
        }
        let src = source.entries().join(&entry.file);
        if !src.is_file() {
            tracing::warn!(path = %src.display(), "journal body missing, index entry kept");
            continue;
        }
        fsio::copy_file(&src, &target.entries().join(&entry.file))?;
        copied += 1;
    }
    Ok(copied)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JournalMergeReport {
    pub new_entries: usize,
    pub folded: usize,
    pub bodies_copied: usize,
}

/// Merge the journal in `source` into `target` and persist the result.
/// `source` is only read, and no existing target body is overwritten.
pub fn merge_dirs(
    source: &JournalDir,
    target: &JournalDir,
    threshold: f64,
) -> Result<JournalMergeReport, TeamError> {
    let incoming = source.load();
    let mut outcome = merge(&incoming, target.load(), threshold);
    let mut bodies_copied = 0;
    for &pos in &outcome.appended_at {
        if place_body(source, target, &mut outcome.entries[pos])? {
            bodies_copied += 1;
        }
    }
    if !incoming.is_empty() {
        target.save(&outcome.entries)?;
    }
    Ok(JournalMergeReport {
        new_entries: outcome.new_count(),
        folded: outcome.folded,
        bodies_copied,
    })
}

/// Copy `entry`'s body into `target`. A different body already holding the
/// name is kept, and `entry.file` is renamed to the next free `stem-N.ext`.
/// Returns whether a file was written.
fn place_body(
    source: &JournalDir,
    target: &JournalDir,
    entry: &mut JournalEntry,
) -> Result<bool, TeamError> {
    if entry.file.is_empty() {
        return Ok(false);
    }
    if !is_plain_file_name(&entry.file) {
        tracing::warn!(file = %entry.file, title = %entry.title, "skipping unsafe journal file reference");
        return Ok(false);
    }
    let src = source.entries().join(&entry.file);
    let Ok(bytes) = fs::read(&src) else {
        tracing::warn!(path = %src.display(), "journal body missing, index entry kept");
        return Ok(false);
    };
    let dest = target.entries().join(&entry.file);
    match fs::read(&dest) {
        Ok(existing) if existing == bytes => return Ok(false),
        Ok(_) => {
            let free = free_body_name(target, &entry.file)?;
            tracing::info!(from = %entry.file, to = %free, "journal body name taken, renaming");
            entry.file = free;
        }
        Err(_) => {}
    }
    fsio::write_atomic(&target.entries().join(&entry.file), &bytes)?;
    Ok(true)
}

fn free_body_name(target: &JournalDir, file: &str) -> Result<String, TeamError> {
    let path = Path::new(file);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    for n in 1..10_000u32 {
        let candidate = format!("{}-{}{}", stem, n, ext);
        if !target.entries().join(&candidate).exists() {
            return Ok(candidate);
        }
    }
    Err(TeamError::Conflict(format!(
        "no free journal body name for '{}' in {}",
        file,
        target.entries().display()
    )))
}

/// Copy a whole journal (index and every body) into `dest`.
pub fn copy_journal(source: &JournalDir, dest: &Path) -> Result<usize, TeamError> {
    let entries = source.load();
    let target = JournalDir::new(dest);
    let refs: Vec<&JournalEntry> = entries.iter().collect();
    let copied = copy_bodies(source, &target, &refs)?;
    target.save(&entries)?;
    Ok(copied)
}
