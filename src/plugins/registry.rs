//! Team registry: create, list, show and delete profiles, plus the persisted
//! active-profile pointer and the DNA history discipline.

use crate::core::dna;
use crate::core::error::TeamError;
use crate::core::fsio;
use crate::core::profile::TeamProfile;
use crate::core::store::{Store, TeamPaths, TeamRoot, validate_team_name};
use crate::core::time;
use crate::plugins::journal::{JournalDir, JournalEntry};
use crate::plugins::rules::{self, Rule, RuleBook};
use crate::plugins::scanner::ProjectScanner;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

// --- active pointer ---

pub fn active_team(root: &TeamRoot) -> Result<Option<String>, TeamError> {
    Ok(fsio::read_trimmed(&root.active_file())?.filter(|name| !name.is_empty()))
}

pub fn set_active(root: &TeamRoot, name: &str) -> Result<(), TeamError> {
    validate_team_name(name)?;
    fsio::write_atomic(&root.active_file(), format!("{}\n", name).as_bytes())
}

pub fn clear_active(root: &TeamRoot) -> Result<(), TeamError> {
    match fs::remove_file(root.active_file()) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(TeamError::IoError(e)),
        _ => Ok(()),
    }
}

/// The explicitly named team, else the active one.
pub fn resolve_team(root: &TeamRoot, explicit: Option<&str>) -> Result<String, TeamError> {
    if let Some(name) = explicit {
        return Ok(name.to_string());
    }
    active_team(root)?.ok_or_else(|| {
        TeamError::NotFound("active team (pass --team or run `create`/`inject` first)".to_string())
    })
}

// --- DNA ---

#[derive(Debug, Clone, Default, Serialize)]
pub struct DnaUpdate {
    pub dna: String,
    pub changed: bool,
    pub archived: Option<PathBuf>,
}

/// Replace the current DNA, archiving the previous value to
/// `cold/history/dna_<stamp>.txt` first. History files are never overwritten.
pub fn write_dna(paths: &TeamPaths, dna: &str) -> Result<DnaUpdate, TeamError> {
    let previous = fsio::read_trimmed(&paths.dna_file())?;
    if previous.as_deref() == Some(dna) {
        return Ok(DnaUpdate {
            dna: dna.to_string(),
            changed: false,
            archived: None,
        });
    }
    let archived = match previous.filter(|p| !p.is_empty()) {
        Some(old) => Some(archive_dna(paths, &old)?),
        None => None,
    };
    fsio::write_atomic(&paths.dna_file(), dna.as_bytes())?;
    Ok(DnaUpdate {
        dna: dna.to_string(),
        changed: true,
        archived,
    })
}

fn archive_dna(paths: &TeamPaths, old: &str) -> Result<PathBuf, TeamError> {
    let dir = paths.history_dir();
    fs::create_dir_all(&dir).map_err(TeamError::IoError)?;
    let stamp = time::history_stamp();
    for attempt in 0..1000u32 {
        let name = if attempt == 0 {
            format!("dna_{}.txt", stamp)
        } else {
            format!("dna_{}_{}.txt", stamp, attempt)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                f.write_all(old.as_bytes()).map_err(TeamError::IoError)?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(TeamError::IoError(e)),
        }
    }
    Err(TeamError::Conflict(format!(
        "no free DNA history slot for {} in {}",
        stamp,
        dir.display()
    )))
}

pub fn read_dna(paths: &TeamPaths) -> Result<String, TeamError> {
    Ok(fsio::read_trimmed(&paths.dna_file())?.unwrap_or_default())
}

pub fn load_profile(paths: &TeamPaths) -> Result<TeamProfile, TeamError> {
    fsio::read_json_strict(&paths.team_json())
}

pub fn save_profile(paths: &TeamPaths, profile: &TeamProfile) -> Result<(), TeamError> {
    fsio::write_json_atomic(&paths.team_json(), profile)
}

// --- create / delete ---

fn source_label(project: &Path) -> String {
    project
        .canonicalize()
        .unwrap_or_else(|_| project.to_path_buf())
        .display()
        .to_string()
}

fn populate(
    staged: &TeamPaths,
    name: &str,
    scan: Option<&Path>,
    scanner: &dyn ProjectScanner,
    min_frequency: u32,
) -> Result<TeamProfile, TeamError> {
    staged.ensure_structure()?;
    let mut profile = TeamProfile::new(name, time::now_iso());
    if let Some(project) = scan {
        let facts = scanner.scan(project)?;
        profile.apply_scan(facts, &source_label(project));
    }
    save_profile(staged, &profile)?;
    fsio::write_atomic(&staged.dna_file(), dna::encode(&profile.facts()).as_bytes())?;

    let mut book = RuleBook::default();
    rules::save_rules(staged, &mut book)?;
    rules::write_top_rules(staged, &book, min_frequency)?;
    JournalDir::of_team(staged).save(&[])?;
    Ok(profile)
}

/// Create `name`, optionally scanning `scan` first, and make it active.
/// The profile is assembled in a staging directory and renamed into place,
/// so a failure leaves nothing behind.
pub fn create_team(
    store: &Store,
    name: &str,
    scan: Option<&Path>,
    scanner: &dyn ProjectScanner,
) -> Result<TeamProfile, TeamError> {
    let min_frequency = store.config.rules.promotion_threshold;
    let profile = store.broker().with_lock(name, "team.create", |paths| {
        if paths.dir.exists() {
            return Err(TeamError::Conflict(format!("team '{}' already exists", name)));
        }
        if let Some(project) = scan
            && !project.is_dir()
        {
            return Err(TeamError::NotFound(format!("project path {}", project.display())));
        }

        let staging_dir = store
            .root
            .teams_dir()
            .join(format!(".staging-{}-{}", name, time::new_event_id()));
        let staged = TeamPaths::new(staging_dir.clone());
        let built = populate(&staged, name, scan, scanner, min_frequency)
            .and_then(|profile| {
                fs::rename(&staging_dir, &paths.dir).map_err(TeamError::IoError)?;
                Ok(profile)
            });
        if built.is_err() {
            let _ = fs::remove_dir_all(&staging_dir);
        }
        built
    })?;
    set_active(&store.root, name)?;
    tracing::info!(team = name, "team created");
    Ok(profile)
}

/// Remove `name` entirely. Clears the active pointer if it pointed here.
pub fn delete_team(store: &Store, name: &str) -> Result<(), TeamError> {
    store.broker().with_team(name, "team.delete", |paths| {
        fs::remove_dir_all(&paths.dir).map_err(TeamError::IoError)
    })?;
    if active_team(&store.root)?.as_deref() == Some(name) {
        clear_active(&store.root)?;
    }
    Ok(())
}

// --- reporting ---

#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    pub name: String,
    pub active: bool,
    pub created_at: String,
    pub dna: String,
    pub rules: usize,
    pub journal_entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamDetails {
    pub active: bool,
    pub profile: TeamProfile,
    pub dna: String,
    pub dna_tokens: BTreeMap<String, String>,
    pub rules: Vec<Rule>,
    pub top_rules: Vec<Rule>,
    pub journal: Vec<JournalEntry>,
}

/// Every profile under the root, sorted by name.
pub fn list_teams(root: &TeamRoot) -> Result<Vec<TeamSummary>, TeamError> {
    let teams_dir = root.teams_dir();
    if !teams_dir.is_dir() {
        return Ok(Vec::new());
    }
    let active = active_team(root)?;
    let mut names: Vec<String> = fs::read_dir(&teams_dir)
        .map_err(TeamError::IoError)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|n| validate_team_name(n).is_ok())
        .collect();
    names.sort();

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let paths = root.team(&name)?;
        let created_at = match load_profile(&paths) {
            Ok(p) => p.created_at,
            Err(e) => {
                tracing::warn!(team = %name, error = %e, "unreadable team.json");
                String::new()
            }
        };
        out.push(TeamSummary {
            active: active.as_deref() == Some(name.as_str()),
            created_at,
            dna: read_dna(&paths)?,
            rules: rules::load_rules(&paths).rules.len(),
            journal_entries: JournalDir::of_team(&paths).load().len(),
            name,
        });
    }
    Ok(out)
}

pub fn show_team(store: &Store, name: &str) -> Result<TeamDetails, TeamError> {
    let paths = store.root.existing_team(name)?;
    let profile = load_profile(&paths)?;
    let dna = read_dna(&paths)?;
    let book = rules::load_rules(&paths);
    let top_rules = book
        .promoted(store.config.rules.promotion_threshold)
        .into_iter()
        .cloned()
        .collect();
    Ok(TeamDetails {
        active: active_team(&store.root)?.as_deref() == Some(name),
        dna_tokens: dna::decode(&dna),
        dna,
        profile,
        rules: book.rules.clone(),
        top_rules,
        journal: JournalDir::of_team(&paths).load(),
    })
}
