//! On-disk layout for team profiles.
//!
//! Everything lives under one per-user root:
//!
//! ```text
//! <root>/teams/<name>/
//!   team.json                 profile metadata + scanned facts
//!   hot/team.dna              current DNA string
//!   hot/top_rules.md          promoted rules digest (derived)
//!   warm/rules.json           rule store
//!   warm/journal/index.json   journal index
//!   warm/journal/entries/*    journal bodies
//!   cold/history/dna_<ts>.txt archived DNA strings (write-once)
//!   cold/archive/*            reserved for long-term archival
//! <root>/active_team          name of the active profile
//! <root>/config.toml          optional thresholds and paths
//! <root>/events.jsonl         audit trail of mutations
//! <root>/locks/<name>.lock    per-profile advisory locks
//! ```

use crate::core::broker::ProfileBroker;
use crate::core::config::{self, TeamConfig};
use crate::core::error::TeamError;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const ROOT_ENV_VAR: &str = "TEAMKIT_HOME";
pub const DEFAULT_ROOT_DIR: &str = ".teamkit";

static TEAM_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("team name pattern"));

/// Handle to the root that holds every team profile.
#[derive(Debug, Clone)]
pub struct TeamRoot {
    pub root: PathBuf,
}

impl TeamRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root: explicit override, then `TEAMKIT_HOME`, then `~/.teamkit`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, TeamError> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }
        if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or_else(|| {
            TeamError::ConfigError(format!(
                "cannot determine home directory; set {}",
                ROOT_ENV_VAR
            ))
        })?;
        Ok(Self::new(home.join(DEFAULT_ROOT_DIR)))
    }

    pub fn teams_dir(&self) -> PathBuf {
        self.root.join("teams")
    }

    pub fn active_file(&self) -> PathBuf {
        self.root.join("active_team")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn events_file(&self) -> PathBuf {
        self.root.join("events.jsonl")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// Layout for `name`. Fails on names that are not filesystem-safe.
    pub fn team(&self, name: &str) -> Result<TeamPaths, TeamError> {
        validate_team_name(name)?;
        Ok(TeamPaths::new(self.teams_dir().join(name)))
    }

    /// Layout for `name`, failing with `NotFound` when the profile does not exist.
    pub fn existing_team(&self, name: &str) -> Result<TeamPaths, TeamError> {
        let paths = self.team(name)?;
        if !paths.dir.is_dir() {
            return Err(TeamError::NotFound(format!("team '{}'", name)));
        }
        Ok(paths)
    }
}

/// A resolved root plus its configuration. Every operation receives one.
#[derive(Debug, Clone)]
pub struct Store {
    pub root: TeamRoot,
    pub config: TeamConfig,
}

impl Store {
    /// Open `root`, loading `config.toml` when present.
    pub fn open(root: TeamRoot) -> Result<Self, TeamError> {
        let config = config::load_config(&root)?;
        Ok(Self { root, config })
    }

    pub fn with_config(root: TeamRoot, config: TeamConfig) -> Self {
        Self { root, config }
    }

    pub fn broker(&self) -> ProfileBroker {
        ProfileBroker::new(&self.root, &self.config.lock)
    }
}

/// Paths inside a single profile directory.
#[derive(Debug, Clone)]
pub struct TeamPaths {
    pub dir: PathBuf,
}

impl TeamPaths {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn team_json(&self) -> PathBuf {
        self.dir.join("team.json")
    }

    pub fn hot_dir(&self) -> PathBuf {
        self.dir.join("hot")
    }

    pub fn dna_file(&self) -> PathBuf {
        self.hot_dir().join("team.dna")
    }

    pub fn top_rules_file(&self) -> PathBuf {
        self.hot_dir().join("top_rules.md")
    }

    pub fn warm_dir(&self) -> PathBuf {
        self.dir.join("warm")
    }

    pub fn rules_file(&self) -> PathBuf {
        self.warm_dir().join("rules.json")
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.warm_dir().join("journal")
    }

    pub fn journal_index(&self) -> PathBuf {
        self.journal_dir().join("index.json")
    }

    pub fn journal_entries(&self) -> PathBuf {
        self.journal_dir().join("entries")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.dir.join("cold").join("history")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.dir.join("cold").join("archive")
    }

    /// Create the hot/warm/cold directory skeleton.
    pub fn ensure_structure(&self) -> Result<(), TeamError> {
        for dir in [
            self.hot_dir(),
            self.warm_dir(),
            self.journal_entries(),
            self.archive_dir(),
            self.history_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(TeamError::IoError)?;
        }
        Ok(())
    }
}

pub fn validate_team_name(name: &str) -> Result<(), TeamError> {
    if TEAM_NAME_RE.is_match(name) && name != "." && name != ".." {
        Ok(())
    } else {
        Err(TeamError::ValidationError(format!(
            "invalid team name '{}': use letters, digits, '.', '_' or '-'",
            name
        )))
    }
}

/// True when `name` is a single plain path component (no separators, not `.`/`..`).
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|f| f == name)
}
