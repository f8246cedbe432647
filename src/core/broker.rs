use crate::core::config::LockConfig;
use crate::core::error::TeamError;
use crate::core::lock::ProfileLock;
use crate::core::store::{TeamPaths, TeamRoot};
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};

/// The profile broker is the "thin waist" for profile mutation.
/// It serializes writers per profile with an advisory lock and records every
/// operation in `<root>/events.jsonl`.
pub struct ProfileBroker {
    root: TeamRoot,
    lock: LockConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TeamEvent {
    pub ts: String,
    pub event_id: String,
    pub op: String,
    pub team: Option<String>,
    pub status: String,
    pub detail: serde_json::Value,
}

impl ProfileBroker {
    pub fn new(root: &TeamRoot, lock: &LockConfig) -> Self {
        Self {
            root: root.clone(),
            lock: lock.clone(),
        }
    }

    /// Run `f` against an existing profile while holding its lock. Existence
    /// is checked under the lock, so a profile deleted while we waited is
    /// reported as missing instead of being recreated piecemeal.
    pub fn with_team<F, R>(&self, team: &str, op: &str, f: F) -> Result<R, TeamError>
    where
        F: FnOnce(&TeamPaths) -> Result<R, TeamError>,
    {
        self.record(op, Some(team), || {
            self.root.team(team)?;
            let _lock = ProfileLock::acquire(&self.root, team, &self.lock)?;
            let paths = self.root.existing_team(team)?;
            f(&paths)
        })
    }

    /// Run `f` holding the lock for `team`, whether or not the profile exists yet.
    /// `f` must do its own existence checks; they run under the lock.
    pub fn with_lock<F, R>(&self, team: &str, op: &str, f: F) -> Result<R, TeamError>
    where
        F: FnOnce(&TeamPaths) -> Result<R, TeamError>,
    {
        self.record(op, Some(team), || {
            let paths = self.root.team(team)?;
            let _lock = ProfileLock::acquire(&self.root, team, &self.lock)?;
            f(&paths)
        })
    }

    /// Run `f` and log its outcome. Logging failures never mask the result.
    pub fn record<F, R>(&self, op: &str, team: Option<&str>, f: F) -> Result<R, TeamError>
    where
        F: FnOnce() -> Result<R, TeamError>,
    {
        let result = f();
        let (status, detail) = match &result {
            Ok(_) => ("success", serde_json::Value::Null),
            Err(e) => ("error", serde_json::json!({ "error": e.to_string() })),
        };
        if let Err(e) = self.log_event(op, team, status, detail) {
            tracing::warn!(op, error = %e, "failed to append audit event");
        }
        result
    }

    fn log_event(
        &self,
        op: &str,
        team: Option<&str>,
        status: &str,
        detail: serde_json::Value,
    ) -> Result<(), TeamError> {
        fs::create_dir_all(&self.root.root).map_err(TeamError::IoError)?;
        let ev = TeamEvent {
            ts: time::now_iso(),
            event_id: time::new_event_id(),
            op: op.to_string(),
            team: team.map(|s| s.to_string()),
            status: status.to_string(),
            detail,
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.events_file())
            .map_err(TeamError::IoError)?;
        writeln!(f, "{}", serde_json::to_string(&ev)?).map_err(TeamError::IoError)?;
        Ok(())
    }
}

/// Most recent `limit` audit events, oldest first. Unparseable lines are skipped.
pub fn recent_events(root: &TeamRoot, limit: usize) -> Result<Vec<TeamEvent>, TeamError> {
    let path = root.events_file();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(&path).map_err(TeamError::IoError)?;
    let events: Vec<TeamEvent> = BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect();
    let skip = events.len().saturating_sub(limit);
    Ok(events.into_iter().skip(skip).collect())
}
