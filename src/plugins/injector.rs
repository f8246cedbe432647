//! Moves profile data into a project's working area and journal lessons back.
//!
//! Project-side layout under `<project>/<brain_dir>`:
//!
//! ```text
//! team_dna.txt  team_rules.md  team_rules/<agent>.md  team_meta.json
//! journal/index.json  journal/entries/*
//! ```

use crate::core::error::TeamError;
use crate::core::fsio;
use crate::core::store::{Store, is_plain_file_name};
use crate::core::time;
use crate::plugins::journal::{self, JournalDir, JournalMergeReport};
use crate::plugins::registry;
use crate::plugins::rules;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PROJECT_DNA_FILE: &str = "team_dna.txt";
pub const PROJECT_RULES_FILE: &str = "team_rules.md";
pub const PROJECT_AGENT_RULES_DIR: &str = "team_rules";
pub const PROJECT_META_FILE: &str = "team_meta.json";
pub const PROJECT_JOURNAL_DIR: &str = "journal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectMeta {
    pub team_name: String,
    pub injected_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InjectReport {
    pub team: String,
    pub brain_dir: PathBuf,
    pub dna: String,
    pub agents: Vec<String>,
    pub journal_entries: usize,
}

/// `<project>/<brain_dir>` for `project`, failing when the project is missing.
pub fn brain_dir(store: &Store, project: &Path) -> Result<PathBuf, TeamError> {
    if !project.is_dir() {
        return Err(TeamError::NotFound(format!(
            "project path {}",
            project.display()
        )));
    }
    Ok(project.join(&store.config.project.brain_dir))
}

/// Copy the hot tier, per-agent rule files and the journal of `team` into
/// `project`. The profile is only read.
pub fn inject(store: &Store, team: &str, project: &Path) -> Result<InjectReport, TeamError> {
    let brain = brain_dir(store, project)?;
    let min_frequency = store.config.rules.promotion_threshold;

    store.broker().record("team.inject", Some(team), || {
        let paths = store.root.existing_team(team)?;

        let dna = registry::read_dna(&paths)?;
        fsio::write_atomic(&brain.join(PROJECT_DNA_FILE), format!("{}\n", dna).as_bytes())?;

        let book = rules::load_rules(&paths);
        let digest = match fsio::read_trimmed(&paths.top_rules_file())? {
            Some(existing) if !existing.is_empty() => format!("{}\n", existing),
            _ => rules::render_top_rules(&book, min_frequency),
        };
        fsio::write_atomic(&brain.join(PROJECT_RULES_FILE), digest.as_bytes())?;

        let mut agents = Vec::new();
        for (agent, texts) in book.agent_groups() {
            if !is_plain_file_name(&agent) {
                tracing::warn!(agent = %agent, "skipping rules for unsafe agent tag");
                continue;
            }
            let file = brain
                .join(PROJECT_AGENT_RULES_DIR)
                .join(format!("{}.md", agent));
            fsio::write_atomic(&file, rules::render_agent_file(&agent, &texts).as_bytes())?;
            agents.push(agent);
        }

        let team_journal = JournalDir::of_team(&paths);
        let journal_entries = team_journal.load().len();
        if journal_entries > 0 {
            journal::copy_journal(&team_journal, &brain.join(PROJECT_JOURNAL_DIR))?;
        }

        let meta = InjectMeta {
            team_name: team.to_string(),
            injected_at: time::now_iso(),
        };
        fsio::write_json_atomic(&brain.join(PROJECT_META_FILE), &meta)?;

        tracing::info!(team, brain = %brain.display(), agents = agents.len(), "profile injected");
        Ok(InjectReport {
            team: team.to_string(),
            brain_dir: brain.clone(),
            dna,
            agents,
            journal_entries,
        })
    })
}

/// Merge the project's journal into the profile. Only the profile changes.
pub fn save_back(store: &Store, team: &str, project: &Path) -> Result<JournalMergeReport, TeamError> {
    let brain = brain_dir(store, project)?;
    let threshold = store.config.journal.dedup_threshold;

    store.broker().with_team(team, "team.save_back", |paths| {
        let project_journal = JournalDir::new(brain.join(PROJECT_JOURNAL_DIR));
        if !project_journal.index().exists() {
            tracing::info!(project = %project.display(), "no project journal to save back");
            return Ok(JournalMergeReport::default());
        }
        journal::merge_dirs(&project_journal, &JournalDir::of_team(paths), threshold)
    })
}
