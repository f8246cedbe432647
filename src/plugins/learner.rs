//! Learning: refresh a profile from a project rescan, record observed
//! directives, and mine directive lines from the project's working notes.

use crate::core::dna;
use crate::core::error::TeamError;
use crate::core::fsio;
use crate::core::output;
use crate::core::store::Store;
use crate::plugins::injector::{self, PROJECT_DNA_FILE, PROJECT_RULES_FILE};
use crate::plugins::registry::{self, DnaUpdate};
use crate::plugins::rules::{self, AddOutcome, GLOBAL_AGENT};
use crate::plugins::scanner::{HeuristicScanner, ProjectScanner};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Directive lines must be observed this many times before they become rules.
pub const MIN_ARTIFACT_OCCURRENCES: usize = 2;
const MIN_DIRECTIVE_CHARS: usize = 11;
const MAX_DIRECTIVE_CHARS: usize = 99;

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[-*]\s+(always|never|must|should|prefer|use)\s").expect("directive pattern")
});
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*]\s+").expect("bullet pattern"));

#[derive(Debug, Clone, Serialize)]
pub struct LearnReport {
    pub team: String,
    pub source: String,
    #[serde(flatten)]
    pub dna: DnaUpdate,
    pub project_dna_refreshed: bool,
}

/// Rescan `project` into `team`: facts, `scanned_from`, DNA (with history),
/// and the project's `team_dna.txt` when one was injected earlier.
pub fn learn_from_project(
    store: &Store,
    team: &str,
    project: &Path,
    scanner: &dyn ProjectScanner,
) -> Result<LearnReport, TeamError> {
    let brain = injector::brain_dir(store, project)?;
    let facts = scanner.scan(project)?;
    let source = project
        .canonicalize()
        .unwrap_or_else(|_| project.to_path_buf())
        .display()
        .to_string();

    store.broker().with_team(team, "team.learn", |paths| {
        let mut profile = registry::load_profile(paths)?;
        profile.apply_scan(facts, &source);
        registry::save_profile(paths, &profile)?;

        let update = registry::write_dna(paths, &dna::encode(&profile.facts()))?;
        let project_dna = brain.join(PROJECT_DNA_FILE);
        let refresh = update.changed && project_dna.exists();
        if refresh {
            fsio::write_atomic(&project_dna, format!("{}\n", update.dna).as_bytes())?;
        }
        tracing::info!(team, changed = update.changed, "profile relearned");
        Ok(LearnReport {
            team: team.to_string(),
            source: source.clone(),
            dna: update,
            project_dna_refreshed: refresh,
        })
    })
}

/// Directive-looking bullet lines in `markdown`, bullet marker stripped.
pub fn extract_directives(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .map(str::trim)
        .filter(|line| DIRECTIVE_RE.is_match(line))
        .map(|line| BULLET_RE.replace(line, "").trim().to_string())
        .filter(|d| (MIN_DIRECTIVE_CHARS..=MAX_DIRECTIVE_CHARS).contains(&d.chars().count()))
        .collect()
}

/// Directives seen at least [`MIN_ARTIFACT_OCCURRENCES`] times across the
/// top-level `*.md` notes in `brain`. Injected rule files are ignored so a
/// profile never re-learns its own output.
pub fn recurring_directives(brain: &Path) -> Result<Vec<(String, usize)>, TeamError> {
    if !brain.is_dir() {
        return Ok(Vec::new());
    }
    let mut notes: Vec<_> = fs::read_dir(brain)
        .map_err(TeamError::IoError)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "md"))
        .filter(|p| p.file_name().is_some_and(|n| n != PROJECT_RULES_FILE))
        .collect();
    notes.sort();

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for note in notes {
        let Ok(raw) = fs::read_to_string(&note) else {
            tracing::debug!(path = %note.display(), "skipping unreadable note");
            continue;
        };
        for directive in extract_directives(&raw) {
            *counts.entry(directive).or_insert(0) += 1;
        }
    }
    let mut recurring: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, n)| *n >= MIN_ARTIFACT_OCCURRENCES)
        .collect();
    recurring.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(recurring)
}

/// Add every recurring directive from the project's notes as a rule for `agent`.
pub fn learn_from_artifacts(
    store: &Store,
    team: &str,
    project: &Path,
    agent: &str,
) -> Result<Vec<(String, AddOutcome)>, TeamError> {
    let brain = injector::brain_dir(store, project)?;
    let mut out = Vec::new();
    for (directive, _) in recurring_directives(&brain)? {
        let outcome = rules::add_rule(store, team, &directive, agent)?;
        out.push((directive, outcome));
    }
    Ok(out)
}

#[derive(clap::Args, Debug)]
pub struct LearnCli {
    /// Team to update (defaults to the active team)
    #[clap(long)]
    pub team: Option<String>,
    /// Project to learn from
    #[clap(long, default_value = ".")]
    pub project: PathBuf,
    /// Record one observed directive as a rule
    #[clap(long)]
    pub directive: Option<String>,
    /// Agent tag for directives
    #[clap(long, default_value = GLOBAL_AGENT)]
    pub agent: String,
    /// Mine recurring directives from the project's notes
    #[clap(long)]
    pub artifacts: bool,
    /// Rescan the project even when --directive or --artifacts is given
    #[clap(long)]
    pub scan: bool,
}

pub fn run_learn_cli(store: &Store, cli: LearnCli) -> Result<(), TeamError> {
    let team = registry::resolve_team(&store.root, cli.team.as_deref())?;
    let rescan = cli.scan || (cli.directive.is_none() && !cli.artifacts);

    if rescan {
        let report = learn_from_project(store, &team, &cli.project, &HeuristicScanner)?;
        if report.dna.changed {
            println!("✓ DNA updated: {}", output::compact_line(&report.dna.dna, 80));
            if let Some(archived) = &report.dna.archived {
                println!("  Previous DNA archived to {}", archived.display());
            }
        } else {
            println!("DNA unchanged: {}", output::compact_line(&report.dna.dna, 60));
        }
    }

    if cli.artifacts {
        let learned = learn_from_artifacts(store, &team, &cli.project, &cli.agent)?;
        if learned.is_empty() {
            println!("No recurring directives found in project notes.");
        }
        for (directive, outcome) in learned {
            println!("✓ #{} {}", outcome.id(), output::compact_line(&directive, 60));
        }
    }

    if let Some(text) = cli.directive {
        let outcome = rules::add_rule(store, &team, &text, &cli.agent)?;
        match outcome {
            AddOutcome::Inserted { id } => println!("✓ Rule #{} learned", id),
            AddOutcome::Folded { id, frequency } => {
                println!("✓ Rule #{} reinforced (frequency {})", id, frequency)
            }
        }
    }
    Ok(())
}
