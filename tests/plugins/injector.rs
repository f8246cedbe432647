use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use teamkit::core::config::TeamConfig;
use teamkit::core::store::{Store, TeamRoot};
use teamkit::plugins::injector::{InjectMeta, inject, save_back};
use teamkit::plugins::journal::{JournalDir, JournalEntry};
use teamkit::plugins::registry;
use teamkit::plugins::rules::{self, GLOBAL_AGENT};
use teamkit::plugins::scanner::HeuristicScanner;
use tempfile::tempdir;

fn setup(tmp: &Path) -> (Store, PathBuf) {
    let store = Store::with_config(TeamRoot::new(tmp.join("root")), TeamConfig::default());
    registry::create_team(&store, "acme", None, &HeuristicScanner).unwrap();
    let project = tmp.join("project");
    fs::create_dir_all(&project).unwrap();
    (store, project)
}

fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.insert(path.clone(), fs::read(&path).unwrap());
            }
        }
    }
    out
}

fn add_team_journal(store: &Store, entries: &[(&str, &str)]) {
    let paths = store.root.team("acme").unwrap();
    let journal = JournalDir::of_team(&paths);
    let list: Vec<JournalEntry> = entries
        .iter()
        .map(|(title, file)| {
            fs::write(journal.entries().join(file), format!("# {}\n", title)).unwrap();
            JournalEntry::new(title, file)
        })
        .collect();
    journal.save(&list).unwrap();
}

#[test]
fn test_inject_materializes_profile() {
    let tmp = tempdir().unwrap();
    let (store, project) = setup(tmp.path());
    rules::add_rule(&store, "acme", "write docs in english", GLOBAL_AGENT).unwrap();
    rules::add_rule(&store, "acme", "prefer server components", "frontend-dev").unwrap();
    rules::add_rule(&store, "acme", "validate request bodies", "backend-dev").unwrap();
    add_team_journal(&store, &[("Fix hydration mismatch", "hydration.md")]);

    let report = inject(&store, "acme", &project).unwrap();
    assert_eq!(report.agents, vec!["backend-dev", "frontend-dev", "global"]);
    assert_eq!(report.journal_entries, 1);

    let brain = project.join(".agent/brain");
    assert!(brain.join("team_dna.txt").exists());
    assert!(brain.join("team_rules.md").exists());

    let frontend = fs::read_to_string(brain.join("team_rules/frontend-dev.md")).unwrap();
    assert!(frontend.starts_with("# Team Rules for frontend-dev"));
    let docs = frontend.find("write docs in english").unwrap();
    let server = frontend.find("prefer server components").unwrap();
    assert!(docs < server);
    assert!(!frontend.contains("validate request bodies"));

    let global = fs::read_to_string(brain.join("team_rules/global.md")).unwrap();
    assert_eq!(global.matches("write docs in english").count(), 1);

    let meta: InjectMeta =
        serde_json::from_str(&fs::read_to_string(brain.join("team_meta.json")).unwrap()).unwrap();
    assert_eq!(meta.team_name, "acme");
    assert!(!meta.injected_at.is_empty());

    assert!(brain.join("journal/index.json").exists());
    assert!(brain.join("journal/entries/hydration.md").exists());
}

#[test]
fn test_inject_never_mutates_profile() {
    let tmp = tempdir().unwrap();
    let (store, project) = setup(tmp.path());
    rules::add_rule(&store, "acme", "write docs in english", GLOBAL_AGENT).unwrap();
    let team_dir = store.root.team("acme").unwrap().dir;
    let before = snapshot(&team_dir);

    inject(&store, "acme", &project).unwrap();
    assert_eq!(snapshot(&team_dir), before);
}

#[test]
fn test_inject_skips_empty_journal() {
    let tmp = tempdir().unwrap();
    let (store, project) = setup(tmp.path());
    let report = inject(&store, "acme", &project).unwrap();
    assert_eq!(report.journal_entries, 0);
    assert!(report.agents.is_empty());
    assert!(!project.join(".agent/brain/journal").exists());
}

#[test]
fn test_inject_missing_inputs_are_not_found() {
    let tmp = tempdir().unwrap();
    let (store, project) = setup(tmp.path());
    assert!(inject(&store, "ghost", &project).unwrap_err().is_not_found());
    assert!(inject(&store, "acme", &tmp.path().join("missing")).unwrap_err().is_not_found());
    assert!(!project.join(".agent").exists());
}

#[test]
fn test_inject_honors_configured_brain_dir() {
    let tmp = tempdir().unwrap();
    let mut config = TeamConfig::default();
    config.project.brain_dir = ".brain".to_string();
    let store = Store::with_config(TeamRoot::new(tmp.path().join("root")), config);
    registry::create_team(&store, "acme", None, &HeuristicScanner).unwrap();
    let project = tmp.path().join("p");
    fs::create_dir_all(&project).unwrap();

    inject(&store, "acme", &project).unwrap();
    assert!(project.join(".brain/team_meta.json").exists());
}

#[test]
fn test_save_back_merges_project_journal() {
    let tmp = tempdir().unwrap();
    let (store, project) = setup(tmp.path());
    add_team_journal(&store, &[("Fix hydration mismatch in navbar", "hydration.md")]);

    let project_journal = JournalDir::new(project.join(".agent/brain/journal"));
    fs::create_dir_all(project_journal.entries()).unwrap();
    fs::write(project_journal.entries().join("pool.md"), "# pool\n").unwrap();
    project_journal
        .save(&[
            JournalEntry::new("fix hydration mismatch navbar component", "other.md"),
            JournalEntry::new("Connection pool exhaustion", "pool.md"),
        ])
        .unwrap();
    let project_before = snapshot(&project);

    let report = save_back(&store, "acme", &project).unwrap();
    assert_eq!(report.new_entries, 1);
    assert_eq!(report.folded, 1);

    let paths = store.root.team("acme").unwrap();
    let team_journal = JournalDir::of_team(&paths).load();
    assert_eq!(team_journal.len(), 2);
    assert_eq!(team_journal[0].frequency, 2);
    assert!(paths.journal_entries().join("pool.md").exists());
    assert_eq!(snapshot(&project), project_before);

    let again = save_back(&store, "acme", &project).unwrap();
    assert_eq!(again.new_entries, 0);
    assert_eq!(JournalDir::of_team(&paths).load().len(), 2);
}

#[test]
fn test_save_back_without_project_journal() {
    let tmp = tempdir().unwrap();
    let (store, project) = setup(tmp.path());
    let report = save_back(&store, "acme", &project).unwrap();
    assert_eq!(report.new_entries, 0);
    assert!(save_back(&store, "ghost", &project).unwrap_err().is_not_found());
}
