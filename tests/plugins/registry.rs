use std::fs;
use std::path::Path;

use teamkit::core::config::TeamConfig;
use teamkit::core::error::TeamError;
use teamkit::core::store::{Store, TeamRoot};
use teamkit::plugins::registry::{
    active_team, create_team, delete_team, list_teams, set_active, show_team,
};
use teamkit::plugins::rules::{self, AddOutcome, GLOBAL_AGENT};
use teamkit::plugins::scanner::HeuristicScanner;
use tempfile::tempdir;

fn store(tmp: &Path) -> Store {
    Store::with_config(TeamRoot::new(tmp.join("root")), TeamConfig::default())
}

fn write_project(dir: &Path) {
    fs::create_dir_all(dir.join("src/features/auth")).unwrap();
    fs::create_dir_all(dir.join("src/features/billing")).unwrap();
    fs::write(
        dir.join("package.json"),
        r#"{"dependencies": {"react": "18", "zustand": "4", "axios": "1"}, "devDependencies": {"vitest": "1"}}"#,
    )
    .unwrap();
    fs::write(
        dir.join("src/features/auth/login.ts"),
        "const userName = 'x';\nfunction handleLogin() {\n  return userName;\n}\n",
    )
    .unwrap();
}

#[test]
fn test_acme_end_to_end() {
    let tmp = tempdir().unwrap();
    let store = store(tmp.path());

    let profile = create_team(&store, "acme", None, &HeuristicScanner).unwrap();
    assert!(profile.scanned_from.is_empty());
    let paths = store.root.team("acme").unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(paths.team_json()).unwrap()).unwrap();
    assert_eq!(raw["stack"], serde_json::json!({}));
    assert_eq!(active_team(&store.root).unwrap().as_deref(), Some("acme"));

    let first = rules::add_rule(&store, "acme", "use tabs", GLOBAL_AGENT).unwrap();
    assert_eq!(first, AddOutcome::Inserted { id: 1 });
    let second =
        rules::add_rule(&store, "acme", "please use tabs for indentation", GLOBAL_AGENT).unwrap();
    assert_eq!(second, AddOutcome::Folded { id: 1, frequency: 2 });

    rules::promote_rules(&store, "acme", 2).unwrap();
    let digest = fs::read_to_string(paths.top_rules_file()).unwrap();
    assert!(digest.contains("use tabs"));

    delete_team(&store, "acme").unwrap();
    assert!(list_teams(&store.root).unwrap().iter().all(|t| t.name != "acme"));
    assert_eq!(active_team(&store.root).unwrap(), None);
    assert!(!paths.dir.exists());
}

#[test]
fn test_create_initializes_every_tier() {
    let tmp = tempdir().unwrap();
    let store = store(tmp.path());
    create_team(&store, "acme", None, &HeuristicScanner).unwrap();

    let paths = store.root.team("acme").unwrap();
    assert!(paths.dna_file().exists());
    assert!(paths.top_rules_file().exists());
    assert_eq!(
        fs::read_to_string(paths.journal_index()).unwrap().trim(),
        "[]"
    );
    assert!(paths.journal_entries().is_dir());
    assert!(paths.history_dir().is_dir());
    assert!(paths.archive_dir().is_dir());
    let rules: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(paths.rules_file()).unwrap()).unwrap();
    assert_eq!(rules["global"], serde_json::json!([]));
    assert_eq!(rules["rules"], serde_json::json!([]));
}

#[test]
fn test_create_with_scan_records_facts_and_dna() {
    let tmp = tempdir().unwrap();
    let project = tmp.path().join("web");
    write_project(&project);
    let store = store(tmp.path());

    let profile = create_team(&store, "acme", Some(&project), &HeuristicScanner).unwrap();
    assert_eq!(profile.scanned_from.len(), 1);
    assert_eq!(profile.stack.frontend.as_deref(), Some("react"));

    let details = show_team(&store, "acme").unwrap();
    assert!(details.active);
    assert_eq!(details.dna_tokens.get("fe").map(String::as_str), Some("react"));
    assert_eq!(details.dna_tokens.get("state").map(String::as_str), Some("zustand"));
}

#[test]
fn test_create_refuses_existing_profile() {
    let tmp = tempdir().unwrap();
    let store = store(tmp.path());
    create_team(&store, "acme", None, &HeuristicScanner).unwrap();
    rules::add_rule(&store, "acme", "keep this rule", GLOBAL_AGENT).unwrap();

    let err = create_team(&store, "acme", None, &HeuristicScanner).unwrap_err();
    assert!(matches!(err, TeamError::Conflict(_)));
    assert_eq!(rules::list_rules(&store, "acme", None).unwrap().len(), 1);
}

#[test]
fn test_create_with_missing_scan_path_leaves_nothing() {
    let tmp = tempdir().unwrap();
    let store = store(tmp.path());
    let missing = tmp.path().join("nope");

    let err = create_team(&store, "acme", Some(&missing), &HeuristicScanner).unwrap_err();
    assert!(err.is_not_found());
    assert!(!store.root.team("acme").unwrap().dir.exists());
    assert_eq!(active_team(&store.root).unwrap(), None);
    let leftovers: Vec<_> = fs::read_dir(store.root.teams_dir())
        .map(|rd| rd.filter_map(|e| e.ok()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty());
}

#[test]
fn test_invalid_names_are_rejected() {
    let tmp = tempdir().unwrap();
    let store = store(tmp.path());
    for name in ["", "../escape", "a/b", ".hidden"] {
        let err = create_team(&store, name, None, &HeuristicScanner).unwrap_err();
        assert!(matches!(err, TeamError::ValidationError(_)), "{}", name);
    }
}

#[test]
fn test_delete_other_team_keeps_active_pointer() {
    let tmp = tempdir().unwrap();
    let store = store(tmp.path());
    create_team(&store, "alpha", None, &HeuristicScanner).unwrap();
    create_team(&store, "beta", None, &HeuristicScanner).unwrap();
    assert_eq!(active_team(&store.root).unwrap().as_deref(), Some("beta"));

    delete_team(&store, "alpha").unwrap();
    assert_eq!(active_team(&store.root).unwrap().as_deref(), Some("beta"));
    assert!(delete_team(&store, "alpha").unwrap_err().is_not_found());
}

#[test]
fn test_list_is_sorted_and_marks_active() {
    let tmp = tempdir().unwrap();
    let store = store(tmp.path());
    assert!(list_teams(&store.root).unwrap().is_empty());

    for name in ["zeta", "acme", "mid"] {
        create_team(&store, name, None, &HeuristicScanner).unwrap();
    }
    set_active(&store.root, "mid").unwrap();
    rules::add_rule(&store, "acme", "one rule here", GLOBAL_AGENT).unwrap();

    let teams = list_teams(&store.root).unwrap();
    let names: Vec<&str> = teams.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["acme", "mid", "zeta"]);
    assert!(teams[1].active);
    assert!(!teams[0].active);
    assert_eq!(teams[0].rules, 1);
}

#[test]
fn test_show_reports_malformed_team_json() {
    let tmp = tempdir().unwrap();
    let store = store(tmp.path());
    create_team(&store, "acme", None, &HeuristicScanner).unwrap();
    let paths = store.root.team("acme").unwrap();
    fs::write(paths.team_json(), "{").unwrap();

    assert!(matches!(
        show_team(&store, "acme"),
        Err(TeamError::MalformedData { .. })
    ));
    assert!(show_team(&store, "ghost").unwrap_err().is_not_found());
}
