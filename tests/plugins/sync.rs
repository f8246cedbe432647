use std::fs;
use std::path::Path;

use teamkit::core::config::TeamConfig;
use teamkit::core::error::TeamError;
use teamkit::core::store::{Store, TeamRoot};
use teamkit::plugins::journal::{JournalDir, JournalEntry};
use teamkit::plugins::registry;
use teamkit::plugins::rules::{self, GLOBAL_AGENT, load_rules};
use teamkit::plugins::scanner::HeuristicScanner;
use teamkit::plugins::sync::sync_teams;
use tempfile::tempdir;

fn setup(tmp: &Path) -> Store {
    let store = Store::with_config(TeamRoot::new(tmp.join("root")), TeamConfig::default());
    registry::create_team(&store, "acme", None, &HeuristicScanner).unwrap();
    registry::create_team(&store, "partner", None, &HeuristicScanner).unwrap();
    store
}

#[test]
fn test_sync_folds_and_inserts_rules() {
    let tmp = tempdir().unwrap();
    let store = setup(tmp.path());
    rules::add_rule(&store, "acme", "write docs in english", GLOBAL_AGENT).unwrap();
    for _ in 0..3 {
        rules::add_rule(&store, "partner", "write docs in english", GLOBAL_AGENT).unwrap();
    }
    rules::add_rule(&store, "partner", "validate request bodies", "backend-dev").unwrap();
    rules::add_rule(&store, "partner", "validate request bodies", "backend-dev").unwrap();

    let report = sync_teams(&store, "acme", "partner").unwrap();
    assert_eq!(report.rules_folded, 1);
    assert_eq!(report.rules_added, 1);

    let book = load_rules(&store.root.team("acme").unwrap());
    assert_eq!(book.rules.len(), 2);
    // A folded rule takes the larger count, not the sum.
    assert_eq!(book.rules[0].frequency, 3);
    let imported = &book.rules[1];
    assert_eq!(imported.id, 2);
    assert_eq!(imported.agent, "backend-dev");
    // A rule new to the target keeps the counters it had in the source.
    assert_eq!(imported.frequency, 2);
    assert_eq!(book.global, vec!["write docs in english"]);
}

#[test]
fn test_sync_leaves_source_untouched() {
    let tmp = tempdir().unwrap();
    let store = setup(tmp.path());
    rules::add_rule(&store, "partner", "prefer small pull requests", GLOBAL_AGENT).unwrap();
    let partner = store.root.team("partner").unwrap();
    fs::write(partner.journal_entries().join("webhook.md"), "# webhook\n").unwrap();
    JournalDir::of_team(&partner)
        .save(&[JournalEntry::new("Retry flaky webhook delivery", "webhook.md")])
        .unwrap();

    let rules_before = fs::read(partner.rules_file()).unwrap();
    let index_before = fs::read(partner.journal_index()).unwrap();

    let report = sync_teams(&store, "acme", "partner").unwrap();
    assert_eq!(report.rules_added, 1);
    assert_eq!(report.journal_added, 1);
    assert_eq!(report.bodies_copied, 1);

    assert_eq!(fs::read(partner.rules_file()).unwrap(), rules_before);
    assert_eq!(fs::read(partner.journal_index()).unwrap(), index_before);

    let acme = store.root.team("acme").unwrap();
    assert!(acme.journal_entries().join("webhook.md").exists());

    let again = sync_teams(&store, "acme", "partner").unwrap();
    assert_eq!(again.rules_added, 0);
    assert_eq!(again.journal_added, 0);
    assert_eq!(JournalDir::of_team(&acme).load().len(), 1);
}

#[test]
fn test_sync_rejects_self_and_missing_profiles() {
    let tmp = tempdir().unwrap();
    let store = setup(tmp.path());

    assert!(matches!(
        sync_teams(&store, "acme", "acme"),
        Err(TeamError::ValidationError(_))
    ));
    assert!(sync_teams(&store, "acme", "ghost").unwrap_err().is_not_found());
    assert!(sync_teams(&store, "ghost", "acme").unwrap_err().is_not_found());
}

#[test]
fn test_repeated_sync_is_stable() {
    let tmp = tempdir().unwrap();
    let store = setup(tmp.path());
    rules::add_rule(&store, "acme", "write docs in english", GLOBAL_AGENT).unwrap();
    rules::add_rule(&store, "acme", "write docs in english", GLOBAL_AGENT).unwrap();
    rules::add_rule(&store, "partner", "write docs in english", GLOBAL_AGENT).unwrap();
    rules::add_rule(&store, "partner", "prefer small pull requests", GLOBAL_AGENT).unwrap();

    sync_teams(&store, "acme", "partner").unwrap();
    let acme = store.root.team("acme").unwrap();
    let rules_once = fs::read(acme.rules_file()).unwrap();
    let top_once = fs::read(acme.top_rules_file()).unwrap();

    let again = sync_teams(&store, "acme", "partner").unwrap();
    assert_eq!(again.rules_added, 0);
    assert_eq!(again.rules_folded, 2);
    assert_eq!(fs::read(acme.rules_file()).unwrap(), rules_once);
    assert_eq!(fs::read(acme.top_rules_file()).unwrap(), top_once);
    assert_eq!(load_rules(&acme).rules[0].frequency, 2);
}
