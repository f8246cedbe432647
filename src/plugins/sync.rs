//! Profile-to-profile merge. The source is read-only input; only the target
//! is locked and rewritten.

use crate::core::error::TeamError;
use crate::core::store::Store;
use crate::plugins::journal::{self, JournalDir};
use crate::plugins::rules::{self, AddOutcome, DedupPolicy};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub rules_added: usize,
    pub rules_folded: usize,
    pub journal_added: usize,
    pub journal_folded: usize,
    pub bodies_copied: usize,
}

pub fn sync_teams(store: &Store, target: &str, source: &str) -> Result<SyncReport, TeamError> {
    if target == source {
        return Err(TeamError::ValidationError(format!(
            "cannot sync team '{}' into itself",
            target
        )));
    }
    let source_paths = store.root.existing_team(source)?;
    let policy = DedupPolicy::from(&store.config.rules);
    let min_frequency = store.config.rules.promotion_threshold;
    let journal_threshold = store.config.journal.dedup_threshold;

    store.broker().with_team(target, "team.sync", |paths| {
        let mut report = SyncReport::default();

        let incoming = rules::load_rules(&source_paths);
        if !incoming.rules.is_empty() {
            let mut book = rules::load_rules(paths);
            for rule in &incoming.rules {
                match book.merge_rule(rule, &policy) {
                    AddOutcome::Inserted { .. } => report.rules_added += 1,
                    AddOutcome::Folded { .. } => report.rules_folded += 1,
                }
            }
            rules::save_rules(paths, &mut book)?;
            rules::write_top_rules(paths, &book, min_frequency)?;
        }

        let merged = journal::merge_dirs(
            &JournalDir::of_team(&source_paths),
            &JournalDir::of_team(paths),
            journal_threshold,
        )?;
        report.journal_added = merged.new_entries;
        report.journal_folded = merged.folded;
        report.bodies_copied = merged.bodies_copied;

        tracing::info!(target, source, ?report, "teams synced");
        Ok(report)
    })
}
