use std::fs;

use teamkit::plugins::journal::{JournalDir, JournalEntry, merge, merge_dirs};
use tempfile::tempdir;

fn entry(title: &str, file: &str, tags: &[&str]) -> JournalEntry {
    let mut e = JournalEntry::new(title, file);
    e.tags = tags.iter().map(|t| t.to_string()).collect();
    e
}

fn seed(dir: &JournalDir, entries: &[JournalEntry]) {
    fs::create_dir_all(dir.entries()).unwrap();
    for e in entries {
        if !e.file.is_empty() && !e.file.contains('/') {
            fs::write(dir.entries().join(&e.file), format!("# {}\n", e.title)).unwrap();
        }
    }
    dir.save(entries).unwrap();
}

#[test]
fn test_merge_dirs_copies_new_bodies_only() {
    let tmp = tempdir().unwrap();
    let source = JournalDir::new(tmp.path().join("project/journal"));
    let target = JournalDir::new(tmp.path().join("team/journal"));

    seed(
        &target,
        &[entry("Fix hydration mismatch in navbar", "hydration.md", &["react"])],
    );
    seed(
        &source,
        &[
            entry("fix hydration mismatch navbar component", "hydration-2.md", &["react"]),
            entry("Connection pool exhaustion under load", "pool.md", &["db"]),
        ],
    );

    let report = merge_dirs(&source, &target, 0.7).unwrap();
    assert_eq!(report.new_entries, 1);
    assert_eq!(report.folded, 1);
    assert_eq!(report.bodies_copied, 1);

    let merged = target.load();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].frequency, 2);
    assert_eq!(merged[1].title, "Connection pool exhaustion under load");
    assert!(target.entries().join("pool.md").exists());
    // The folded entry's body stays where it was.
    assert!(!target.entries().join("hydration-2.md").exists());
    assert!(source.entries().join("hydration-2.md").exists());
}

#[test]
fn test_merge_dirs_twice_adds_nothing() {
    let tmp = tempdir().unwrap();
    let source = JournalDir::new(tmp.path().join("src"));
    let target = JournalDir::new(tmp.path().join("dst"));
    seed(
        &source,
        &[
            entry("Retry flaky webhook delivery", "webhook.md", &[]),
            entry("Cache invalidation after deploy", "cache.md", &["ops"]),
        ],
    );

    let first = merge_dirs(&source, &target, 0.7).unwrap();
    assert_eq!(first.new_entries, 2);
    let second = merge_dirs(&source, &target, 0.7).unwrap();
    assert_eq!(second.new_entries, 0);
    assert_eq!(second.folded, 2);

    let titles: Vec<String> = target.load().into_iter().map(|e| e.title).collect();
    assert_eq!(
        titles,
        vec!["Retry flaky webhook delivery", "Cache invalidation after deploy"]
    );
}

#[test]
fn test_unsafe_file_reference_is_not_copied() {
    let tmp = tempdir().unwrap();
    let source = JournalDir::new(tmp.path().join("src"));
    let target = JournalDir::new(tmp.path().join("dst"));
    fs::write(tmp.path().join("secret.txt"), "do not copy").unwrap();
    seed(&source, &[entry("Escaping body reference", "../../secret.txt", &[])]);

    let report = merge_dirs(&source, &target, 0.7).unwrap();
    assert_eq!(report.new_entries, 1);
    assert_eq!(report.bodies_copied, 0);
    assert!(!tmp.path().join("dst/secret.txt").exists());
}

#[test]
fn test_malformed_target_index_reads_as_empty() {
    let tmp = tempdir().unwrap();
    let source = JournalDir::new(tmp.path().join("src"));
    let target = JournalDir::new(tmp.path().join("dst"));
    seed(&source, &[entry("Slow query on reports page", "slow.md", &["db"])]);
    fs::create_dir_all(&target.dir).unwrap();
    fs::write(target.index(), "not json").unwrap();

    let report = merge_dirs(&source, &target, 0.7).unwrap();
    assert_eq!(report.new_entries, 1);
    assert_eq!(target.load().len(), 1);
}

#[test]
fn test_duplicates_inside_one_source_fold_together() {
    let source = vec![
        entry("Timezone bug in scheduler", "", &[]),
        entry("timezone bug scheduler", "", &[]),
    ];
    let out = merge(&source, Vec::new(), 0.7);
    assert_eq!(out.new_count(), 1);
    assert_eq!(out.entries[0].frequency, 2);
}

#[test]
fn test_body_name_clash_keeps_existing_lesson() {
    let tmp = tempdir().unwrap();
    let source = JournalDir::new(tmp.path().join("partner"));
    let target = JournalDir::new(tmp.path().join("acme"));
    fs::create_dir_all(target.entries()).unwrap();
    fs::write(target.entries().join("notes.md"), "ACME: pool exhaustion fix\n").unwrap();
    target
        .save(&[entry("Database connection pool exhaustion", "notes.md", &[])])
        .unwrap();
    fs::create_dir_all(source.entries()).unwrap();
    fs::write(source.entries().join("notes.md"), "PARTNER: tailwind theme\n").unwrap();
    source
        .save(&[entry("Configure tailwind theme tokens", "notes.md", &[])])
        .unwrap();

    let report = merge_dirs(&source, &target, 0.7).unwrap();
    assert_eq!(report.new_entries, 1);
    assert_eq!(report.bodies_copied, 1);

    assert_eq!(
        fs::read_to_string(target.entries().join("notes.md")).unwrap(),
        "ACME: pool exhaustion fix\n"
    );
    let merged = target.load();
    assert_eq!(merged[0].file, "notes.md");
    assert_eq!(merged[1].file, "notes-1.md");
    assert_eq!(
        fs::read_to_string(target.entries().join("notes-1.md")).unwrap(),
        "PARTNER: tailwind theme\n"
    );
    // The source keeps its own naming.
    assert_eq!(source.load()[0].file, "notes.md");

    // A second merge folds and writes nothing new.
    let again = merge_dirs(&source, &target, 0.7).unwrap();
    assert_eq!(again.new_entries, 0);
    assert!(!target.entries().join("notes-2.md").exists());
}
