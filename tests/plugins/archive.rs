use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use teamkit::core::config::TeamConfig;
use teamkit::core::error::TeamError;
use teamkit::core::store::{Store, TeamRoot};
use teamkit::plugins::archive::{MANIFEST_NAME, export_team, hash_bytes, import_team};
use teamkit::plugins::registry;
use teamkit::plugins::rules::{self, GLOBAL_AGENT};
use teamkit::plugins::scanner::HeuristicScanner;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

fn setup(tmp: &Path) -> Store {
    let store = Store::with_config(TeamRoot::new(tmp.join("root")), TeamConfig::default());
    registry::create_team(&store, "acme", None, &HeuristicScanner).unwrap();
    store
}

/// Relative path to `Some(bytes)` for files and `None` for directories.
fn tree(dir: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            let rel = path.strip_prefix(dir).unwrap().to_path_buf();
            if path.is_dir() {
                out.insert(rel, None);
                stack.push(path);
            } else {
                out.insert(rel, Some(fs::read(&path).unwrap()));
            }
        }
    }
    out
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn test_export_delete_import_restores_profile() {
    let tmp = tempdir().unwrap();
    let store = setup(tmp.path());
    rules::add_rule(&store, "acme", "write docs in english", GLOBAL_AGENT).unwrap();
    let paths = store.root.team("acme").unwrap();
    let before = tree(&paths.dir);
    // Empty tiers must survive the trip.
    assert_eq!(before.get(Path::new("cold/archive")), Some(&None));

    let zip_path = tmp.path().join("acme.zip");
    let report = export_team(&store, "acme", Some(&zip_path)).unwrap();
    assert!(report.files >= 4);
    assert!(zip_path.exists());

    registry::delete_team(&store, "acme").unwrap();
    assert!(!paths.dir.exists());

    let name = import_team(&store, &zip_path).unwrap();
    assert_eq!(name, "acme");
    assert_eq!(tree(&paths.dir), before);
}

#[test]
fn test_manifest_lists_every_file() {
    let tmp = tempdir().unwrap();
    let store = setup(tmp.path());
    let zip_path = tmp.path().join("out.zip");
    let report = export_team(&store, "acme", Some(&zip_path)).unwrap();

    let mut archive = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
    let mut manifest = String::new();
    std::io::Read::read_to_string(&mut archive.by_name(MANIFEST_NAME).unwrap(), &mut manifest)
        .unwrap();
    assert_eq!(manifest.lines().count(), report.files);

    let team_json = fs::read(store.root.team("acme").unwrap().team_json()).unwrap();
    let line = format!("{}  acme/team.json", hash_bytes(&team_json));
    assert!(manifest.lines().any(|l| l == line));
}

#[test]
fn test_import_refuses_existing_profile() {
    let tmp = tempdir().unwrap();
    let store = setup(tmp.path());
    let zip_path = tmp.path().join("acme.zip");
    export_team(&store, "acme", Some(&zip_path)).unwrap();

    rules::add_rule(&store, "acme", "local change", GLOBAL_AGENT).unwrap();
    let err = import_team(&store, &zip_path).unwrap_err();
    assert!(matches!(err, TeamError::Conflict(_)));
    assert_eq!(rules::list_rules(&store, "acme", None).unwrap().len(), 1);
}

#[test]
fn test_import_rejects_tampered_archive() {
    let tmp = tempdir().unwrap();
    let store = Store::with_config(TeamRoot::new(tmp.path().join("root")), TeamConfig::default());
    let zip_path = tmp.path().join("bad.zip");
    let manifest = format!("{}  beta/team.json\n", hash_bytes(b"{}"));
    write_zip(
        &zip_path,
        &[
            ("beta/team.json", r#"{"name": "evil"}"#),
            (MANIFEST_NAME, manifest.as_str()),
        ],
    );

    let err = import_team(&store, &zip_path).unwrap_err();
    assert!(matches!(err, TeamError::MalformedData { .. }));
    assert!(!store.root.teams_dir().join("beta").exists());
}

#[test]
fn test_import_rejects_unsafe_and_mixed_archives() {
    let tmp = tempdir().unwrap();
    let store = Store::with_config(TeamRoot::new(tmp.path().join("root")), TeamConfig::default());

    let escaping = tmp.path().join("escape.zip");
    write_zip(&escaping, &[("../outside.txt", "x")]);
    assert!(matches!(
        import_team(&store, &escaping),
        Err(TeamError::ValidationError(_))
    ));
    assert!(!tmp.path().join("outside.txt").exists());

    let mixed = tmp.path().join("mixed.zip");
    write_zip(&mixed, &[("one/team.json", "{}"), ("two/team.json", "{}")]);
    assert!(matches!(
        import_team(&store, &mixed),
        Err(TeamError::ValidationError(_))
    ));
}

#[test]
fn test_import_without_manifest_still_requires_team_json() {
    let tmp = tempdir().unwrap();
    let store = Store::with_config(TeamRoot::new(tmp.path().join("root")), TeamConfig::default());

    let no_profile = tmp.path().join("noprofile.zip");
    write_zip(&no_profile, &[("gamma/notes.txt", "hello")]);
    assert!(import_team(&store, &no_profile).is_err());
    assert!(!store.root.teams_dir().join("gamma").exists());

    let plain = tmp.path().join("plain.zip");
    write_zip(&plain, &[("delta/team.json", r#"{"name": "delta"}"#)]);
    assert_eq!(import_team(&store, &plain).unwrap(), "delta");
    assert!(store.root.teams_dir().join("delta/team.json").exists());
}

#[test]
fn test_missing_archive_and_team_are_not_found() {
    let tmp = tempdir().unwrap();
    let store = setup(tmp.path());
    assert!(import_team(&store, &tmp.path().join("nope.zip")).unwrap_err().is_not_found());
    assert!(export_team(&store, "ghost", None).unwrap_err().is_not_found());
}
