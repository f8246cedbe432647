//! Export a profile subtree to a zip archive and import it back.
//!
//! Archive layout: every file and directory of the profile under `<name>/`,
//! plus a root-level `MANIFEST.sha256` listing `<sha256>  <name>/<path>` for
//! each file. Import verifies the manifest before anything becomes visible.

use crate::core::error::TeamError;
use crate::core::fsio;
use crate::core::store::{Store, validate_team_name};
use crate::core::time;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;

pub const MANIFEST_NAME: &str = "MANIFEST.sha256";

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

enum Node {
    Dir(String),
    File(String, PathBuf),
}

/// Sorted walk of `dir`, yielding `/`-joined paths relative to `base`.
fn collect_nodes(base: &Path, dir: &Path, out: &mut Vec<Node>) -> Result<(), TeamError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(TeamError::IoError)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    for path in entries {
        let rel = relative_name(base, &path);
        let file_type = fs::symlink_metadata(&path)
            .map_err(TeamError::IoError)?
            .file_type();
        if file_type.is_symlink() {
            tracing::warn!(path = %path.display(), "skipping symlink during export");
        } else if file_type.is_dir() {
            out.push(Node::Dir(rel));
            collect_nodes(base, &path, out)?;
        } else {
            out.push(Node::File(rel, path));
        }
    }
    Ok(())
}

fn relative_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExportReport {
    pub team: String,
    pub archive: PathBuf,
    pub files: usize,
}

/// Pack `team` into a zip at `output` (default `<team>.zip`).
pub fn export_team(store: &Store, team: &str, output: Option<&Path>) -> Result<ExportReport, TeamError> {
    store.broker().record("team.export", Some(team), || {
        let paths = store.root.existing_team(team)?;
        let archive = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{}.zip", team)));

        let mut nodes = Vec::new();
        collect_nodes(&paths.dir, &paths.dir, &mut nodes)?;

        let mut buf = std::io::Cursor::new(Vec::new());
        let mut manifest = String::new();
        let mut files = 0;
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            writer.add_directory(format!("{}/", team), options)?;
            for node in &nodes {
                match node {
                    Node::Dir(rel) => writer.add_directory(format!("{}/{}/", team, rel), options)?,
                    Node::File(rel, path) => {
                        let bytes = fs::read(path).map_err(TeamError::IoError)?;
                        let name = format!("{}/{}", team, rel);
                        manifest.push_str(&format!("{}  {}\n", hash_bytes(&bytes), name));
                        writer.start_file(name, options)?;
                        writer.write_all(&bytes).map_err(TeamError::IoError)?;
                        files += 1;
                    }
                }
            }
            writer.start_file(MANIFEST_NAME, options)?;
            writer
                .write_all(manifest.as_bytes())
                .map_err(TeamError::IoError)?;
            writer.finish()?;
        }
        fsio::write_atomic(&archive, buf.get_ref())?;

        tracing::info!(team, archive = %archive.display(), files, "team exported");
        Ok(ExportReport {
            team: team.to_string(),
            archive,
            files,
        })
    })
}

fn parse_manifest(raw: &str) -> Result<BTreeMap<String, String>, TeamError> {
    let mut out = BTreeMap::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let (hash, name) = line.split_once("  ").ok_or_else(|| TeamError::MalformedData {
            path: PathBuf::from(MANIFEST_NAME),
            reason: format!("bad manifest line '{}'", line),
        })?;
        out.insert(name.to_string(), hash.to_string());
    }
    Ok(out)
}

/// Profile-relative path of an archive entry, plus the profile name it belongs to.
fn split_entry(enclosed: &Path) -> Option<(String, PathBuf)> {
    let mut components = enclosed.components();
    let Some(Component::Normal(first)) = components.next() else {
        return None;
    };
    let rest: PathBuf = components.collect();
    Some((first.to_string_lossy().to_string(), rest))
}

struct Unpacked {
    team: String,
    dirs: Vec<PathBuf>,
    files: Vec<(String, PathBuf, Vec<u8>)>,
    manifest: Option<BTreeMap<String, String>>,
}

fn read_archive(archive_path: &Path) -> Result<Unpacked, TeamError> {
    let file = fs::File::open(archive_path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            TeamError::NotFound(format!("archive {}", archive_path.display()))
        }
        _ => TeamError::IoError(e),
    })?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut team: Option<String> = None;
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let mut manifest = None;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let raw_name = entry.name().to_string();
        if raw_name == MANIFEST_NAME {
            let mut raw = String::new();
            entry.read_to_string(&mut raw).map_err(TeamError::IoError)?;
            manifest = Some(parse_manifest(&raw)?);
            continue;
        }
        let enclosed = entry.enclosed_name().ok_or_else(|| {
            TeamError::ValidationError(format!("archive entry '{}' escapes the profile root", raw_name))
        })?;
        let (name, rel) = split_entry(&enclosed).ok_or_else(|| {
            TeamError::ValidationError(format!("archive entry '{}' has no profile directory", raw_name))
        })?;
        match &team {
            None => {
                validate_team_name(&name)?;
                team = Some(name);
            }
            Some(existing) if *existing != name => {
                return Err(TeamError::ValidationError(format!(
                    "archive holds more than one profile ('{}' and '{}')",
                    existing, name
                )));
            }
            Some(_) => {}
        }
        if entry.is_dir() {
            dirs.push(rel);
        } else {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(TeamError::IoError)?;
            files.push((raw_name, rel, bytes));
        }
    }

    let team = team.ok_or_else(|| {
        TeamError::ValidationError(format!("archive {} holds no profile", archive_path.display()))
    })?;
    Ok(Unpacked {
        team,
        dirs,
        files,
        manifest,
    })
}

fn verify(unpacked: &Unpacked) -> Result<(), TeamError> {
    let Some(manifest) = &unpacked.manifest else {
        tracing::warn!(team = %unpacked.team, "archive has no {}, skipping verification", MANIFEST_NAME);
        return Ok(());
    };
    let malformed = |reason: String| TeamError::MalformedData {
        path: PathBuf::from(MANIFEST_NAME),
        reason,
    };
    for (name, _, bytes) in &unpacked.files {
        let expected = manifest
            .get(name)
            .ok_or_else(|| malformed(format!("'{}' is not listed", name)))?;
        if *expected != hash_bytes(bytes) {
            return Err(malformed(format!("checksum mismatch for '{}'", name)));
        }
    }
    if manifest.len() != unpacked.files.len() {
        return Err(malformed("manifest lists files missing from the archive".to_string()));
    }
    Ok(())
}

/// Unpack an exported profile under the root. Refuses to replace an existing profile.
pub fn import_team(store: &Store, archive_path: &Path) -> Result<String, TeamError> {
    let unpacked = read_archive(archive_path)?;
    verify(&unpacked)?;
    let team = unpacked.team.clone();

    store.broker().with_lock(&team, "team.import", |paths| {
        if paths.dir.exists() {
            return Err(TeamError::Conflict(format!("team '{}' already exists", team)));
        }
        let staging = store
            .root
            .teams_dir()
            .join(format!(".staging-import-{}", time::new_event_id()));
        let result = unpack_into(&staging, &unpacked).and_then(|()| {
            fsio::read_json_strict::<crate::core::profile::TeamProfile>(&staging.join("team.json"))?;
            fs::rename(&staging, &paths.dir).map_err(TeamError::IoError)
        });
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result
    })?;

    tracing::info!(team = %team, archive = %archive_path.display(), "team imported");
    Ok(team)
}

fn unpack_into(staging: &Path, unpacked: &Unpacked) -> Result<(), TeamError> {
    fs::create_dir_all(staging).map_err(TeamError::IoError)?;
    for dir in &unpacked.dirs {
        fs::create_dir_all(staging.join(dir)).map_err(TeamError::IoError)?;
    }
    for (_, rel, bytes) in &unpacked.files {
        let dest = staging.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(TeamError::IoError)?;
        }
        fs::write(&dest, bytes).map_err(TeamError::IoError)?;
    }
    Ok(())
}
