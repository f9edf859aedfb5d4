//! File modification time preservation
//!
//! Cargo decides what to recompile by comparing mtimes. Cache layers are
//! restored by copying, which resets them, so every cached tree carries a
//! manifest of the times it had when it was saved. Restoring the manifest
//! before a build lets cargo's incremental cache recognize unchanged units.
//!
//! The manifest is `<root>/mtimes.json`: one JSON object per line,
//! `{"Path":"<absolute path>","MTime":"<RFC3339, nanoseconds, UTC>"}`.

use crate::error::{KilnError, KilnResult};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Manifest file name inside each preserved root
pub const PRESERVER_METADATA_FILE: &str = "mtimes.json";

/// Modification time of one filesystem entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRecord {
    #[serde(rename = "Path")]
    pub path: PathBuf,

    #[serde(rename = "MTime", with = "rfc3339_nanos")]
    pub mtime: DateTime<Utc>,
}

impl TimestampRecord {
    fn file_time(&self) -> FileTime {
        FileTime::from_unix_time(self.mtime.timestamp(), self.mtime.timestamp_subsec_nanos())
    }
}

mod rfc3339_nanos {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

fn manifest_path(root: &Path) -> PathBuf {
    root.join(PRESERVER_METADATA_FILE)
}

/// Record the mtime of every entry under `root` (symlinks not followed).
///
/// On failure no manifest is left behind, so a later restore cannot apply
/// an incomplete or outdated set of times.
pub fn snapshot(root: &Path) -> KilnResult<()> {
    let manifest = manifest_path(root);

    let result = collect_records(root, &manifest).and_then(|records| {
        write_manifest(&manifest, &records)?;
        Ok(records.len())
    });

    match result {
        Ok(count) => {
            debug!("Preserved {} modification times under {}", count, root.display());
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&manifest);
            Err(e)
        }
    }
}

fn collect_records(root: &Path, manifest: &Path) -> KilnResult<Vec<TimestampRecord>> {
    fs::create_dir_all(root)
        .map_err(|e| KilnError::io(format!("creating {}", root.display()), e))?;

    let mut records = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| KilnError::Walk {
            path: root.to_path_buf(),
            source: e,
        })?;
        if entry.path() == manifest {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| KilnError::Walk {
            path: entry.path().to_path_buf(),
            source: e,
        })?;
        let modified = metadata
            .modified()
            .map_err(|e| KilnError::io(format!("reading mtime of {}", entry.path().display()), e))?;

        records.push(TimestampRecord {
            path: entry.path().to_path_buf(),
            mtime: DateTime::<Utc>::from(modified),
        });
    }

    Ok(records)
}

fn write_manifest(manifest: &Path, records: &[TimestampRecord]) -> KilnResult<()> {
    let file = File::create(manifest)
        .map_err(|e| KilnError::io(format!("creating {}", manifest.display()), e))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer
            .write_all(b"\n")
            .map_err(|e| KilnError::io(format!("writing {}", manifest.display()), e))?;
    }

    writer
        .flush()
        .map_err(|e| KilnError::io(format!("writing {}", manifest.display()), e))
}

/// Apply the manifest under `root`, if there is one.
///
/// A path whose times cannot be set is logged and skipped; the rest of the
/// manifest is still applied.
pub fn restore(root: &Path) -> KilnResult<()> {
    let manifest = manifest_path(root);
    let file = match File::open(&manifest) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("File modification times not restored for {}", root.display());
            return Ok(());
        }
        Err(e) => return Err(KilnError::io(format!("opening {}", manifest.display()), e)),
    };

    let mut restored = 0usize;
    let mut skipped = 0usize;

    let records =
        serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<TimestampRecord>();
    for record in records {
        let record = record?;
        let time = record.file_time();
        match filetime::set_symlink_file_times(&record.path, time, time) {
            Ok(()) => restored += 1,
            Err(e) => {
                warn!("Unable to restore time of file {}: {}", record.path.display(), e);
                skipped += 1;
            }
        }
    }

    debug!(
        "Restored {} modification times under {} ({} skipped)",
        restored,
        root.display(),
        skipped
    );
    Ok(())
}

/// [`snapshot`] each root in order, stopping at the first failure
pub fn snapshot_all(roots: &[&Path]) -> KilnResult<()> {
    roots.iter().try_for_each(|root| snapshot(root))
}

/// [`restore`] each root in order, stopping at the first failure
pub fn restore_all(roots: &[&Path]) -> KilnResult<()> {
    roots.iter().try_for_each(|root| restore(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const FILES: [&str; 6] = [
        "folder1/file1a.txt",
        "folder1/file1b.txt",
        "folder1/folder2/file2a.txt",
        "folder1/folder2/folder3/file3a.txt",
        "foldera/filea1.txt",
        "foldera/folderb/folderc/filec1.txt",
    ];

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in FILES {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, file).unwrap();
        }
        // predictable times, deepest entries first so parents keep theirs
        let mut paths: Vec<PathBuf> = WalkDir::new(dir.path())
            .into_iter()
            .map(|e| e.unwrap().path().to_path_buf())
            .collect();
        paths.reverse();
        for (i, path) in paths.iter().enumerate() {
            let time = FileTime::from_unix_time(1_618_349_562 + i as i64 * 7, 266_625_461);
            filetime::set_file_mtime(path, time).unwrap();
        }
        dir
    }

    fn mtimes(root: &Path) -> BTreeMap<PathBuf, FileTime> {
        WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_name() != PRESERVER_METADATA_FILE)
            .map(|e| {
                let meta = fs::symlink_metadata(e.path()).unwrap();
                (e.path().to_path_buf(), FileTime::from_last_modification_time(&meta))
            })
            .collect()
    }

    fn read_records(root: &Path) -> Vec<TimestampRecord> {
        fs::read_to_string(manifest_path(root))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn snapshot_writes_one_record_per_entry() {
        let dir = tree();
        let check = dir.path().join("folder1/folder2/folder3/file3a.txt");
        let now = FileTime::from_unix_time(1_700_000_000, 123_456_789);
        filetime::set_file_mtime(&check, now).unwrap();

        snapshot(dir.path()).unwrap();

        let contents = fs::read_to_string(manifest_path(dir.path())).unwrap();
        let nested = dir.path().join("foldera/folderb/folderc");
        assert!(contents.contains(&nested.display().to_string()));
        assert!(contents.contains(r#""MTime":"2023-11-14T22:13:20.123456789Z""#));

        let records = read_records(dir.path());
        // 6 files, 6 directories, the root
        assert_eq!(records.len(), 13);
        assert_eq!(records[0].path, dir.path());
        assert!(records.iter().all(|r| r.path.is_absolute()));
        assert!(!records.iter().any(|r| r.path.ends_with(PRESERVER_METADATA_FILE)));
    }

    #[test]
    fn snapshot_overwrites_previous_manifest() {
        let dir = tree();
        fs::write(manifest_path(dir.path()), "garbage that is not json\n".repeat(100)).unwrap();

        snapshot(dir.path()).unwrap();

        assert_eq!(read_records(dir.path()).len(), 13);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_write_leaves_no_manifest() {
        let dir = tree();
        // every write to /dev/full fails with ENOSPC
        std::os::unix::fs::symlink("/dev/full", manifest_path(dir.path())).unwrap();

        let err = snapshot(dir.path()).unwrap_err();

        assert!(matches!(err, KilnError::Io { .. }), "{}", err);
        assert!(fs::symlink_metadata(manifest_path(dir.path())).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn failed_walk_removes_previous_manifest() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tree();
        snapshot(dir.path()).unwrap();
        let locked = dir.path().join("folder1/folder2");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // permissions are not enforced for this user
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = snapshot(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(KilnError::Walk { .. })));
        assert!(!manifest_path(dir.path()).exists());
    }

    #[test]
    fn snapshot_of_file_root_fails() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("not-a-dir");
        fs::write(&root, "x").unwrap();

        assert!(snapshot(&root).is_err());
        assert!(!manifest_path(&root).exists());
        assert_eq!(fs::read_to_string(&root).unwrap(), "x");
    }

    #[test]
    fn round_trip_restores_altered_times() {
        let dir = tree();
        let saved = mtimes(dir.path());
        snapshot(dir.path()).unwrap();

        let epoch = FileTime::from_unix_time(0, 0);
        for path in saved.keys() {
            filetime::set_file_mtime(path, epoch).unwrap();
        }
        assert_ne!(mtimes(dir.path()), saved);

        restore(dir.path()).unwrap();

        assert_eq!(mtimes(dir.path()), saved);
    }

    #[test]
    fn round_trip_on_unmodified_tree_is_noop() {
        let dir = tree();
        let before = mtimes(dir.path());
        snapshot(dir.path()).unwrap();

        restore(dir.path()).unwrap();

        assert_eq!(mtimes(dir.path()), before);
    }

    #[test]
    fn restore_without_manifest_changes_nothing() {
        let dir = tree();
        let before = mtimes(dir.path());

        restore(dir.path()).unwrap();

        assert_eq!(mtimes(dir.path()), before);
    }

    #[test]
    fn restore_skips_missing_paths() {
        let dir = tree();
        let target = dir.path().join("folder1/file1a.txt");
        let lines = [
            format!(
                r#"{{"Path":"{}","MTime":"2021-04-13T21:32:11.619000841Z"}}"#,
                dir.path().join("gone.txt").display()
            ),
            format!(
                r#"{{"Path":"{}","MTime":"2021-04-13T21:32:11.619000841Z"}}"#,
                target.display()
            ),
        ];
        fs::write(manifest_path(dir.path()), lines.join("\n")).unwrap();

        restore(dir.path()).unwrap();

        let meta = fs::metadata(&target).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta),
            FileTime::from_unix_time(1_618_349_531, 619_000_841)
        );
    }

    #[test]
    fn restore_accepts_variable_precision() {
        let dir = tree();
        let target = dir.path().join("folder1/file1b.txt");
        let line = format!(
            r#"{{"Path":"{}","MTime":"2021-04-13T21:32:24.132Z"}}"#,
            target.display()
        );
        fs::write(manifest_path(dir.path()), line).unwrap();

        restore(dir.path()).unwrap();

        let meta = fs::metadata(&target).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta),
            FileTime::from_unix_time(1_618_349_544, 132_000_000)
        );
    }

    #[test]
    fn restore_rejects_corrupt_manifest() {
        let dir = tree();
        fs::write(manifest_path(dir.path()), "{\"Path\": 12}\n").unwrap();
        assert!(restore(dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_recorded_not_followed() {
        let dir = tree();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        snapshot(dir.path()).unwrap();

        let records = read_records(dir.path());
        assert!(records.iter().any(|r| r.path == dir.path().join("link")));
        assert!(!records.iter().any(|r| r.path.ends_with("secret.txt")));
    }

    #[test]
    fn snapshot_all_covers_each_root() {
        let a = tree();
        let b = tree();
        snapshot_all(&[a.path(), b.path()]).unwrap();
        assert!(manifest_path(a.path()).is_file());
        assert!(manifest_path(b.path()).is_file());
        restore_all(&[a.path(), b.path()]).unwrap();
    }
}
