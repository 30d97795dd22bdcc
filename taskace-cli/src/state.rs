use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use taskace_core::StateSnapshot;
use tempfile::NamedTempFile;

/// `$TASKACE_HOME` if set, else `~/.taskace`.
pub fn taskace_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TASKACE_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".taskace"))
}

pub fn ensure_taskace_home() -> Result<PathBuf> {
    let dir = taskace_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn state_path() -> Result<PathBuf> {
    Ok(ensure_taskace_home()?.join("state.json"))
}

/// Missing file means a first run.
pub fn read_snapshot(path: &Path) -> Result<Option<StateSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let snapshot =
        StateSnapshot::from_json(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(snapshot))
}

/// Write through a uniquely named sibling temp file, then rename over `path`,
/// so readers only ever see a whole document.
pub fn write_snapshot(path: &Path, snapshot: &StateSnapshot) -> Result<()> {
    let json = snapshot.to_json_pretty()?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(json.as_bytes())
        .with_context(|| format!("write {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_state_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_snapshot(&dir.path().join("state.json")).unwrap().is_none());
    }

    #[test]
    fn snapshot_written_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let snap = StateSnapshot {
            points: 40,
            active_schedule: Some("2".into()),
            ..StateSnapshot::default()
        };

        write_snapshot(&path, &snap).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), Some(snap));

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn concurrent_writers_never_leave_a_partial_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let snapshots: Vec<StateSnapshot> = (0..8)
            .map(|i| StateSnapshot { points: i * 10, ..StateSnapshot::default() })
            .collect();

        std::thread::scope(|scope| {
            for snap in &snapshots {
                let path = &path;
                scope.spawn(move || {
                    for _ in 0..20 {
                        write_snapshot(path, snap).unwrap();
                    }
                });
            }
        });

        let last = read_snapshot(&path).unwrap().unwrap();
        assert!(snapshots.contains(&last));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn corrupt_state_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        let err = read_snapshot(&path).unwrap_err();
        assert!(format!("{err:#}").contains("state.json"));
    }
}
