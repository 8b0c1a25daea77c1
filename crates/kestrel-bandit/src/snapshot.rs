//! Durable arm-table snapshots: JSON written to a temp file then atomically
//! renamed into place, so a crash mid-write never corrupts the snapshot.

use std::fs;
use std::io;
use std::path::Path;

use crate::Arm;

pub fn save(path: &Path, arms: &[Arm]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(arms)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}

/// Returns `Ok(None)` when no snapshot exists yet.
pub fn load(path: &Path) -> io::Result<Option<Vec<Arm>>> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let arms = serde_json::from_str(&text)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok(Some(arms))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arm_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");

        let arms = vec![Arm {
            genome_id: "g1".into(),
            alpha: 3.5,
            beta: 1.5,
            pulls: 3,
            reward_sum: 2.5,
        }];
        save(&path, &arms).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].genome_id, "g1");
        assert_eq!(loaded[0].pulls, 3);
    }

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_err());
    }
}
