//! Snapshot lifecycle: eject to portable file, hydrate from file
//!
//! The snapshot file is a human-readable ordered record file (YAML): one
//! record per Compound, carrying exactly seven fields
//! (`id, timestamp, content, source, type, hash, buckets`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::{Compound, Provenance};
use crate::store::Store;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_yaml::Error),
    #[error("no backup files found")]
    NoBackups,
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// One record in a snapshot file - the lossless seven-field round-trip
/// unit. `content` here is the compound body; `type` mirrors the
/// compound's provenance so hydrate can rebuild it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    pub timestamp: i64,
    pub content: String,
    pub source: String,
    #[serde(rename = "type")]
    pub provenance: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub buckets: Option<Vec<String>>,
}

impl From<&Compound> for SnapshotRecord {
    fn from(c: &Compound) -> Self {
        Self {
            id: c.id.clone(),
            timestamp: c.timestamp,
            content: c.compound_body.clone(),
            source: c.path.clone(),
            provenance: c.provenance.to_string(),
            hash: Some(c.hash.clone()),
            buckets: Some(c.buckets.clone()),
        }
    }
}

impl SnapshotRecord {
    /// Resolve into a full Compound, backfilling `hash` and `buckets`
    /// when a record was produced by a leaner writer.
    fn into_compound(self) -> Compound {
        let hash = self.hash.unwrap_or_else(|| format!("{:x}", md5::compute(self.content.as_bytes())));
        let buckets = self.buckets.filter(|b| !b.is_empty()).unwrap_or_else(|| vec!["core".to_string()]);
        let provenance: Provenance = self.provenance.parse().unwrap_or(Provenance::Internal);
        Compound {
            id: self.id,
            path: self.source,
            timestamp: self.timestamp,
            hash,
            compound_body: self.content,
            provenance,
            molecular_signature: 0,
            buckets,
        }
    }
}

fn timestamped_backup_path(backups_dir: &Path, now_millis: i64) -> PathBuf {
    backups_dir.join(format!("cozo_memory_snapshot_{now_millis}.yaml"))
}

/// Dump every compound to a timestamped file under `backups_dir`,
/// returning the path written.
pub fn eject(store: &Store, backups_dir: &Path, now_millis: i64) -> Result<PathBuf> {
    std::fs::create_dir_all(backups_dir)?;
    let compounds = store.snapshot_dump()?;
    let records: Vec<SnapshotRecord> = compounds.iter().map(SnapshotRecord::from).collect();
    let yaml = serde_yaml::to_string(&records)?;

    let path = timestamped_backup_path(backups_dir, now_millis);
    std::fs::write(&path, yaml)?;
    Ok(path)
}

/// Hydrate the store from an explicit snapshot file, bypassing dedup.
/// Progress is logged per record; a single record failure is logged and
/// skipped rather than aborting the whole hydrate.
pub fn hydrate_from_file(store: &Store, path: &Path) -> Result<usize> {
    let text = std::fs::read_to_string(path)?;
    let records: Vec<SnapshotRecord> = serde_yaml::from_str(&text)?;
    let total = records.len();
    let mut loaded = 0;

    for (idx, record) in records.into_iter().enumerate() {
        let compound = record.into_compound();
        match store.transaction(|tx| store.put_compound(tx, &compound)) {
            Ok(()) => loaded += 1,
            Err(err) => tracing::warn!(index = idx, error = %err, "failed to hydrate snapshot record"),
        }
    }

    tracing::info!(loaded, total, path = %path.display(), "snapshot hydrate complete");
    Ok(loaded)
}

/// Pick the newest backup file under `backups_dir` by modification time.
fn newest_backup(backups_dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    if backups_dir.is_dir() {
        for entry in std::fs::read_dir(backups_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let modified = entry.metadata()?.modified().unwrap_or(std::time::UNIX_EPOCH);
            candidates.push((modified, path));
        }
    }
    candidates.sort_by_key(|(mtime, _)| *mtime);
    candidates.pop().map(|(_, path)| path).ok_or(SnapshotError::NoBackups)
}

/// Boot-time auto-hydration policy: skip if the store
/// is already non-empty; otherwise hydrate from the newest backup if one
/// exists. Returns `None` when no hydration happened.
pub fn auto_hydrate(store: &Store, backups_dir: &Path) -> Result<Option<usize>> {
    if !store.is_empty()? {
        return Ok(None);
    }
    match newest_backup(backups_dir) {
        Ok(path) => Ok(Some(hydrate_from_file(store, &path)?)),
        Err(SnapshotError::NoBackups) => Ok(None),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_content;
    use tempfile::tempdir;

    #[test]
    fn eject_then_hydrate_round_trips_compound_body() {
        let source_store = Store::open_in_memory().unwrap();
        ingest_content(&source_store, "The ECE stores memory in a graph.", "a.md", Provenance::Internal, vec!["notes".into()]).unwrap();
        ingest_content(&source_store, "Second document body here.", "b.md", Provenance::Internal, vec!["notes".into()]).unwrap();

        let dir = tempdir().unwrap();
        let path = eject(&source_store, dir.path(), 1_700_000_000_000).unwrap();

        let target_store = Store::open_in_memory().unwrap();
        let loaded = hydrate_from_file(&target_store, &path).unwrap();
        assert_eq!(loaded, 2);

        let original_bodies: std::collections::HashSet<_> =
            source_store.snapshot_dump().unwrap().into_iter().map(|c| c.compound_body).collect();
        let restored_bodies: std::collections::HashSet<_> =
            target_store.snapshot_dump().unwrap().into_iter().map(|c| c.compound_body).collect();
        assert_eq!(original_bodies, restored_bodies);
    }

    #[test]
    fn auto_hydrate_skips_when_store_non_empty() {
        let store = Store::open_in_memory().unwrap();
        ingest_content(&store, "already has content", "a.md", Provenance::Internal, vec!["core".into()]).unwrap();
        let dir = tempdir().unwrap();
        let result = auto_hydrate(&store, dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn auto_hydrate_picks_newest_backup_when_empty() {
        let store = Store::open_in_memory().unwrap();
        let dir = tempdir().unwrap();

        let seed_store = Store::open_in_memory().unwrap();
        ingest_content(&seed_store, "first backup content", "a.md", Provenance::Internal, vec!["core".into()]).unwrap();
        eject(&seed_store, dir.path(), 1000).unwrap();

        ingest_content(&seed_store, "second backup content", "b.md", Provenance::Internal, vec!["core".into()]).unwrap();
        eject(&seed_store, dir.path(), 2000).unwrap();

        let loaded = auto_hydrate(&store, dir.path()).unwrap();
        assert_eq!(loaded, Some(2));
    }

    #[test]
    fn missing_hash_and_buckets_backfill_on_hydrate() {
        let dir = tempdir().unwrap();
        let records = vec![SnapshotRecord {
            id: "abc".to_string(),
            timestamp: 123,
            content: "bare minimum record".to_string(),
            source: "bare.md".to_string(),
            provenance: "internal".to_string(),
            hash: None,
            buckets: None,
        }];
        let path = dir.path().join("manual.yaml");
        std::fs::write(&path, serde_yaml::to_string(&records).unwrap()).unwrap();

        let store = Store::open_in_memory().unwrap();
        hydrate_from_file(&store, &path).unwrap();

        let compound = store.get_compound("abc").unwrap().unwrap();
        assert_eq!(compound.buckets, vec!["core".to_string()]);
        assert_eq!(compound.hash, format!("{:x}", md5::compute(b"bare minimum record")));
    }
}
