//! Ingestor
//!
//! Deduplicates by content hash, assigns stable path-derived ids, maps
//! the top-level folder to a bucket, and persists through the Store.

mod watcher;

pub use watcher::{IngestionEvent, IngestionEventKind, Watcher, WatcherConfig};

use std::path::Path;

use crate::atomizer::atomize;
use crate::config::EngineConfig;
use crate::model::Provenance;
use crate::store::Store;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("empty content")]
    EmptyContent,
    #[error("buckets must be non-empty")]
    EmptyBuckets,
    #[error("file too large: {0} bytes exceeds cap of {1} bytes")]
    TooLarge(u64, u64),
    #[error("extension not allowed: {0}")]
    ExtensionNotAllowed(String),
    #[error(transparent)]
    Atomizer(#[from] crate::atomizer::AtomizerError),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Extensions the watcher/backfill will ingest. An empty string matches
/// extensionless files.
const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "yaml", "yml", "js", "ts", "py", "html", "css", "bat", "ps1", "sh", "",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    Inserted,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    pub id: String,
}

/// Path-stable compound id: base32 of the relative path, so re-ingesting
/// the same path always targets the same row.
pub fn derive_compound_id(relative_path: &str) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, relative_path.as_bytes())
}

/// First path segment under the watched root becomes the bucket; root-level
/// files fall back to `["core"]`.
pub fn buckets_from_path(relative_path: &str) -> Vec<String> {
    let mut components = Path::new(relative_path).components();
    match components.next() {
        Some(std::path::Component::Normal(first)) if components.next().is_some() => {
            vec![first.to_string_lossy().into_owned()]
        }
        _ => vec!["core".to_string()],
    }
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn check_extension_allowed(path: &str) -> Result<()> {
    let ext = extension_of(path);
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(IngestError::ExtensionNotAllowed(ext))
    }
}

/// Read, size-cap, and extension-check `path` (relative to the watched
/// root) before routing it through [`ingest_content`].
pub fn ingest_file(store: &Store, config: &EngineConfig, relative_path: &str) -> Result<IngestOutcome> {
    check_extension_allowed(relative_path)?;

    let full_path = config.watched_dir.join(relative_path);
    let metadata = std::fs::metadata(&full_path)?;
    if metadata.len() > config.max_file_bytes {
        return Err(IngestError::TooLarge(metadata.len(), config.max_file_bytes));
    }

    let content = std::fs::read_to_string(&full_path)?;
    let buckets = buckets_from_path(relative_path);

    ingest_content(store, &content, relative_path, Provenance::Internal, buckets)
}

/// Direct-ingest API form: caller supplies content, a source label, and
/// an optional bucket list (defaulting to `["core"]`).
pub fn ingest_content(
    store: &Store,
    content: &str,
    source: &str,
    provenance: Provenance,
    buckets: Vec<String>,
) -> Result<IngestOutcome> {
    if content.trim().is_empty() {
        return Err(IngestError::EmptyContent);
    }
    let buckets = if buckets.is_empty() {
        vec!["core".to_string()]
    } else {
        buckets
    };

    let candidate_hash = format!("{:x}", md5::compute(crate::atomizer::sanitize_body(content).as_bytes()));
    if let Some(existing) = store.find_compound_by_hash(&candidate_hash)? {
        return Ok(IngestOutcome {
            status: IngestStatus::Skipped,
            id: existing.id,
        });
    }

    let id = derive_compound_id(source);
    let timestamp = crate::store::now_millis();

    let doc = atomize(id.clone(), source.to_string(), timestamp, content, provenance, buckets)?;

    store.transaction(|tx| {
        store.delete_compound(tx, &id)?;
        store.put_compound(tx, &doc.compound)?;
        store.put_molecules(tx, &doc.molecules)?;
        for atom in &doc.atoms {
            store.put_atom(tx, atom)?;
        }
        for edge in &doc.edges {
            store.put_atom_edge(tx, edge)?;
        }
        Ok(())
    })?;

    let engram = crate::model::Engram {
        key_digest: crate::model::Engram::digest(&normalize_lookup_key(source)),
        molecule_ids: doc.molecules.iter().map(|m| m.id.clone()).collect(),
    };
    store.transaction(|tx| store.put_engram(tx, &engram))?;

    Ok(IngestOutcome {
        status: IngestStatus::Inserted,
        id,
    })
}

fn normalize_lookup_key(source: &str) -> String {
    source.trim().to_lowercase()
}

/// Deduplicated, lex-sorted bucket labels across every stored compound;
/// `["core"]` when the store holds nothing yet.
pub fn list_buckets(store: &Store) -> Result<Vec<String>> {
    let compounds = store.scan_compounds(|_| true)?;
    let mut set = std::collections::BTreeSet::new();
    for compound in &compounds {
        for bucket in &compound.buckets {
            set.insert(bucket.clone());
        }
    }
    if set.is_empty() {
        set.insert("core".to_string());
    }
    Ok(set.into_iter().collect())
}

/// Re-tag compounds stuck in the default bucket: anything with
/// `buckets == ["core"]` or empty gets reclassified from its path.
pub fn dream(store: &Store) -> Result<usize> {
    let candidates = store.scan_compounds(|c| c.buckets.is_empty() || c.buckets == vec!["core".to_string()])?;
    let mut retagged = 0;
    for mut compound in candidates {
        let new_buckets = buckets_from_path(&compound.path);
        if new_buckets != compound.buckets {
            compound.buckets = new_buckets;
            store.transaction(|tx| store.put_compound(tx, &compound))?;
            retagged += 1;
        }
    }
    Ok(retagged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_from_root_file_is_core() {
        assert_eq!(buckets_from_path("a.md"), vec!["core".to_string()]);
    }

    #[test]
    fn buckets_from_nested_file_uses_first_segment() {
        assert_eq!(buckets_from_path("notes/a.md"), vec!["notes".to_string()]);
        assert_eq!(buckets_from_path("notes/sub/a.md"), vec!["notes".to_string()]);
    }

    #[test]
    fn ingest_then_reingest_identical_content_skips() {
        let store = Store::open_in_memory().unwrap();
        let first = ingest_content(
            &store,
            "The ECE stores memory in a graph.",
            "a.md",
            Provenance::Internal,
            vec!["notes".into()],
        )
        .unwrap();
        assert_eq!(first.status, IngestStatus::Inserted);

        let second = ingest_content(
            &store,
            "The ECE stores memory in a graph.",
            "a.md",
            Provenance::Internal,
            vec!["notes".into()],
        )
        .unwrap();
        assert_eq!(second.status, IngestStatus::Skipped);
        assert_eq!(second.id, first.id);
    }

    #[test]
    fn rejects_empty_content() {
        let store = Store::open_in_memory().unwrap();
        let err = ingest_content(&store, "   ", "a.md", Provenance::Internal, vec![]).unwrap_err();
        assert!(matches!(err, IngestError::EmptyContent));
    }

    #[test]
    fn buckets_defaults_to_core_when_caller_passes_empty() {
        let store = Store::open_in_memory().unwrap();
        let outcome = ingest_content(&store, "alpha beta gamma", "b.md", Provenance::Internal, vec![]).unwrap();
        let compound = store.get_compound(&outcome.id).unwrap().unwrap();
        assert_eq!(compound.buckets, vec!["core".to_string()]);
    }

    #[test]
    fn list_buckets_is_sorted_and_deduped() {
        let store = Store::open_in_memory().unwrap();
        ingest_content(&store, "one", "a.md", Provenance::Internal, vec!["zeta".into()]).unwrap();
        ingest_content(&store, "two", "b.md", Provenance::Internal, vec!["alpha".into(), "zeta".into()]).unwrap();

        let buckets = list_buckets(&store).unwrap();
        assert_eq!(buckets, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn extension_allow_list_rejects_unknown_extension() {
        assert!(check_extension_allowed("a.exe").is_err());
        assert!(check_extension_allowed("a.md").is_ok());
        assert!(check_extension_allowed("Makefile").is_ok());
    }
}
