//! SQLite-backed store implementation
//!
//! Typed relation API over `rusqlite` + its bundled SQLite's
//! FTS5 module. A separate reader connection from the writer means
//! readers never block behind a long-running writer transaction.

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::model::{Atom, AtomEdge, AtomType, Compound, Engram, Molecule, MoleculeType, Provenance, SessionState, SESSION_STATE_ID};

use super::migrations::apply_migrations;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("initialization error: {0}")]
    Init(String),
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A single FTS hit: `(molecule_id, bm25-derived score)`.
#[derive(Debug, Clone)]
pub struct FtsHit {
    pub molecule_id: String,
    pub score: f64,
}

/// The embedded store: one SQLite database holding every compound,
/// molecule, atom, edge, engram, and session-state relation, plus the
/// FTS5 shadow index over molecule content.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Store {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (creating if needed) the store at `db_path`, idempotently
    /// verifying/creating relations and the FTS index.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer_conn = Connection::open(db_path)?;
        Self::configure_connection(&writer_conn)?;
        apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(db_path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// In-memory store, primarily for tests.
    ///
    /// A plain `Connection::open_in_memory()` for both handles would give
    /// the writer and the reader two distinct, unconnected databases - so
    /// instead both connections open the same SQLite shared-cache
    /// in-memory database (a process-unique URI name keeps concurrent
    /// tests from colliding with each other).
    pub fn open_in_memory() -> Result<Self> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!("file:engine_core_mem_{id}?mode=memory&cache=shared");
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI;

        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&writer_conn)?;
        apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::Poisoned("writer connection".into()))
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StoreError::Poisoned("reader connection".into()))
    }

    /// Run `body` inside a single SQLite transaction against the writer
    /// connection. All mutations inside must succeed or none commit.
    pub fn transaction<T>(&self, body: impl FnOnce(&rusqlite::Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.writer()?;
        let tx = conn.transaction()?;
        let result = body(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Compounds
    // ------------------------------------------------------------------

    pub fn put_compound(&self, tx: &rusqlite::Transaction, compound: &Compound) -> Result<()> {
        let buckets_json = serde_json::to_string(&compound.buckets).map_err(|e| StoreError::Serde(e.to_string()))?;
        tx.execute(
            "INSERT INTO compounds (id, path, timestamp, hash, compound_body, provenance, molecular_signature, buckets)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
               path = excluded.path,
               timestamp = excluded.timestamp,
               hash = excluded.hash,
               compound_body = excluded.compound_body,
               provenance = excluded.provenance,
               molecular_signature = excluded.molecular_signature,
               buckets = excluded.buckets",
            params![
                compound.id,
                compound.path,
                compound.timestamp,
                compound.hash,
                compound.compound_body,
                compound.provenance.to_string(),
                compound.molecular_signature as i64,
                buckets_json,
            ],
        )?;
        Ok(())
    }

    fn row_to_compound(row: &rusqlite::Row) -> rusqlite::Result<Compound> {
        let provenance_str: String = row.get("provenance")?;
        let buckets_str: String = row.get("buckets")?;
        let signature: i64 = row.get("molecular_signature")?;
        Ok(Compound {
            id: row.get("id")?,
            path: row.get("path")?,
            timestamp: row.get("timestamp")?,
            hash: row.get("hash")?,
            compound_body: row.get("compound_body")?,
            provenance: provenance_str.parse().unwrap_or(Provenance::Internal),
            molecular_signature: signature as u64,
            buckets: serde_json::from_str(&buckets_str).unwrap_or_else(|_| vec!["core".to_string()]),
        })
    }

    pub fn get_compound(&self, id: &str) -> Result<Option<Compound>> {
        let reader = self.reader()?;
        reader
            .query_row("SELECT * FROM compounds WHERE id = ?1", params![id], Self::row_to_compound)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn find_compound_by_hash(&self, hash: &str) -> Result<Option<Compound>> {
        let reader = self.reader()?;
        reader
            .query_row("SELECT * FROM compounds WHERE hash = ?1", params![hash], Self::row_to_compound)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn find_compound_by_path(&self, path: &str) -> Result<Option<Compound>> {
        let reader = self.reader()?;
        reader
            .query_row("SELECT * FROM compounds WHERE path = ?1", params![path], Self::row_to_compound)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn delete_compound(&self, tx: &rusqlite::Transaction, id: &str) -> Result<()> {
        tx.execute("DELETE FROM compounds WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Finite, single-shot scan over every compound, filtered in-process.
    pub fn scan_compounds(&self, predicate: impl Fn(&Compound) -> bool) -> Result<Vec<Compound>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM compounds")?;
        let rows = stmt.query_map([], Self::row_to_compound)?;
        let mut out = Vec::new();
        for row in rows {
            let compound = row?;
            if predicate(&compound) {
                out.push(compound);
            }
        }
        Ok(out)
    }

    pub fn count_compounds(&self) -> Result<i64> {
        let reader = self.reader()?;
        reader
            .query_row("SELECT COUNT(*) FROM compounds", [], |row| row.get(0))
            .map_err(StoreError::from)
    }

    // ------------------------------------------------------------------
    // Molecules
    // ------------------------------------------------------------------

    pub fn put_molecule(&self, tx: &rusqlite::Transaction, molecule: &Molecule) -> Result<()> {
        let tags_json = serde_json::to_string(&molecule.tags).map_err(|e| StoreError::Serde(e.to_string()))?;
        tx.execute(
            "INSERT INTO molecules (id, compound_id, sequence, start_byte, end_byte, content, molecule_type, tags, molecular_signature)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
               compound_id = excluded.compound_id,
               sequence = excluded.sequence,
               start_byte = excluded.start_byte,
               end_byte = excluded.end_byte,
               content = excluded.content,
               molecule_type = excluded.molecule_type,
               tags = excluded.tags,
               molecular_signature = excluded.molecular_signature",
            params![
                molecule.id,
                molecule.compound_id,
                molecule.sequence,
                molecule.start_byte as i64,
                molecule.end_byte as i64,
                molecule.content,
                molecule.molecule_type.to_string(),
                tags_json,
                molecule.molecular_signature as i64,
            ],
        )?;
        Ok(())
    }

    pub fn put_molecules(&self, tx: &rusqlite::Transaction, molecules: &[Molecule]) -> Result<()> {
        for molecule in molecules {
            self.put_molecule(tx, molecule)?;
        }
        Ok(())
    }

    fn row_to_molecule(row: &rusqlite::Row) -> rusqlite::Result<Molecule> {
        let start: i64 = row.get("start_byte")?;
        let end: i64 = row.get("end_byte")?;
        let type_str: String = row.get("molecule_type")?;
        let tags_str: String = row.get("tags")?;
        let signature: i64 = row.get("molecular_signature")?;
        Ok(Molecule {
            id: row.get("id")?,
            compound_id: row.get("compound_id")?,
            sequence: row.get("sequence")?,
            start_byte: start as usize,
            end_byte: end as usize,
            content: row.get("content")?,
            molecule_type: type_str.parse().unwrap_or(MoleculeType::Prose),
            tags: serde_json::from_str::<BTreeSet<String>>(&tags_str).unwrap_or_default(),
            molecular_signature: signature as u64,
        })
    }

    pub fn get_molecule(&self, id: &str) -> Result<Option<Molecule>> {
        let reader = self.reader()?;
        reader
            .query_row("SELECT * FROM molecules WHERE id = ?1", params![id], Self::row_to_molecule)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn scan_molecules_by_compound(&self, compound_id: &str) -> Result<Vec<Molecule>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM molecules WHERE compound_id = ?1 ORDER BY sequence ASC")?;
        let rows = stmt.query_map(params![compound_id], Self::row_to_molecule)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn get_molecules(&self, ids: &[String]) -> Result<Vec<Molecule>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(m) = self.get_molecule(id)? {
                out.push(m);
            }
        }
        Ok(out)
    }

    pub fn scan_molecules(&self, predicate: impl Fn(&Molecule) -> bool) -> Result<Vec<Molecule>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM molecules")?;
        let rows = stmt.query_map([], Self::row_to_molecule)?;
        let mut out = Vec::new();
        for row in rows {
            let molecule = row?;
            if predicate(&molecule) {
                out.push(molecule);
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Atoms & edges
    // ------------------------------------------------------------------

    pub fn put_atom(&self, tx: &rusqlite::Transaction, atom: &Atom) -> Result<()> {
        tx.execute(
            "INSERT INTO atoms (id, label, atom_type, weight) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET label = excluded.label, atom_type = excluded.atom_type, weight = excluded.weight",
            params![atom.id, atom.label, atom.atom_type.to_string(), atom.weight],
        )?;
        Ok(())
    }

    pub fn get_atom(&self, id: &str) -> Result<Option<Atom>> {
        let reader = self.reader()?;
        reader
            .query_row("SELECT * FROM atoms WHERE id = ?1", params![id], |row| {
                let type_str: String = row.get("atom_type")?;
                Ok(Atom {
                    id: row.get("id")?,
                    label: row.get("label")?,
                    atom_type: type_str.parse().unwrap_or(AtomType::Concept),
                    weight: row.get("weight")?,
                })
            })
            .optional()
            .map_err(StoreError::from)
    }

    pub fn put_atom_edge(&self, tx: &rusqlite::Transaction, edge: &AtomEdge) -> Result<()> {
        tx.execute(
            "INSERT INTO atom_edges (from_id, to_id, weight, relation) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(from_id, to_id) DO UPDATE SET weight = excluded.weight, relation = excluded.relation",
            params![edge.from_id, edge.to_id, edge.weight, edge.relation],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Engrams
    // ------------------------------------------------------------------

    pub fn put_engram(&self, tx: &rusqlite::Transaction, engram: &Engram) -> Result<()> {
        let ids_json = serde_json::to_string(&engram.molecule_ids).map_err(|e| StoreError::Serde(e.to_string()))?;
        tx.execute(
            "INSERT INTO engrams (key_digest, molecule_ids) VALUES (?1, ?2)
             ON CONFLICT(key_digest) DO UPDATE SET molecule_ids = excluded.molecule_ids",
            params![engram.key_digest, ids_json],
        )?;
        Ok(())
    }

    pub fn get_engram(&self, key_digest: &str) -> Result<Option<Engram>> {
        let reader = self.reader()?;
        reader
            .query_row(
                "SELECT key_digest, molecule_ids FROM engrams WHERE key_digest = ?1",
                params![key_digest],
                |row| {
                    let ids_str: String = row.get("molecule_ids")?;
                    Ok(Engram {
                        key_digest: row.get("key_digest")?,
                        molecule_ids: serde_json::from_str(&ids_str).unwrap_or_default(),
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
    }

    // ------------------------------------------------------------------
    // Session state
    // ------------------------------------------------------------------

    pub fn get_session_state(&self) -> Result<Option<SessionState>> {
        let reader = self.reader()?;
        reader
            .query_row(
                "SELECT summary, updated_at FROM session_state WHERE id = ?1",
                params![SESSION_STATE_ID],
                |row| {
                    Ok(SessionState {
                        summary: row.get("summary")?,
                        updated_at: row.get("updated_at")?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn put_session_state(&self, state: &SessionState) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO session_state (id, summary, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET summary = excluded.summary, updated_at = excluded.updated_at",
            params![SESSION_STATE_ID, state.summary, state.updated_at],
        )?;
        Ok(())
    }

    pub fn clear_session_state(&self) -> Result<()> {
        let writer = self.writer()?;
        writer.execute("DELETE FROM session_state WHERE id = ?1", params![SESSION_STATE_ID])?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Full-text search
    // ------------------------------------------------------------------

    /// BM25-ranked lexical search over molecule content. The caller is
    /// expected to have already sanitized `query` (strip
    /// non-alphanumeric-non-space characters, lower-case).
    pub fn fts_search(&self, sanitized_query: &str, k: usize) -> Result<Vec<FtsHit>> {
        if sanitized_query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT molecules.id AS id, bm25(molecules_fts) AS rank
             FROM molecules_fts
             JOIN molecules ON molecules.rowid = molecules_fts.rowid
             WHERE molecules_fts MATCH ?1
             ORDER BY rank ASC
             LIMIT ?2",
        )?;

        let match_query = fts5_match_expression(sanitized_query);
        let rows = stmt.query_map(params![match_query, k as i64], |row| {
            let id: String = row.get("id")?;
            let rank: f64 = row.get("rank")?;
            // bm25() returns a negative number that grows more negative as
            // relevance improves; invert so higher is better.
            Ok(FtsHit { molecule_id: id, score: -rank })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Every compound, in a stable id order, ready to serialize for
    /// ejection.
    pub fn snapshot_dump(&self) -> Result<Vec<Compound>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM compounds ORDER BY id ASC")?;
        let rows = stmt.query_map([], Self::row_to_compound)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    /// Load compounds from a snapshot, bypassing dedup - records already
    /// carry their original id/hash/timestamp.
    pub fn snapshot_load(&self, compounds: impl IntoIterator<Item = Compound>) -> Result<usize> {
        let mut loaded = 0;
        self.transaction(|tx| {
            for compound in compounds {
                self.put_compound(tx, &compound)?;
                loaded += 1;
            }
            Ok(())
        })?;
        Ok(loaded)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count_compounds()? == 0)
    }
}

/// Build an FTS5 MATCH expression that ORs together the sanitized query's
/// tokens, so a multi-word query behaves as "any of these terms", matching
/// the Tag-Walker's keyword-union search contract.
fn fts5_match_expression(sanitized_query: &str) -> String {
    sanitized_query
        .split_whitespace()
        .map(|tok| format!("\"{}\"", tok.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MoleculeType;

    fn sample_compound(id: &str, path: &str, hash: &str) -> Compound {
        Compound {
            id: id.to_string(),
            path: path.to_string(),
            timestamp: now_millis(),
            hash: hash.to_string(),
            compound_body: "The ECE stores memory in a graph.".to_string(),
            provenance: Provenance::Internal,
            molecular_signature: 0,
            buckets: vec!["core".to_string()],
        }
    }

    #[test]
    fn put_and_get_compound_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let compound = sample_compound("c1", "a.md", "h1");
        store.transaction(|tx| store.put_compound(tx, &compound)).unwrap();

        let fetched = store.get_compound("c1").unwrap().unwrap();
        assert_eq!(fetched.path, "a.md");
        assert_eq!(fetched.buckets, vec!["core"]);
    }

    #[test]
    fn dedup_lookup_by_hash() {
        let store = Store::open_in_memory().unwrap();
        let compound = sample_compound("c1", "a.md", "samehash");
        store.transaction(|tx| store.put_compound(tx, &compound)).unwrap();

        let found = store.find_compound_by_hash("samehash").unwrap();
        assert!(found.is_some());
        assert!(store.find_compound_by_hash("nope").unwrap().is_none());
    }

    #[test]
    fn fts_search_finds_molecule_by_keyword() {
        let store = Store::open_in_memory().unwrap();
        let compound = sample_compound("c1", "a.md", "h1");
        store.transaction(|tx| store.put_compound(tx, &compound)).unwrap();

        let molecule = Molecule {
            id: "c1:0".to_string(),
            compound_id: "c1".to_string(),
            sequence: 0,
            start_byte: 0,
            end_byte: compound.compound_body.len(),
            content: compound.compound_body.clone(),
            molecule_type: MoleculeType::Prose,
            tags: Default::default(),
            molecular_signature: 0,
        };
        store.transaction(|tx| store.put_molecule(tx, &molecule)).unwrap();

        let hits = store.fts_search("ece", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].molecule_id, "c1:0");
    }

    #[test]
    fn snapshot_round_trips_compounds() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..3 {
            let compound = sample_compound(&format!("c{i}"), &format!("f{i}.md"), &format!("h{i}"));
            store.transaction(|tx| store.put_compound(tx, &compound)).unwrap();
        }

        let dumped = store.snapshot_dump().unwrap();
        assert_eq!(dumped.len(), 3);

        let fresh = Store::open_in_memory().unwrap();
        let loaded = fresh.snapshot_load(dumped.clone()).unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(fresh.snapshot_dump().unwrap().len(), 3);
    }
}
