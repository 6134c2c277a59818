//! Database migrations
//!
//! Schema migration definitions for the store. Applying the same migration
//! twice is a no-op ("already exists" is not treated as an error).

/// Migration definitions, applied in order on boot.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: compounds, molecules, atoms, atom_edges, engrams, session_state",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "FTS5 full-text index over molecule content",
        up: MIGRATION_V2_UP,
    },
];

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS compounds (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    hash TEXT NOT NULL,
    compound_body TEXT NOT NULL,
    provenance TEXT NOT NULL DEFAULT 'internal',
    molecular_signature INTEGER NOT NULL DEFAULT 0,
    buckets TEXT NOT NULL DEFAULT '["core"]'
);

CREATE INDEX IF NOT EXISTS idx_compounds_hash ON compounds(hash);
CREATE INDEX IF NOT EXISTS idx_compounds_path ON compounds(path);
CREATE INDEX IF NOT EXISTS idx_compounds_timestamp ON compounds(timestamp);

CREATE TABLE IF NOT EXISTS molecules (
    id TEXT PRIMARY KEY,
    compound_id TEXT NOT NULL REFERENCES compounds(id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    start_byte INTEGER NOT NULL,
    end_byte INTEGER NOT NULL,
    content TEXT NOT NULL,
    molecule_type TEXT NOT NULL DEFAULT 'prose',
    tags TEXT NOT NULL DEFAULT '[]',
    molecular_signature INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_molecules_compound ON molecules(compound_id, sequence);

CREATE TABLE IF NOT EXISTS atoms (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    atom_type TEXT NOT NULL DEFAULT 'concept',
    weight REAL NOT NULL DEFAULT 0.5
);

CREATE TABLE IF NOT EXISTS atom_edges (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    relation TEXT NOT NULL DEFAULT 'co_occurs',
    PRIMARY KEY (from_id, to_id)
);

CREATE TABLE IF NOT EXISTS engrams (
    key_digest TEXT PRIMARY KEY,
    molecule_ids TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS session_state (
    id TEXT PRIMARY KEY,
    summary TEXT NOT NULL DEFAULT '',
    updated_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// External-content FTS5 index over `molecules.content`, kept in sync with
/// triggers. No stemming (plain unicode61 tokenizer) - lexical search
/// stays a simple whitespace/lower-casing filter, not a stemmer.
const MIGRATION_V2_UP: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS molecules_fts USING fts5(
    id,
    content,
    content='molecules',
    content_rowid='rowid',
    tokenize='unicode61'
);

CREATE TRIGGER IF NOT EXISTS molecules_ai AFTER INSERT ON molecules BEGIN
    INSERT INTO molecules_fts(rowid, id, content)
    VALUES (NEW.rowid, NEW.id, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS molecules_ad AFTER DELETE ON molecules BEGIN
    INSERT INTO molecules_fts(molecules_fts, rowid, id, content)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS molecules_au AFTER UPDATE ON molecules BEGIN
    INSERT INTO molecules_fts(molecules_fts, rowid, id, content)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content);
    INSERT INTO molecules_fts(rowid, id, content)
    VALUES (NEW.rowid, NEW.id, NEW.content);
END;

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |_| Ok(true),
        )
        .unwrap_or(false);

    if !exists {
        return Ok(0);
    }

    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<u32>>(0)
    })
    .map(|v| v.unwrap_or(0))
}

/// Apply any migration whose version exceeds the current schema version.
/// Safe to call on every boot; "already exists" is not an error.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "applying store migration"
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
