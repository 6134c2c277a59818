//! Atomizer: document -> Compound + Molecules + Atoms
//!
//! The atomizer is pure with respect to its inputs: re-atomizing the same
//! bytes produces the same compound id, molecule ids, byte coordinates,
//! and signatures every time.

mod atoms;
mod sanitize;
mod signature;
mod split;

pub use atoms::extract_atoms;
pub use sanitize::sanitize_body;
pub use signature::simhash64;
pub use split::split_molecules;

use crate::model::{Atom, AtomEdge, Compound, Molecule, MoleculeType, Provenance};

#[derive(Debug, thiserror::Error)]
pub enum AtomizerError {
    #[error("empty content after sanitization")]
    EmptyContent,
    #[error("buckets must be non-empty")]
    EmptyBuckets,
}

pub type Result<T> = std::result::Result<T, AtomizerError>;

/// The fully decomposed output of atomizing one document.
#[derive(Debug)]
pub struct AtomizedDocument {
    pub compound: Compound,
    pub molecules: Vec<Molecule>,
    pub atoms: Vec<Atom>,
    pub edges: Vec<AtomEdge>,
}

/// Decompose `raw_content` into a Compound/Molecule/Atom triple.
///
/// `id` and `timestamp` are supplied by the caller (the Ingestor derives
/// `id` from the path; `timestamp` is the ingest clock reading) so that
/// this function stays pure and deterministic given identical inputs.
pub fn atomize(
    id: String,
    path: String,
    timestamp: i64,
    raw_content: &str,
    provenance: Provenance,
    buckets: Vec<String>,
) -> Result<AtomizedDocument> {
    if buckets.is_empty() {
        return Err(AtomizerError::EmptyBuckets);
    }

    let compound_body = sanitize_body(raw_content);
    if compound_body.is_empty() {
        return Err(AtomizerError::EmptyContent);
    }

    let hash = format!("{:x}", md5::compute(compound_body.as_bytes()));
    let compound_signature = simhash64(&compound_body);

    let molecule_type = guess_molecule_type(&path, &compound_body);
    let spans = split_molecules(&compound_body, molecule_type);

    let mut molecules = Vec::with_capacity(spans.len());
    let mut atoms_by_id = std::collections::HashMap::new();
    let mut edges = Vec::new();

    for (sequence, span) in spans.into_iter().enumerate() {
        let content = compound_body[span.start..span.end].to_string();
        let extracted = extract_atoms(&content);
        let mut tags = std::collections::BTreeSet::new();

        for atom in &extracted {
            tags.insert(atom.label.clone());
            atoms_by_id.entry(atom.id.clone()).or_insert_with(|| atom.clone());
        }

        for pair in extracted.windows(2) {
            edges.push(AtomEdge {
                from_id: pair[0].id.clone(),
                to_id: pair[1].id.clone(),
                weight: 1.0,
                relation: "co_occurs".to_string(),
            });
        }

        let molecule_signature = simhash64(&content);
        molecules.push(Molecule {
            id: Molecule::derive_id(&id, sequence as i64),
            compound_id: id.clone(),
            sequence: sequence as i64,
            start_byte: span.start,
            end_byte: span.end,
            content,
            molecule_type: span.molecule_type,
            tags,
            molecular_signature: molecule_signature,
        });
    }

    let compound = Compound {
        id,
        path,
        timestamp,
        hash,
        compound_body,
        provenance,
        molecular_signature: compound_signature,
        buckets,
    };

    Ok(AtomizedDocument {
        compound,
        molecules,
        atoms: atoms_by_id.into_values().collect(),
        edges,
    })
}

/// Best-effort source-type guess used to pick a splitting strategy (spec
/// §4.B): fenced/indented text and known code extensions split as code,
/// YAML/JSON-looking bodies split as data, everything else is prose.
fn guess_molecule_type(path: &str, body: &str) -> MoleculeType {
    let code_extensions = [
        ".js", ".ts", ".py", ".rs", ".html", ".css", ".sh", ".bat", ".ps1",
    ];
    if code_extensions.iter().any(|ext| path.ends_with(ext)) {
        return MoleculeType::Code;
    }

    let data_extensions = [".json", ".yaml", ".yml"];
    if data_extensions.iter().any(|ext| path.ends_with(ext)) {
        return MoleculeType::Data;
    }

    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return MoleculeType::Data;
    }

    MoleculeType::Prose
}
