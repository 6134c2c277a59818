use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A molecule's coarse content class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoleculeType {
    Prose,
    Code,
    Data,
}

impl std::fmt::Display for MoleculeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoleculeType::Prose => write!(f, "prose"),
            MoleculeType::Code => write!(f, "code"),
            MoleculeType::Data => write!(f, "data"),
        }
    }
}

impl std::str::FromStr for MoleculeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prose" => Ok(MoleculeType::Prose),
            "code" => Ok(MoleculeType::Code),
            "data" => Ok(MoleculeType::Data),
            other => Err(format!("unknown molecule type: {other}")),
        }
    }
}

/// A sentence, statement, or semantically coherent span within a Compound
///. `start_byte`/`end_byte` are a half-open range into the
/// owning Compound's `compound_body`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Molecule {
    /// Derived from `(compound_id, sequence)`.
    pub id: String,
    pub compound_id: String,
    /// 0-based position within the compound.
    pub sequence: i64,
    pub start_byte: usize,
    pub end_byte: usize,
    /// `compound_body[start_byte..end_byte)`. Stored for FTS; the compound
    /// body remains the authoritative source.
    pub content: String,
    #[serde(rename = "type")]
    pub molecule_type: MoleculeType,
    pub tags: BTreeSet<String>,
    pub molecular_signature: u64,
}

impl Molecule {
    pub fn derive_id(compound_id: &str, sequence: i64) -> String {
        format!("{compound_id}:{sequence}")
    }

    /// The byte range must lie inside the compound body.
    pub fn validate(&self, compound_len: usize) -> Result<(), String> {
        if !(self.start_byte < self.end_byte && self.end_byte <= compound_len) {
            return Err(format!(
                "molecule {} has invalid byte range [{}, {}) for compound of length {}",
                self.id, self.start_byte, self.end_byte, compound_len
            ));
        }
        Ok(())
    }
}
