use serde::{Deserialize, Serialize};

/// Trust class of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Internal,
    External,
    Quarantine,
}

impl Default for Provenance {
    fn default() -> Self {
        Self::Internal
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Internal => write!(f, "internal"),
            Provenance::External => write!(f, "external"),
            Provenance::Quarantine => write!(f, "quarantine"),
        }
    }
}

impl std::str::FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "internal" => Ok(Provenance::Internal),
            "external" => Ok(Provenance::External),
            "quarantine" => Ok(Provenance::Quarantine),
            other => Err(format!("unknown provenance: {other}")),
        }
    }
}

/// An ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compound {
    /// Stable id derived from the canonical path (base32 of the relative path).
    pub id: String,
    /// Relative path under the watched root, or the caller-supplied source
    /// for direct ingests.
    pub path: String,
    /// Millisecond ingest time.
    pub timestamp: i64,
    /// Content digest (MD5; not a security property).
    pub hash: String,
    /// Full sanitized text. The single source of truth for a document's
    /// text - molecule `content` is a redundant copy re-sliced from here.
    pub compound_body: String,
    pub provenance: Provenance,
    /// SimHash-style fingerprint of the whole body.
    pub molecular_signature: u64,
    /// Non-empty ordered list of bucket tags; first element is the
    /// top-level folder, default `["core"]`.
    pub buckets: Vec<String>,
}

impl Compound {
    pub fn byte_len(&self) -> usize {
        self.compound_body.len()
    }

    /// `buckets` must be non-empty; valid provenance is already
    /// guaranteed by the type system, so this only checks bucket emptiness.
    pub fn validate(&self) -> Result<(), String> {
        if self.buckets.is_empty() {
            return Err("buckets must be non-empty".to_string());
        }
        Ok(())
    }
}
