use serde::{Deserialize, Serialize};

/// An O(1) lexical sidecar: `key_digest -> list of memory ids`.
/// Engrams are a latency optimization, not a correctness source - they may
/// be stale relative to the authoritative FTS/graph path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engram {
    pub key_digest: String,
    pub molecule_ids: Vec<String>,
}

impl Engram {
    /// Digest of the normalized lookup key. Reuses the MD5 digest already
    /// used for content hashing - non-security use, purely for identity.
    pub fn digest(normalized_key: &str) -> String {
        format!("{:x}", md5::compute(normalized_key.as_bytes()))
    }
}
