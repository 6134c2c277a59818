//! Tag-Walker ranking pipeline

use std::collections::{BTreeSet, HashSet};

use crate::model::{Engram, Molecule};
use crate::store::Store;

use super::parser::parse_query;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvenanceMode {
    Sovereign,
    External,
    All,
}

impl std::str::FromStr for ProvenanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sovereign" => Ok(ProvenanceMode::Sovereign),
            "external" => Ok(ProvenanceMode::External),
            "all" => Ok(ProvenanceMode::All),
            other => Err(format!("unknown provenance mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub buckets: Option<Vec<String>>,
    pub scope_tags: Vec<String>,
    pub max_chars: usize,
    pub provenance: ProvenanceMode,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub molecule_id: String,
    pub compound_id: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub content: String,
    pub source: String,
    pub timestamp: i64,
    pub provenance: crate::model::Provenance,
    pub tags: BTreeSet<String>,
    pub buckets: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub partial: bool,
}

const ENGRAM_SCORE: f64 = 100.0;
const NEIGHBOR_BASE_SCORE: f64 = 50.0;
const NEIGHBOR_PER_TAG_SCORE: f64 = 10.0;

fn provenance_boost(mode: ProvenanceMode, provenance: crate::model::Provenance) -> Option<f64> {
    use crate::model::Provenance::*;
    match (mode, provenance) {
        (ProvenanceMode::Sovereign, Internal) => Some(3.0),
        (ProvenanceMode::Sovereign, External) => Some(0.5),
        (ProvenanceMode::Sovereign, Quarantine) => None,
        (ProvenanceMode::External, Internal) => Some(1.0),
        (ProvenanceMode::External, External) => Some(1.5),
        (ProvenanceMode::External, Quarantine) => None,
        (ProvenanceMode::All, Internal) => Some(2.0),
        (ProvenanceMode::All, External) => Some(1.0),
        (ProvenanceMode::All, Quarantine) => None,
    }
}

/// Strip everything but alphanumerics and spaces, lower-case, collapse
/// runs of whitespace - the FTS query sanitizer shared by §4.A and §4.D.
pub fn sanitize_fts_query(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn bucket_filter_ok(hit_buckets: &[String], requested: &Option<Vec<String>>) -> bool {
    match requested {
        None => true,
        Some(wanted) if wanted.is_empty() => true,
        Some(wanted) => hit_buckets.iter().any(|b| wanted.contains(b)),
    }
}

fn scope_tags_ok(hit_tags: &BTreeSet<String>, scope_tags: &[String]) -> bool {
    scope_tags.is_empty() || scope_tags.iter().any(|t| hit_tags.contains(t))
}

fn hydrate(store: &Store, molecule: &Molecule) -> crate::store::Result<Option<SearchHit>> {
    let Some(compound) = store.get_compound(&molecule.compound_id)? else {
        return Ok(None);
    };
    Ok(Some(SearchHit {
        molecule_id: molecule.id.clone(),
        compound_id: compound.id.clone(),
        start_byte: molecule.start_byte,
        end_byte: molecule.end_byte,
        content: molecule.content.clone(),
        source: compound.path.clone(),
        timestamp: compound.timestamp,
        provenance: compound.provenance,
        tags: molecule.tags.clone(),
        buckets: compound.buckets.clone(),
        score: 0.0,
    }))
}

/// Run the full Tag-Walker pipeline against `request`.
pub fn search(store: &Store, request: &SearchRequest) -> crate::store::Result<SearchResponse> {
    let total_target = ((request.max_chars as f64) / 500.0).ceil().max(1.0) as usize;
    let anchor_target = ((total_target as f64) * 0.7).ceil().max(1.0) as usize;
    let neighbor_target = ((total_target as f64) * 0.3).ceil().max(1.0) as usize;

    let parsed = parse_query(&request.query);
    let mut included: HashSet<String> = HashSet::new();
    let mut hits: Vec<SearchHit> = Vec::new();

    // Phase 1: engram lookup.
    let normalized_key = request.query.trim().to_lowercase();
    let digest = Engram::digest(&normalized_key);
    if let Some(engram) = store.get_engram(&digest)? {
        for molecule in store.get_molecules(&engram.molecule_ids)? {
            if let Some(mut hit) = hydrate(store, &molecule)? {
                if !bucket_filter_ok(&hit.buckets, &request.buckets) {
                    continue;
                }
                hit.score = ENGRAM_SCORE;
                if included.insert(hit.molecule_id.clone()) {
                    hits.push(hit);
                }
            }
        }
    }

    // Phase 2: FTS anchors, with a linear-scan fallback on failure.
    let fts_terms = parsed.fts_terms();
    let sanitized = sanitize_fts_query(&fts_terms);
    let k = (500usize).max(2 * total_target);

    // Base relevance per candidate molecule: the inverted BM25 score from
    // FTS, or a flat fallback weight when the linear scan stood in for it
    // (no ranking signal is available in that degraded path).
    const LINEAR_SCAN_BASE_SCORE: f64 = 1.0;

    let anchor_pool: Vec<(Molecule, f64)> = match store.fts_search(&sanitized, k) {
        Ok(fts_hits) => {
            let mut pool = Vec::new();
            for fts_hit in fts_hits {
                if let Some(molecule) = store.get_molecule(&fts_hit.molecule_id)? {
                    pool.push((molecule, fts_hit.score));
                }
            }
            pool
        }
        Err(_) => linear_scan_fallback(store, &sanitized)?
            .into_iter()
            .map(|m| (m, LINEAR_SCAN_BASE_SCORE))
            .collect(),
    };

    let mut anchors = Vec::new();
    for (molecule, base_score) in anchor_pool {
        if included.contains(&molecule.id) {
            continue;
        }
        let Some(mut hit) = hydrate(store, &molecule)? else { continue };
        if !bucket_filter_ok(&hit.buckets, &request.buckets) || !scope_tags_ok(&hit.tags, &request.scope_tags) {
            continue;
        }
        let Some(boost) = provenance_boost(request.provenance, hit.provenance) else {
            continue;
        };
        hit.score = base_score * boost;
        anchors.push(hit);
    }
    anchors.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    anchors.truncate(10usize.max(2 * anchor_target));

    // Phase 3: tag harvest from current anchors.
    let mut harvested_tags: BTreeSet<String> = BTreeSet::new();
    for anchor in &anchors {
        harvested_tags.extend(anchor.tags.iter().cloned());
        harvested_tags.extend(anchor.buckets.iter().cloned());
    }

    for anchor in anchors {
        if included.insert(anchor.molecule_id.clone()) {
            hits.push(anchor);
        }
    }

    // Phase 4: neighbor walk over the rest of the store.
    if !harvested_tags.is_empty() {
        let candidates = store.scan_molecules(|m| {
            !included.contains(&m.id) && m.tags.iter().any(|t| harvested_tags.contains(t))
        })?;

        let mut neighbors = Vec::new();
        for molecule in candidates {
            let Some(mut hit) = hydrate(store, &molecule)? else { continue };
            if !bucket_filter_ok(&hit.buckets, &request.buckets) {
                continue;
            }
            let overlap = molecule.tags.intersection(&harvested_tags).count();
            let mut score = NEIGHBOR_BASE_SCORE + NEIGHBOR_PER_TAG_SCORE * overlap as f64;
            if request.provenance == ProvenanceMode::Sovereign {
                score *= 1.5;
            }
            hit.score = score;
            neighbors.push(hit);
        }
        neighbors.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(neighbor_target);

        for neighbor in neighbors {
            if included.insert(neighbor.molecule_id.clone()) {
                hits.push(neighbor);
            }
        }
    }

    // Final ranking: score desc, then timestamp desc as a stable tie-break.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| a.molecule_id.cmp(&b.molecule_id))
    });

    Ok(SearchResponse { hits, partial: false })
}

/// Substring fallback used when FTS itself errors out - correctness
/// preserving but slow.
fn linear_scan_fallback(store: &Store, sanitized_query: &str) -> crate::store::Result<Vec<Molecule>> {
    if sanitized_query.is_empty() {
        return Ok(Vec::new());
    }
    store.scan_molecules(|m| m.content.to_lowercase().contains(sanitized_query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_content;
    use crate::model::Provenance;

    fn setup() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn search_finds_ingested_keyword() {
        let store = setup();
        ingest_content(
            &store,
            "The ECE stores memory in a graph.",
            "a.md",
            Provenance::Internal,
            vec!["notes".into()],
        )
        .unwrap();

        let response = search(
            &store,
            &SearchRequest {
                query: "ECE".to_string(),
                buckets: Some(vec!["notes".to_string()]),
                scope_tags: vec![],
                max_chars: 500,
                provenance: ProvenanceMode::All,
            },
        )
        .unwrap();

        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].source, "a.md");
        assert!(response.hits[0].score > 0.0);
    }

    #[test]
    fn bucket_isolation_excludes_other_buckets() {
        let store = setup();
        ingest_content(&store, "alpha content one", "a.md", Provenance::Internal, vec!["A".into()]).unwrap();
        ingest_content(&store, "alpha content two", "b.md", Provenance::Internal, vec!["B".into()]).unwrap();

        let response = search(
            &store,
            &SearchRequest {
                query: "alpha".to_string(),
                buckets: Some(vec!["A".to_string()]),
                scope_tags: vec![],
                max_chars: 500,
                provenance: ProvenanceMode::All,
            },
        )
        .unwrap();

        assert!(response.hits.iter().all(|h| h.buckets.contains(&"A".to_string())));
    }

    #[test]
    fn sovereign_mode_ranks_internal_above_external() {
        // Hash dedup is global, so the
        // two records are salted to distinct content - the caller's
        // documented workaround for intentionally duplicate-looking
        // entries with different provenance.
        let store = setup();
        ingest_content(&store, "shared content here (int)", "int.md", Provenance::Internal, vec!["core".into()]).unwrap();
        ingest_content(&store, "shared content here (ext)", "ext.md", Provenance::External, vec!["core".into()]).unwrap();

        let response = search(
            &store,
            &SearchRequest {
                query: "shared".to_string(),
                buckets: None,
                scope_tags: vec![],
                max_chars: 500,
                provenance: ProvenanceMode::Sovereign,
            },
        )
        .unwrap();

        assert!(response.hits.len() >= 2);
        let internal_rank = response.hits.iter().position(|h| h.source == "int.md").unwrap();
        let external_rank = response.hits.iter().position(|h| h.source == "ext.md").unwrap();
        assert!(internal_rank < external_rank);
    }

    #[test]
    fn query_matching_nothing_returns_empty() {
        let store = setup();
        let response = search(
            &store,
            &SearchRequest {
                query: "nonexistentterm".to_string(),
                buckets: None,
                scope_tags: vec![],
                max_chars: 500,
                provenance: ProvenanceMode::All,
            },
        )
        .unwrap();
        assert!(response.hits.is_empty());
    }

    #[test]
    fn sanitizer_strips_punctuation_and_lowercases() {
        assert_eq!(sanitize_fts_query("Hello, World!!"), "hello world");
        assert_eq!(sanitize_fts_query("a   b"), "a b");
    }
}
