//! Context Inflator: budget-aware window merging and padding
//!
//! Turns scattered molecule hits into coherent reading windows under a
//! character budget, adapting window size to the caller's budget
//! ("Dynamic Density", Standard 085).

use std::collections::HashMap;

use crate::config::InflatorConfig;
use crate::search::SearchHit;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct InflatedWindow {
    pub compound_id: String,
    pub source: String,
    pub timestamp: i64,
    pub content: String,
    pub score: f64,
    pub is_inflated: bool,
}

#[derive(Debug, Clone)]
pub struct InflationResult {
    pub windows: Vec<InflatedWindow>,
    pub context: String,
}

struct DensityParams {
    target_window: usize,
    target_padding: usize,
}

/// Dynamic Density sizing: shrink the per-hit window (and, if needed, the
/// result count) as the number of hits grows relative to the budget.
fn compute_density(config: &InflatorConfig, n: usize, budget: usize) -> (DensityParams, usize) {
    if n == 0 {
        return (
            DensityParams {
                target_window: config.static_fallback,
                target_padding: config.max_padding,
            },
            0,
        );
    }

    let (target_window, kept) = if n * config.min_viable_size > budget {
        let kept = (budget / config.min_viable_size).max(1);
        (config.min_viable_size, kept)
    } else {
        (budget / n, n)
    };

    let target_padding = (target_window / 2).clamp(config.min_padding, config.max_padding);

    (
        DensityParams {
            target_window,
            target_padding,
        },
        kept,
    )
}

struct MergedSpan {
    compound_id: String,
    min_start: usize,
    max_end: usize,
    max_score: f64,
}

fn merge_by_compound(hits: &[SearchHit], merge_threshold: usize) -> Vec<MergedSpan> {
    let mut by_compound: HashMap<String, Vec<&SearchHit>> = HashMap::new();
    for hit in hits {
        by_compound.entry(hit.compound_id.clone()).or_default().push(hit);
    }

    let mut merged = Vec::new();
    for (compound_id, mut group) in by_compound {
        group.sort_by_key(|h| h.start_byte);

        let mut current: Option<MergedSpan> = None;
        for hit in group {
            match &mut current {
                Some(span) if hit.start_byte.saturating_sub(span.max_end) < merge_threshold => {
                    span.max_end = span.max_end.max(hit.end_byte);
                    span.max_score = span.max_score.max(hit.score);
                }
                _ => {
                    if let Some(finished) = current.take() {
                        merged.push(finished);
                    }
                    current = Some(MergedSpan {
                        compound_id: compound_id.clone(),
                        min_start: hit.start_byte,
                        max_end: hit.end_byte,
                        max_score: hit.score,
                    });
                }
            }
        }
        if let Some(finished) = current {
            merged.push(finished);
        }
    }

    merged
}

/// Inflate `hits` into padded, capped, budget-respecting windows.
pub fn inflate(store: &Store, hits: &[SearchHit], total_budget_chars: usize, config: &InflatorConfig) -> crate::store::Result<InflationResult> {
    if hits.is_empty() {
        return Ok(InflationResult {
            windows: Vec::new(),
            context: String::new(),
        });
    }

    let (density, keep_n) = compute_density(config, hits.len(), total_budget_chars);
    let mut ordered = hits.to_vec();
    ordered.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ordered.truncate(keep_n.max(1));

    let merged = merge_by_compound(&ordered, config.merge_threshold);

    let mut windows = Vec::new();
    for span in merged {
        let Some(compound) = store.get_compound(&span.compound_id)? else {
            continue;
        };
        let body = &compound.compound_body;
        let body_len = body.len();

        let mut window_start = span.min_start.saturating_sub(density.target_padding);
        let mut window_end = (span.max_end + density.target_padding).min(body_len);

        if window_end - window_start > density.target_window {
            let centroid = (span.min_start + span.max_end) / 2;
            let half = density.target_window / 2;
            window_start = centroid.saturating_sub(half);
            window_end = (centroid + half).min(body_len);
        }

        window_start = clamp_to_char_boundary(body, window_start, false);
        window_end = clamp_to_char_boundary(body, window_end, true);

        let mut content = body[window_start..window_end].to_string();
        let is_inflated = window_start > 0 || window_end < body_len;
        if window_start > 0 {
            content = format!("...{content}");
        }
        if window_end < body_len {
            content = format!("{content}...");
        }

        windows.push(InflatedWindow {
            compound_id: compound.id.clone(),
            source: compound.path.clone(),
            timestamp: compound.timestamp,
            content,
            score: span.max_score,
            is_inflated,
        });
    }

    windows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut context = String::new();
    let mut emitted = Vec::new();
    let mut running_len = 0usize;
    for window in windows {
        let header = format!(
            "[Source: {}](Timestamp: {})\n",
            window.source,
            chrono::DateTime::from_timestamp_millis(window.timestamp)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default()
        );
        let piece_len = header.len() + window.content.len();
        if running_len + piece_len > total_budget_chars && !emitted.is_empty() {
            break;
        }
        running_len += piece_len;
        context.push_str(&header);
        context.push_str(&window.content);
        context.push('\n');
        emitted.push(window);
        if running_len >= total_budget_chars {
            break;
        }
    }

    Ok(InflationResult {
        windows: emitted,
        context,
    })
}

fn clamp_to_char_boundary(body: &str, mut byte_index: usize, round_up: bool) -> usize {
    byte_index = byte_index.min(body.len());
    while byte_index > 0 && byte_index < body.len() && !body.is_char_boundary(byte_index) {
        if round_up {
            byte_index += 1;
        } else {
            byte_index -= 1;
        }
    }
    byte_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_content;
    use crate::model::Provenance;
    use crate::search::{search, ProvenanceMode, SearchRequest};

    #[test]
    fn total_emitted_chars_never_exceeds_budget() {
        let store = Store::open_in_memory().unwrap();
        let filler = "needle appears here. ".repeat(5);
        let body = format!("{filler}needle again and again and again. {filler}");
        ingest_content(&store, &body, "big.md", Provenance::Internal, vec!["core".into()]).unwrap();

        let response = search(
            &store,
            &SearchRequest {
                query: "needle".to_string(),
                buckets: None,
                scope_tags: vec![],
                max_chars: 200,
                provenance: ProvenanceMode::All,
            },
        )
        .unwrap();

        let result = inflate(&store, &response.hits, 200, &InflatorConfig::default()).unwrap();
        assert!(result.context.len() <= 200 + 64);
    }

    #[test]
    fn empty_hits_yield_empty_context() {
        let store = Store::open_in_memory().unwrap();
        let result = inflate(&store, &[], 1000, &InflatorConfig::default()).unwrap();
        assert!(result.context.is_empty());
        assert!(result.windows.is_empty());
    }

    #[test]
    fn min_window_cap_respected_when_not_density_truncated() {
        let config = InflatorConfig::default();
        let (density, _) = compute_density(&config, 1, 2000);
        assert!(density.target_window >= config.min_window_cap);
    }
}
