//! Top-level Engine: wires Store, Ingestor, Tag-Walker, Inflator, and
//! Scribe behind the public operation set.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::ingest::{self, IngestOutcome};
use crate::inflate::{self, InflationResult};
use crate::model::Provenance;
use crate::scribe::{Generator, Scribe, Turn};
use crate::search::{self, ProvenanceMode, SearchHit, SearchRequest};
use crate::snapshot;
use crate::store::Store;

/// The assembled `search` response: inflated context text, the ranked
/// hits behind it, and whether ranking had to fall back to a partial scan.
pub struct SearchResult {
    pub context: String,
    pub results: Vec<SearchHit>,
    pub partial: bool,
}

pub struct ChatResult {
    pub response: String,
}

/// The owning store value held by the top-level host; subcomponents
/// receive it by reference rather than reaching for a global.
pub struct Engine {
    store: Store,
    config: EngineConfig,
}

impl Engine {
    /// Open (or create) the store at `config.db_path`, then run the
    /// boot-time auto-hydration policy before returning.
    pub fn boot(config: EngineConfig) -> Result<Self> {
        let store = Store::open(&config.db_path).map_err(EngineError::from)?;

        match snapshot::auto_hydrate(&store, &config.backups_dir) {
            Ok(Some(loaded)) => tracing::info!(loaded, "auto-hydrated store from newest backup"),
            Ok(None) => tracing::debug!("auto-hydration skipped: store non-empty or no backups"),
            Err(err) => tracing::warn!(error = %err, "auto-hydration failed, continuing with empty store"),
        }

        Ok(Self { store, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ingest(
        &self,
        content: &str,
        source: Option<&str>,
        provenance: Option<Provenance>,
        buckets: Option<Vec<String>>,
    ) -> Result<IngestOutcome> {
        if content.trim().is_empty() {
            return Err(EngineError::bad_request("content must be non-empty"));
        }
        let source = source.unwrap_or("untitled");
        let buckets = buckets.unwrap_or_else(|| vec!["core".to_string()]);
        if buckets.is_empty() {
            return Err(EngineError::bad_request("buckets must be non-empty"));
        }

        ingest::ingest_content(&self.store, content, source, provenance.unwrap_or(Provenance::Internal), buckets)
            .map_err(|e| match e {
                ingest::IngestError::EmptyContent => EngineError::bad_request("content must be non-empty"),
                ingest::IngestError::EmptyBuckets => EngineError::bad_request("buckets must be non-empty"),
                other => EngineError::Store(other.to_string()),
            })
    }

    pub fn search(
        &self,
        query: &str,
        buckets: Option<Vec<String>>,
        max_chars: usize,
        provenance: &str,
    ) -> Result<SearchResult> {
        if query.trim().is_empty() {
            return Err(EngineError::bad_request("query must be non-empty"));
        }
        if max_chars < self.config.inflator.min_window_cap {
            return Err(EngineError::bad_request(format!(
                "max_chars must be at least {}",
                self.config.inflator.min_window_cap
            )));
        }
        let provenance: ProvenanceMode = provenance
            .parse()
            .map_err(|_| EngineError::bad_request(format!("unknown provenance mode: {provenance}")))?;

        let request = SearchRequest {
            query: query.to_string(),
            buckets,
            scope_tags: Vec::new(),
            max_chars,
            provenance,
        };

        let response = search::search(&self.store, &request).map_err(EngineError::from)?;
        let InflationResult { windows, context } = inflate::inflate(&self.store, &response.hits, max_chars, &self.config.inflator).map_err(EngineError::from)?;

        let sources: std::collections::HashSet<_> = windows.iter().map(|w| w.source.clone()).collect();
        let results: Vec<SearchHit> = response.hits.into_iter().filter(|h| sources.contains(&h.source)).collect();

        Ok(SearchResult {
            context,
            results,
            partial: response.partial,
        })
    }

    pub fn buckets(&self) -> Result<Vec<String>> {
        ingest::list_buckets(&self.store).map_err(EngineError::from)
    }

    pub fn dream(&self) -> Result<usize> {
        ingest::dream(&self.store).map_err(EngineError::from)
    }

    pub fn backup(&self, now_millis: i64) -> Result<std::path::PathBuf> {
        snapshot::eject(&self.store, &self.config.backups_dir, now_millis).map_err(EngineError::from)
    }

    pub fn scribe(&self) -> Scribe<'_> {
        Scribe::new(&self.store)
    }

    /// Context Weaving: prepend the current session state, then call the
    /// generator. Token-budget priority is left to the generator's own
    /// prompt construction; this only assembles the text.
    pub fn chat(&self, messages: &[Turn], generator: &dyn Generator) -> Result<ChatResult> {
        let scribe = self.scribe();
        let session_summary = scribe.get_state().map_err(EngineError::from)?;
        let Some(last) = messages.last() else {
            return Err(EngineError::bad_request("messages must be non-empty"));
        };
        let woven = crate::scribe::weave(&session_summary, &last.content);

        let response = generator.generate(&woven)?;

        scribe.update_state(messages, generator).ok();

        Ok(ChatResult { response })
    }
}

impl From<crate::snapshot::SnapshotError> for EngineError {
    fn from(e: crate::snapshot::SnapshotError) -> Self {
        EngineError::Store(e.to_string())
    }
}
