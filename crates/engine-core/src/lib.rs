//! # Context Engine Core
//!
//! A local-first context engine: ingests heterogeneous text documents,
//! decomposes each into a three-level atomic taxonomy
//! (Compound -> Molecule -> Atom), stores the result in an embedded
//! graph/relational store, and services retrieval queries that return
//! token-budgeted, context-inflated evidence windows.
//!
//! ## Components
//!
//! - [`store`] - the embedded SQLite relation + FTS5 store.
//! - [`atomizer`] - document decomposition into Compound/Molecule/Atom.
//! - [`ingest`] - deduplication, bucket assignment, and the file watcher.
//! - [`search`] - the Tag-Walker hybrid search protocol.
//! - [`inflate`] - the Context Inflator's budget-aware window merging.
//! - [`scribe`] - the Markovian rolling session summary.
//! - [`snapshot`] - eject-to-file and hydrate-from-file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use engine_core::{Engine, EngineConfig};
//!
//! let engine = Engine::boot(EngineConfig::from_env())?;
//! let outcome = engine.ingest("The ECE stores memory in a graph.", Some("a.md"), None, None)?;
//! let result = engine.search("ECE", None, 500, "all")?;
//! println!("{}", result.context);
//! # Ok::<(), engine_core::EngineError>(())
//! ```

pub mod atomizer;
pub mod config;
mod engine;
pub mod error;
pub mod inflate;
pub mod ingest;
pub mod model;
pub mod scribe;
pub mod search;
pub mod snapshot;
pub mod store;

pub use config::{EngineConfig, InflatorConfig};
pub use engine::{ChatResult, Engine, SearchResult};
pub use error::{EngineError, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        config::EngineConfig,
        engine::{ChatResult, Engine, SearchResult},
        error::{EngineError, Result},
        model::{Atom, AtomEdge, Compound, Engram, Molecule, Provenance, SessionState},
        scribe::{Generator, Turn},
        search::{ProvenanceMode, SearchHit},
        store::Store,
    };
}
