//! Engine configuration
//!
//! Recognized environment options, each with the documented
//! default. Values are read once at `EngineConfig::from_env()` time; the
//! engine does not watch its own configuration for changes.

use directories::ProjectDirs;
use std::path::PathBuf;

fn env_path(key: &str, default: impl Into<PathBuf>) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default.into())
}

fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tunables for the context inflator's adaptive sizing (Dynamic Density,
/// Standard 085).
#[derive(Debug, Clone, Copy)]
pub struct InflatorConfig {
    pub merge_threshold: usize,
    pub min_padding: usize,
    pub max_padding: usize,
    pub min_window_cap: usize,
    pub min_viable_size: usize,
    pub static_fallback: usize,
}

impl Default for InflatorConfig {
    fn default() -> Self {
        Self {
            merge_threshold: 500,
            min_padding: 50,
            max_padding: 500,
            min_window_cap: 200,
            min_viable_size: 150,
            static_fallback: 2500,
        }
    }
}

/// Process-wide engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub watched_dir: PathBuf,
    pub db_path: PathBuf,
    pub backups_dir: PathBuf,
    pub models_dir: PathBuf,
    pub max_file_bytes: u64,
    pub fts_base_k: usize,
    pub inflator: InflatorConfig,
}

impl EngineConfig {
    /// Resolve configuration from the environment, falling back to a
    /// platform-specific data directory (via `directories::ProjectDirs`)
    /// when no explicit path is set - the same resolution strategy the
    /// teacher crate uses for its own database path.
    pub fn from_env() -> Self {
        let data_dir = ProjectDirs::from("dev", "context-engine", "engine")
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./engine"));

        let inflator = InflatorConfig {
            merge_threshold: env_num("merge_threshold", InflatorConfig::default().merge_threshold),
            min_padding: env_num("min_padding", InflatorConfig::default().min_padding),
            max_padding: env_num("max_padding", InflatorConfig::default().max_padding),
            min_window_cap: env_num("min_window_cap", InflatorConfig::default().min_window_cap),
            min_viable_size: env_num("min_viable_size", InflatorConfig::default().min_viable_size),
            ..InflatorConfig::default()
        };

        Self {
            watched_dir: env_path("watched_dir", "./context"),
            db_path: env_path("db_path", data_dir.join("context.db")),
            backups_dir: env_path("backups_dir", "./backups"),
            models_dir: env_path("models_dir", "./models"),
            max_file_bytes: env_num("max_file_bytes", 100 * 1024 * 1024),
            fts_base_k: env_num("fts_base_k", 500),
            inflator,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
