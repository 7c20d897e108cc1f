//! TOML configuration.
//!
//! A per-section `#[serde(default)]` struct shape, wired to TOML, with one
//! table per concern: `[index]`, `[sources]`, `[search]`, `[ranking]`,
//! `[logging]`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub segment_size: usize,
    pub max_tokens_per_document: usize,
    pub reindex_on_modify: bool,
    pub skip_binary_files: bool,
    /// Tokenize each batch's files concurrently via a `rayon` thread pool
    /// instead of one at a time. Off by default: it trades the per-file
    /// cancellation checkpoint for a per-batch one.
    pub parallel_tokenize: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            segment_size: 20_000,
            // 0 means unlimited.
            max_tokens_per_document: 0,
            reindex_on_modify: true,
            skip_binary_files: true,
            parallel_tokenize: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    pub paths: Vec<String>,
    pub include_extensions: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub ignore: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            include_extensions: Vec::new(),
            exclude_extensions: Vec::new(),
            ignore: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub use_stopwords: bool,
    pub language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            use_stopwords: true,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    pub bm25_weight: f64,
    pub vsm_weight: f64,
    pub recency_half_life_days: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            bm25_weight: 0.7,
            vsm_weight: 0.3,
            recency_half_life_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub index: IndexConfig,
    pub sources: SourcesConfig,
    pub search: SearchConfig,
    pub ranking: RankingConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            index: IndexConfig::default(),
            sources: SourcesConfig::default(),
            search: SearchConfig::default(),
            ranking: RankingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Load config from `path`, falling back to defaults if the file is absent.
/// A present-but-unparsable file is a fatal `ConfigParse` error, fatal to
/// the invoking command.
pub fn load_config(path: &Path) -> Result<Config, CoreError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| CoreError::ConfigParse(format!("reading {}: {e}", path.display())))?;
    toml::from_str(&text).map_err(|e| CoreError::ConfigParse(format!("{}: {e}", path.display())))
}

/// Write `config` to `path` with read-modify-rename atomicity, avoiding
/// torn writes on `config add`/`config remove`.
pub fn save_config(path: &Path, config: &Config) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CoreError::IoFatal(format!("creating {}: {e}", parent.display())))?;
    }
    let text = toml::to_string_pretty(config)
        .map_err(|e| CoreError::ConfigParse(format!("serializing config: {e}")))?;
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, text)
        .map_err(|e| CoreError::IoFatal(format!("writing {}: {e}", tmp_path.display())))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| CoreError::IoFatal(format!("renaming {} -> {}: {e}", tmp_path.display(), path.display())))?;
    Ok(())
}
