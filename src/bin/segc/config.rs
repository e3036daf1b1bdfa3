use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use segment_criteria::{
    CompilerOptions, Dialect, InMemoryMappingStore, MappingRecord, MappingStore,
    MappingStoreError, SqliteMappingStore,
};
use serde::Deserialize;
use thiserror::Error;

/// Resolved CLI configuration: compiler options plus mapping-store source.
#[derive(Debug, Default)]
pub struct CliConfig {
    options: CompilerOptions,
    mapping_database: Option<PathBuf>,
    records: Vec<MappingRecord>,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        let options = convert_compiler(&data.compiler)?;
        Ok(Self {
            options,
            mapping_database: data.mappings.database,
            records: data.mappings.records,
        })
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut CompilerOptions {
        &mut self.options
    }

    /// Opens the configured SQLite store, seeded with inline records, or an
    /// in-memory store holding only the inline records.
    pub fn mapping_store(&self) -> Result<Arc<dyn MappingStore>, ConfigError> {
        match &self.mapping_database {
            Some(db) => {
                let store = SqliteMappingStore::open(db).map_err(|source| ConfigError::Store {
                    path: db.clone(),
                    source,
                })?;
                for record in &self.records {
                    store.upsert(record).map_err(|source| ConfigError::Store {
                        path: db.clone(),
                        source,
                    })?;
                }
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(InMemoryMappingStore::with_records(
                self.records.iter().cloned(),
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    compiler: RawCompiler,
    mappings: RawMappings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCompiler {
    fuzzy_threshold: Option<f64>,
    cache_capacity: Option<usize>,
    cache_shards: Option<usize>,
    lookup_budget_ms: Option<u64>,
    dialect: Option<String>,
    current_year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMappings {
    database: Option<PathBuf>,
    records: Vec<MappingRecord>,
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn convert_compiler(raw: &RawCompiler) -> Result<CompilerOptions, ConfigError> {
    let mut opts = CompilerOptions::default();
    if let Some(threshold) = raw.fuzzy_threshold {
        opts.fuzzy_threshold = threshold;
    }
    if let Some(capacity) = raw.cache_capacity {
        opts.cache_capacity = capacity;
    }
    if let Some(shards) = raw.cache_shards {
        opts.cache_shards = shards;
    }
    if let Some(ms) = raw.lookup_budget_ms {
        opts.lookup_budget = Some(Duration::from_millis(ms));
    }
    if let Some(value) = raw.dialect.as_deref() {
        opts.dialect = Dialect::parse(value).ok_or_else(|| ConfigError::InvalidDialect {
            value: value.to_string(),
        })?;
    }
    opts.current_year = raw.current_year;
    Ok(opts)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("dialect '{value}' is invalid (expected postgres or sqlite)")]
    InvalidDialect { value: String },
    #[error("failed to open mapping store {path}: {source}")]
    Store {
        path: PathBuf,
        source: MappingStoreError,
    },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("segment-criteria").join("segc.toml"))
}
