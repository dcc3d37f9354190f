// Configuration for the indexing/search core, built with a fluent builder
// following this crate's usual `with_*` -> fallible `build()` shape.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://code.dlang.org/api/packages";
const DEFAULT_ARCHIVE_BASE: &str = "https://code.dlang.org";
const DEFAULT_DIMENSION: usize = 384;
const DEFAULT_MIN_INTERVAL_MS: u64 = 100;
const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_root: PathBuf,
    pub api_base: String,
    pub archive_base: String,
    pub vector_dimension: usize,
    pub min_request_interval: Duration,
    pub max_retries: u32,
    pub vector_extension_path: Option<PathBuf>,
}

impl CoreConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_root.join("search.db")
    }

    pub fn metadata_cache_dir(&self) -> PathBuf {
        self.data_root.join("cache").join("metadata")
    }

    pub fn sources_cache_dir(&self) -> PathBuf {
        self.data_root.join("cache").join("sources")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.data_root.join("models")
    }

    pub fn tfidf_vocab_path(&self) -> PathBuf {
        self.models_dir().join("tfidf_vocab.json")
    }

    /// Resolve the `sqlite-vec` extension search path: the `SQLITE_VEC_PATH`
    /// environment variable wins, otherwise a platform-specific ordered
    /// search of well-known locations under `models/`.
    pub fn resolve_vector_extension_path(&self) -> Option<PathBuf> {
        if let Ok(over) = std::env::var("SQLITE_VEC_PATH") {
            return Some(PathBuf::from(over));
        }
        if let Some(p) = &self.vector_extension_path {
            return Some(p.clone());
        }
        let models = self.models_dir();
        let candidates: &[&str] = if cfg!(target_os = "macos") {
            &["vec0.dylib"]
        } else if cfg!(target_os = "windows") {
            &["vec0.dll"]
        } else {
            &["vec0.so"]
        };
        candidates
            .iter()
            .map(|name| models.join(name))
            .find(|p| p.exists())
    }

    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }
}

pub struct CoreConfigBuilder {
    data_root: Option<PathBuf>,
    api_base: String,
    archive_base: String,
    vector_dimension: usize,
    min_request_interval: Duration,
    max_retries: u32,
    vector_extension_path: Option<PathBuf>,
}

impl CoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            data_root: None,
            api_base: std::env::var("DUB_SEARCH_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            archive_base: std::env::var("DUB_SEARCH_ARCHIVE_BASE")
                .unwrap_or_else(|_| DEFAULT_ARCHIVE_BASE.to_string()),
            vector_dimension: DEFAULT_DIMENSION,
            min_request_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            vector_extension_path: None,
        }
    }

    pub fn data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_root = Some(path.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn archive_base(mut self, base: impl Into<String>) -> Self {
        self.archive_base = base.into();
        self
    }

    pub fn vector_dimension(mut self, dim: usize) -> Self {
        self.vector_dimension = dim;
        self
    }

    pub fn min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn vector_extension_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.vector_extension_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let data_root = match self.data_root {
            Some(p) => p,
            None => bail!("CoreConfig requires a data_root"),
        };
        if self.vector_dimension == 0 {
            bail!("vector_dimension must be > 0");
        }
        if self.api_base.is_empty() || self.archive_base.is_empty() {
            bail!("api_base and archive_base must be non-empty");
        }
        Ok(CoreConfig {
            data_root,
            api_base: self.api_base,
            archive_base: self.archive_base,
            vector_dimension: self.vector_dimension,
            min_request_interval: self.min_request_interval,
            max_retries: self.max_retries,
            vector_extension_path: self.vector_extension_path,
        })
    }
}

impl Default for CoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_data_root() {
        let result = CoreConfig::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn build_succeeds_with_data_root() {
        let cfg = CoreConfig::builder().data_root("/tmp/dub-search").build().unwrap();
        assert_eq!(cfg.vector_dimension, DEFAULT_DIMENSION);
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/dub-search/search.db"));
    }

    #[test]
    fn rejects_zero_dimension() {
        let result = CoreConfig::builder()
            .data_root("/tmp/dub-search")
            .vector_dimension(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn sqlite_vec_path_env_override_wins() {
        std::env::set_var("SQLITE_VEC_PATH", "/custom/vec0.so");
        let cfg = CoreConfig::builder().data_root("/tmp/dub-search").build().unwrap();
        assert_eq!(
            cfg.resolve_vector_extension_path(),
            Some(PathBuf::from("/custom/vec0.so"))
        );
        std::env::remove_var("SQLITE_VEC_PATH");
    }
}
