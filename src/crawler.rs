// Registry metadata + archive download/extraction + source discovery
// (spec §4.5).

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::fetch::RateLimitedFetcher;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub metadata_entries: usize,
    pub source_entries: usize,
    pub total_bytes: u64,
}

pub const SOURCE_EXTENSION: &str = "d";

pub struct Crawler {
    config: CoreConfig,
    fetcher: RateLimitedFetcher,
}

impl Crawler {
    pub fn new(config: CoreConfig) -> Self {
        let fetcher = RateLimitedFetcher::new(config.min_request_interval, config.max_retries);
        Self { config, fetcher }
    }

    /// List every package name from the registry dump endpoint, which may
    /// return either an array of strings or an array of `{name, ...}`.
    #[instrument(skip(self))]
    pub async fn list_package_names(&self) -> CoreResult<Vec<String>> {
        let url = format!("{}/dump", self.config.api_base);
        let bytes = self.fetcher.get(&url).await?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        let array = value.as_array().ok_or_else(|| CoreError::Parse {
            detail: "packages/dump did not return a JSON array".into(),
        })?;
        let names = array
            .iter()
            .filter_map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .or_else(|| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
            })
            .collect();
        Ok(names)
    }

    /// Cached metadata fetch: read `cache/metadata/{name}.json`, falling
    /// through to HTTP on miss.
    #[instrument(skip(self), fields(name = %name))]
    pub async fn get_package_info(&self, name: &str) -> CoreResult<PackageInfo> {
        let cache_path = self.config.metadata_cache_dir().join(format!("{name}.json"));
        if let Ok(raw) = std::fs::read_to_string(&cache_path) {
            if let Ok(info) = serde_json::from_str::<PackageInfo>(&raw) {
                debug!(name, "package metadata cache hit");
                return Ok(info);
            }
        }

        let url = format!("{}/{}/latest/info", self.config.api_base, name);
        let bytes = self.fetcher.get(&url).await?;
        let info: PackageInfo =
            serde_json::from_slice(&bytes).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;

        if let Some(parent) = cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        }
        std::fs::write(&cache_path, &bytes).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        Ok(info)
    }

    /// Ensure `cache/sources/{name}-{version}/` exists, downloading and
    /// extracting the archive if it doesn't.
    #[instrument(skip(self), fields(name = %name, version = %version))]
    pub async fn download_source(&self, name: &str, version: &str) -> CoreResult<PathBuf> {
        let extracted_dir = self.config.sources_cache_dir().join(format!("{name}-{version}"));
        if extracted_dir.exists() {
            return Ok(extracted_dir);
        }

        let archive_path = self.config.sources_cache_dir().join(format!("{name}-{version}.zip"));
        if !archive_path.exists() {
            let url = format!("{}/packages/{name}/{version}.zip", self.config.archive_base);
            self.fetcher.download(&url, &archive_path).await?;
        }

        extract_zip(&archive_path, &extracted_dir)?;
        info!(name, version, dir = %extracted_dir.display(), "extracted package source");
        Ok(extracted_dir)
    }

    /// Probe `root/source`, `root/src`, then each immediate child
    /// directory's `source`/`src`; fall back to `root` itself.
    pub fn find_source_directory(&self, root: &Path) -> PathBuf {
        for candidate in [root.join("source"), root.join("src")] {
            if candidate.is_dir() {
                return candidate;
            }
        }
        if let Ok(entries) = std::fs::read_dir(root) {
            for entry in entries.flatten() {
                let child = entry.path();
                if !child.is_dir() {
                    continue;
                }
                for candidate in [child.join("source"), child.join("src")] {
                    if candidate.is_dir() {
                        return candidate;
                    }
                }
            }
        }
        root.to_path_buf()
    }

    /// Recursively collect every `*.d` file under `dir`.
    pub fn find_source_files(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_source_files(dir, &mut files);
        files
    }

    pub fn get_cache_stats(&self) -> CoreResult<CacheStats> {
        let metadata_entries = count_entries(&self.config.metadata_cache_dir());
        let source_entries = count_entries(&self.config.sources_cache_dir());
        let total_bytes = dir_size(&self.config.metadata_cache_dir()) + dir_size(&self.config.sources_cache_dir());
        Ok(CacheStats {
            metadata_entries,
            source_entries,
            total_bytes,
        })
    }

    pub fn clear_cache(&self) -> CoreResult<()> {
        for dir in [self.config.metadata_cache_dir(), self.config.sources_cache_dir()] {
            if dir.exists() {
                std::fs::remove_dir_all(&dir).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
            }
            std::fs::create_dir_all(&dir).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        }
        Ok(())
    }
}

fn collect_source_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_source_files(&path, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION) {
            out.push(path);
        }
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|rd| rd.flatten().count()).unwrap_or(0)
}

fn dir_size(dir: &Path) -> u64 {
    let mut total = 0u64;
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                if meta.is_file() {
                    total += meta.len();
                } else if meta.is_dir() {
                    total += dir_size(&entry.path());
                }
            }
        }
    }
    total
}

fn extract_zip(archive_path: &Path, dest: &Path) -> CoreResult<()> {
    let file = std::fs::File::open(archive_path).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        std::fs::write(&out_path, &contents).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
    }
    Ok(())
}
