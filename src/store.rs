//! File-backed result store.
//!
//! One JSON file per run, named `{identity}-{timestamp}.json`, holding the
//! run's `PageResult` array. Every result carries its `sitemapUrl` and
//! `timestamp`, which is how a record is reconstructed on read. Records are
//! independent files, so concurrent runs only ever contend on the directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::StoreError;
use crate::models::{Catalog, PageResult, RunRecord, SitemapIdentity, is_valid_timestamp, run_key};

#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `record` under `{identity}-{timestamp}`, creating the
    /// directory on first use. The file is written beside its final name and
    /// renamed into place.
    pub async fn put(&self, record: &RunRecord) -> Result<PathBuf, StoreError> {
        if record.results.is_empty() {
            return Err(StoreError::EmptyRecord);
        }
        let key = self.checked_key(&record.identity, &record.timestamp)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(&key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        let json = serde_json::to_vec(&record.results).map_err(|source| {
            StoreError::Serialization {
                path: path.clone(),
                source,
            }
        })?;
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(key = %key, pages = record.results.len(), "stored run");
        Ok(path)
    }

    pub async fn get(
        &self,
        identity: &SitemapIdentity,
        timestamp: &str,
    ) -> Result<RunRecord, StoreError> {
        let key = self.checked_key(identity, timestamp)?;
        let results = self.read_results(&key).await?;
        let sitemap_url = results
            .iter()
            .find_map(|r| r.sitemap_url.clone())
            .unwrap_or_default();
        Ok(RunRecord {
            sitemap_url,
            identity: identity.clone(),
            timestamp: timestamp.to_string(),
            results,
        })
    }

    /// Every stored key, sorted.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .scan()
            .await?
            .into_iter()
            .map(|(identity, timestamp)| run_key(&identity, &timestamp))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Distinct sitemap URLs (ascending) and run timestamps (newest first),
    /// derived by reading every record.
    pub async fn catalog(&self) -> Result<Catalog, StoreError> {
        let mut sitemap_urls = BTreeSet::new();
        let mut timestamps = BTreeSet::new();

        for (identity, timestamp) in self.scan().await? {
            let record = match self.get(&identity, &timestamp).await {
                Ok(record) => record,
                // Deleted between the directory scan and the read.
                Err(StoreError::NotFound { .. }) => continue,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable run");
                    continue;
                }
            };
            if !record.sitemap_url.is_empty() {
                sitemap_urls.insert(record.sitemap_url);
            }
            timestamps.insert(timestamp);
        }

        Ok(Catalog {
            sitemap_urls: sitemap_urls.into_iter().collect(),
            timestamps: timestamps.into_iter().rev().collect(),
        })
    }

    /// Timestamps stored for one sitemap, newest first.
    pub async fn runs_for(&self, identity: &SitemapIdentity) -> Result<Vec<String>, StoreError> {
        let mut timestamps: Vec<String> = self
            .scan()
            .await?
            .into_iter()
            .filter(|(id, _)| id == identity)
            .map(|(_, timestamp)| timestamp)
            .collect();
        timestamps.sort_by(|a, b| b.cmp(a));
        Ok(timestamps)
    }

    pub async fn delete(&self, identity: &SitemapIdentity, timestamp: &str) -> Result<(), StoreError> {
        let key = self.checked_key(identity, timestamp)?;
        let path = self.path_for(&key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "deleted run");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound { key }),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn checked_key(&self, identity: &SitemapIdentity, timestamp: &str) -> Result<String, StoreError> {
        if !is_valid_timestamp(timestamp) {
            return Err(StoreError::InvalidKey(format!("bad timestamp '{}'", timestamp)));
        }
        Ok(run_key(identity, timestamp))
    }

    async fn read_results(&self, key: &str) -> Result<Vec<PageResult>, StoreError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    key: key.to_string(),
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization { path, source })
    }

    /// (identity, timestamp) for every well-formed run file. A missing
    /// directory means no run has completed yet.
    async fn scan(&self) -> Result<Vec<(SitemapIdentity, String)>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut found = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let Some(entry) = entry else { break };
            if let Some(parsed) = entry.file_name().to_str().and_then(parse_file_name) {
                found.push(parsed);
            }
        }
        Ok(found)
    }
}

/// Split `{identity}-{timestamp}.json` back into its parts. Temporary and
/// foreign files yield `None`.
pub fn parse_file_name(name: &str) -> Option<(SitemapIdentity, String)> {
    if name.starts_with('.') {
        return None;
    }
    let stem = name.strip_suffix(".json")?;
    let (identity, timestamp) = stem.split_once('-')?;
    let identity = SitemapIdentity::parse(identity)?;
    is_valid_timestamp(timestamp).then(|| (identity, timestamp.to_string()))
}
