//! Cache scanner
//!
//! Walks the cache tree once, turns every `CACHE.DONE` marker into a
//! [`CacheEntry`], drops the entries that came from the server, and
//! drives the bulk upload passes in discovery order. Any error aborts
//! the whole run; a re-run is idempotent through the create-or-verify
//! path.

use crate::entry::{CacheEntry, MetaPass, CACHE_DONE};
use crate::error::{UploadError, UploadResult};
use crate::github::GithubClient;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// All cache entries discovered by one scan
pub struct Cache {
    entries: Vec<CacheEntry>,
    temp_dir: PathBuf,
}

impl Cache {
    /// Recursively find every `CACHE.DONE` under `cache_dir` and build
    /// an entry for each
    pub fn scan(cache_dir: &Path, temp_dir: &Path) -> UploadResult<Self> {
        info!(
            "Searching for {} files in directory:\n  {}",
            CACHE_DONE,
            cache_dir.display()
        );

        let mut entries = Vec::new();
        for dirent in WalkDir::new(cache_dir).sort_by_file_name() {
            let dirent = dirent.map_err(|e| {
                UploadError::Internal(format!("walking {}: {e}", cache_dir.display()))
            })?;
            if dirent.file_type().is_file() && dirent.file_name() == CACHE_DONE {
                entries.push(CacheEntry::new(dirent.path(), cache_dir, temp_dir)?);
            }
        }

        info!("Found {} files:", entries.len());
        for entry in &entries {
            info!("  {}", entry.marker_path().display());
        }

        Ok(Self {
            entries,
            temp_dir: temp_dir.to_path_buf(),
        })
    }

    /// Drop entries that were fetched from the server in a prior run
    pub fn retain_local(&mut self) {
        self.entries.retain(|entry| {
            let from_server = entry.is_server_sourced();
            if from_server {
                info!(
                    "Remove entry (from server):\n  {}",
                    entry.marker_path().display()
                );
            }
            !from_server
        });
    }

    /// Create the verification scratch directory if absent
    pub fn ensure_temp_dir(&self) -> UploadResult<()> {
        fs::create_dir_all(&self.temp_dir)
            .map_err(|e| UploadError::io(format!("creating {}", self.temp_dir.display()), e))
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upload every entry's raw archive, in discovery order
    pub fn upload_all_raw(&self, client: &GithubClient) -> UploadResult<()> {
        for entry in &self.entries {
            entry.upload_raw(client)?;
        }
        Ok(())
    }

    /// Upload one metadata pass for every entry, in discovery order
    pub fn upload_all_meta(&self, client: &GithubClient, pass: MetaPass) -> UploadResult<()> {
        for entry in &self.entries {
            entry.upload_meta(client, pass)?;
        }
        Ok(())
    }
}
