//! Run configuration
//!
//! Everything the core components need is validated up front and carried
//! in one struct; no module reads arguments or the environment on its own.

use crate::cli::Cli;
use crate::error::{UploadError, UploadResult};
use std::path::{Path, PathBuf};

/// Name of the environment variable holding the GitHub password/token
pub const PASSWORD_ENV: &str = "GITHUB_USER_PASSWORD";

/// Validated configuration for one upload run
#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub repo_owner: String,
    pub repo: String,
    pub cache_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl Config {
    /// Build a configuration from parsed CLI arguments.
    ///
    /// Rejects a cache directory that does not exist, is not a directory,
    /// or whose final path segment is not named `Cache`, and an absent or
    /// empty credential.
    pub fn from_cli(cli: &Cli) -> UploadResult<Self> {
        let cache_dir = validate_cache_dir(&cli.cache_dir)?;

        let password = match cli.password.as_deref() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => return Err(UploadError::MissingCredential(PASSWORD_ENV)),
        };

        Ok(Self {
            username: cli.username.clone(),
            password,
            repo_owner: cli.repo_owner.clone(),
            repo: cli.repo.clone(),
            cache_dir,
            temp_dir: cli.temp_dir.clone(),
        })
    }
}

/// Check that `path` is an existing directory whose last segment is `Cache`
fn validate_cache_dir(path: &Path) -> UploadResult<PathBuf> {
    if !path.is_dir() {
        return Err(UploadError::CacheDirNotFound(path.to_path_buf()));
    }
    let is_cache = path
        .file_name()
        .map(|name| name == "Cache")
        .unwrap_or(false);
    if !is_cache {
        return Err(UploadError::CacheDirMisnamed(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}
