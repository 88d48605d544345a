//! GitHub remote store client
//!
//! Treats one repository as a blob store: raw archives are uploaded as
//! assets of the release tagged `cache`, metadata files are created
//! through the contents API. File creation is atomic: an existing file
//! is never overwritten; instead the remote copy is downloaded and
//! hash-compared against the local one.

use crate::config::Config;
use crate::error::{UploadError, UploadResult};
use crate::hash;
use crate::transfer::{self, RetryPolicy};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const API_BASE: &str = "https://api.github.com";
const UPLOADS_BASE: &str = "https://uploads.github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Tag of the fixed release that receives raw archive assets
pub const RELEASE_TAG: &str = "cache";

/// Scratch file name used for conflict verification downloads
const SCRATCH_FILE: &str = "__TEMP.FILE";

/// Outcome of an idempotent file creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The file did not exist remotely and was created
    Created,
    /// The file already existed with identical content
    VerifiedExisting,
}

/// Single-attempt result of the contents-API `PUT`
enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Release-by-tag response; only the numeric id is needed
#[derive(Debug, Deserialize)]
struct Release {
    id: u64,
}

/// Authenticated client bound to one repository.
///
/// The release id and the rate-limit state are read once at connect time
/// and held for the run's duration.
pub struct GithubClient {
    agent: ureq::Agent,
    auth_header: String,
    repo_owner: String,
    repo: String,
    release_id: u64,
    policy: RetryPolicy,
    api_base: String,
    uploads_base: String,
    raw_base: String,
}

impl GithubClient {
    /// Connect and validate credentials.
    ///
    /// Performs a lightweight authenticated request against the API root,
    /// logs the remaining rate-limit quota and fails if it is exactly
    /// zero, then resolves the id of the `cache` release.
    pub fn connect(config: &Config) -> UploadResult<Self> {
        Self::connect_with_policy(config, RetryPolicy::standard())
    }

    /// Connect with an explicit retry policy (tests use a zero pause)
    pub fn connect_with_policy(config: &Config, policy: RetryPolicy) -> UploadResult<Self> {
        let agent = ureq::Agent::new();
        let auth_header = basic_auth_header(&config.username, &config.password);

        let response = agent
            .get(API_BASE)
            .set("Authorization", &auth_header)
            .call()
            .map_err(|e| UploadError::CredentialCheck(e.to_string()))?;

        let limit: u64 = response
            .header("X-RateLimit-Remaining")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        info!("GitHub limit: {}", limit);
        if limit == 0 {
            return Err(UploadError::RateLimitExhausted);
        }

        // Resolved once and held for the run's duration.
        let release_id = transfer::with_retry(policy, "Release lookup", || {
            release_by_tag(
                &agent,
                &auth_header,
                &config.repo_owner,
                &config.repo,
                RELEASE_TAG,
            )
        })?;
        debug!("Release id for tag {}: {}", RELEASE_TAG, release_id);

        Ok(Self {
            agent,
            auth_header,
            repo_owner: config.repo_owner.clone(),
            repo: config.repo.clone(),
            release_id,
            policy,
            api_base: API_BASE.to_string(),
            uploads_base: UPLOADS_BASE.to_string(),
            raw_base: RAW_BASE.to_string(),
        })
    }

    /// Upload a raw archive as a release asset.
    ///
    /// The asset name is `<sha1>.tar.bz2`, derived from the file content.
    pub fn upload_raw_file(&self, local_path: &Path) -> UploadResult<()> {
        let asset_name = format!("{}.tar.bz2", hash::sha1_file(local_path)?);
        let url = format!(
            "{}/repos/{}/{}/releases/{}/assets?name={}",
            self.uploads_base, self.repo_owner, self.repo, self.release_id, asset_name
        );
        transfer::upload_bzip(&self.agent, self.policy, &url, local_path, &self.auth_header)
    }

    /// Create-or-verify a repository file: the idempotent-put primitive.
    ///
    /// Attempts an atomic create; if the file already exists, downloads
    /// the remote copy into `scratch_dir` and requires the SHA-1 to match
    /// the local file. A mismatch is a fatal integrity error.
    pub fn put_idempotent(
        &self,
        local_path: &Path,
        remote_path: &str,
        scratch_dir: &Path,
    ) -> UploadResult<PublishOutcome> {
        let outcome = transfer::with_retry(self.policy, "File creation", || {
            self.try_create_file(local_path, remote_path)
        })?;

        match outcome {
            CreateOutcome::Created => Ok(PublishOutcome::Created),
            CreateOutcome::AlreadyExists => {
                info!("Already exists: {}", remote_path);
                self.verify_remote_file(local_path, remote_path, scratch_dir)?;
                Ok(PublishOutcome::VerifiedExisting)
            }
        }
    }

    /// Single attempt at the contents-API create.
    ///
    /// A conflict-class status (409/422) means the file already exists;
    /// every other failure is a transport error left to the retry policy.
    fn try_create_file(&self, local_path: &Path, remote_path: &str) -> UploadResult<CreateOutcome> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.repo_owner, self.repo, remote_path
        );
        let content = fs::read(local_path)
            .map_err(|e| UploadError::io(format!("reading {}", local_path.display()), e))?;
        let body = serde_json::json!({
            "message": format!("Create file: {remote_path}"),
            "content": BASE64.encode(content),
        });

        let result = self
            .agent
            .put(&url)
            .set("Authorization", &self.auth_header)
            .send_json(body);

        match result {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(ureq::Error::Status(409 | 422, response)) => {
                debug!("Put failed, status code: {}", response.status());
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(UploadError::http(format!("PUT {url}"), e)),
        }
    }

    /// Download the remote copy of `remote_path` and hash-compare it
    /// against the local file
    fn verify_remote_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        scratch_dir: &Path,
    ) -> UploadResult<()> {
        let url = self.raw_content_url(remote_path);
        let scratch = scratch_dir.join(SCRATCH_FILE);

        transfer::download_file(&self.agent, self.policy, &url, &scratch, &self.auth_header)?;
        compare_and_clean(local_path, &scratch, remote_path)
    }

    /// Raw-content mirror URL for a repository path on the default branch
    fn raw_content_url(&self, remote_path: &str) -> String {
        format!(
            "{}/{}/{}/master/{}",
            self.raw_base, self.repo_owner, self.repo, remote_path
        )
    }
}

/// Hash-compare the local file against the downloaded scratch copy.
///
/// The scratch file is removed on both branches; a divergence is a fatal
/// integrity error.
fn compare_and_clean(local_path: &Path, scratch: &Path, remote_path: &str) -> UploadResult<()> {
    let expected = hash::sha1_file(local_path)?;
    let downloaded = hash::sha1_file(scratch)?;
    fs::remove_file(scratch)
        .map_err(|e| UploadError::io(format!("removing {}", scratch.display()), e))?;

    if expected != downloaded {
        return Err(UploadError::HashMismatch {
            remote_path: remote_path.to_string(),
            expected,
            downloaded,
        });
    }
    Ok(())
}

/// Resolve a release id from its tag name
fn release_by_tag(
    agent: &ureq::Agent,
    auth_header: &str,
    repo_owner: &str,
    repo: &str,
    tagname: &str,
) -> UploadResult<u64> {
    let url = format!("{API_BASE}/repos/{repo_owner}/{repo}/releases/tags/{tagname}");
    let release: Release = agent
        .get(&url)
        .set("Authorization", auth_header)
        .call()
        .map_err(|e| UploadError::http(format!("GET {url}"), e))?
        .into_json()
        .map_err(|e| UploadError::Response {
            context: format!("GET {url}"),
            reason: e.to_string(),
        })?;
    Ok(release.id)
}

/// HTTP basic auth header value for a username/token pair
fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
}
