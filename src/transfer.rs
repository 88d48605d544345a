//! Retrying transfer primitives
//!
//! Every network operation in the uploader goes through the same fixed
//! policy: 3 attempts with a 60-second pause between them. Structural
//! errors are never retried. After exhaustion the last error propagates
//! to `main`, which exits with a failure status.

use crate::error::{UploadError, UploadResult};
use std::fs::File;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed retry policy for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub pause: Duration,
}

impl RetryPolicy {
    /// The policy used for all real transfers: 3 attempts, 60s apart
    pub const fn standard() -> Self {
        Self {
            attempts: 3,
            pause: Duration::from_secs(60),
        }
    }

    /// Zero-pause variant for tests
    #[cfg(test)]
    pub const fn immediate() -> Self {
        Self {
            attempts: 3,
            pause: Duration::ZERO,
        }
    }
}

/// Run `f` until it succeeds, a structural error occurs, or the policy
/// is exhausted. The pause is blocking; this tool is fully sequential.
pub fn with_retry<T, F>(policy: RetryPolicy, operation: &str, mut f: F) -> UploadResult<T>
where
    F: FnMut() -> UploadResult<T>,
{
    let mut last = None;
    for attempt in 1..=policy.attempts {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                warn!(
                    "{} failed ({}), retry... ({} of {})",
                    operation, e, attempt, policy.attempts
                );
                last = Some(e);
                if attempt < policy.attempts {
                    thread::sleep(policy.pause);
                }
            }
        }
    }
    Err(last.unwrap_or_else(|| {
        UploadError::Internal(format!("retry policy with zero attempts: {operation}"))
    }))
}

/// Single streaming GET to a local file
fn download_once(
    agent: &ureq::Agent,
    url: &str,
    local_file: &Path,
    auth_header: &str,
) -> UploadResult<()> {
    let response = agent
        .get(url)
        .set("Authorization", auth_header)
        .call()
        .map_err(|e| UploadError::http(format!("GET {url}"), e))?;

    let mut file = File::create(local_file)
        .map_err(|e| UploadError::io(format!("creating {}", local_file.display()), e))?;
    io::copy(&mut response.into_reader(), &mut file)
        .map_err(|e| UploadError::io(format!("writing {}", local_file.display()), e))?;
    Ok(())
}

/// Download `url` to `local_file`, retrying per the standard policy
pub fn download_file(
    agent: &ureq::Agent,
    policy: RetryPolicy,
    url: &str,
    local_file: &Path,
    auth_header: &str,
) -> UploadResult<()> {
    info!("Downloading:\n  {} ->\n  {}", url, local_file.display());
    with_retry(policy, "Download", || {
        download_once(agent, url, local_file, auth_header)
    })?;
    debug!("Download done");
    Ok(())
}

/// Single POST of a local file's bytes as a bzip2 stream
fn upload_bzip_once(
    agent: &ureq::Agent,
    url: &str,
    local_path: &Path,
    auth_header: &str,
) -> UploadResult<()> {
    let file = File::open(local_path)
        .map_err(|e| UploadError::io(format!("opening {}", local_path.display()), e))?;
    agent
        .post(url)
        .set("Authorization", auth_header)
        .set("Content-Type", "application/x-bzip2")
        .send(file)
        .map_err(|e| UploadError::http(format!("POST {url}"), e))?;
    Ok(())
}

/// Upload `local_path` to `url` as a bzip2 stream, retrying per the
/// standard policy
pub fn upload_bzip(
    agent: &ureq::Agent,
    policy: RetryPolicy,
    url: &str,
    local_path: &Path,
    auth_header: &str,
) -> UploadResult<()> {
    info!("Uploading:\n  {} ->\n  {}", local_path.display(), url);
    with_retry(policy, "Upload", || {
        upload_bzip_once(agent, url, local_path, auth_header)
    })?;
    debug!("Upload done");
    Ok(())
}
