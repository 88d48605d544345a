//! Hunter cache uploader
//!
//! Mirrors a local Hunter build-cache tree into a GitHub repository:
//! raw archives become assets of the `cache` release, metadata files go
//! to the repository tree through the contents API. Uploads are
//! sequential and idempotent; conflicts are verified by hash.

pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod github;
pub mod hash;
pub mod scanner;
pub mod transfer;

pub use error::{UploadError, UploadResult};
