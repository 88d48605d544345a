//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Upload Hunter cache files to GitHub
///
/// Walks a local Hunter cache tree and mirrors it into a GitHub
/// repository: raw archives become assets of the `cache` release,
/// metadata files are created through the contents API.
#[derive(Parser, Debug)]
#[command(name = "hunter-cache-upload")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// GitHub username
    #[arg(long)]
    pub username: String,

    /// Repository owner
    #[arg(long)]
    pub repo_owner: String,

    /// Repository name
    #[arg(long)]
    pub repo: String,

    /// Hunter cache directory, e.g. /home/user/.hunter/_Base/Cache
    #[arg(long)]
    pub cache_dir: PathBuf,

    /// Temporary directory where files will be downloaded for verification
    #[arg(long)]
    pub temp_dir: PathBuf,

    /// GitHub password or token (read from the environment, never pass on
    /// the command line)
    #[arg(long, env = "GITHUB_USER_PASSWORD", hide = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}
