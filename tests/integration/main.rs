//! Integration tests for hunter-cache-upload
//!
//! Everything here runs offline: an empty cache tree exits before any
//! network work, and the remaining cases fail during argument or
//! configuration validation.

mod cli_tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;

    fn uploader() -> Command {
        let mut cmd = Command::cargo_bin("hunter-cache-upload").unwrap();
        cmd.env_remove("GITHUB_USER_PASSWORD");
        cmd
    }

    fn base_args(cmd: &mut Command, cache_dir: &std::path::Path, temp_dir: &std::path::Path) {
        cmd.args([
            "--username",
            "alice",
            "--repo-owner",
            "hunter-cache",
            "--repo",
            "cache-linux",
        ])
        .arg("--cache-dir")
        .arg(cache_dir)
        .arg("--temp-dir")
        .arg(temp_dir);
    }

    #[test]
    fn help_displays() {
        uploader()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Upload Hunter cache files to GitHub"));
    }

    #[test]
    fn version_displays() {
        uploader()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("hunter-cache-upload"));
    }

    #[test]
    fn missing_required_args_fails() {
        uploader()
            .assert()
            .failure()
            .stderr(predicate::str::contains("--username"));
    }

    #[test]
    fn nonexistent_cache_dir_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut cmd = uploader();
        base_args(&mut cmd, &root.path().join("Cache"), &root.path().join("tmp"));
        cmd.env("GITHUB_USER_PASSWORD", "token")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not a directory"));
    }

    #[test]
    fn misnamed_cache_dir_fails() {
        let root = tempfile::tempdir().unwrap();
        let wrong = root.path().join("cache");
        fs::create_dir(&wrong).unwrap();

        let mut cmd = uploader();
        base_args(&mut cmd, &wrong, &root.path().join("tmp"));
        cmd.env("GITHUB_USER_PASSWORD", "token")
            .assert()
            .failure()
            .stderr(predicate::str::contains("should end with Cache"));
    }

    #[test]
    fn missing_password_fails() {
        let root = tempfile::tempdir().unwrap();
        let cache = root.path().join("Cache");
        fs::create_dir(&cache).unwrap();

        let mut cmd = uploader();
        base_args(&mut cmd, &cache, &root.path().join("tmp"));
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("GITHUB_USER_PASSWORD"));
    }

    #[test]
    fn empty_password_fails() {
        let root = tempfile::tempdir().unwrap();
        let cache = root.path().join("Cache");
        fs::create_dir(&cache).unwrap();

        let mut cmd = uploader();
        base_args(&mut cmd, &cache, &root.path().join("tmp"));
        cmd.env("GITHUB_USER_PASSWORD", "")
            .assert()
            .failure()
            .stderr(predicate::str::contains("GITHUB_USER_PASSWORD"));
    }

    #[test]
    fn empty_cache_tree_uploads_nothing_and_succeeds() {
        let root = tempfile::tempdir().unwrap();
        let cache = root.path().join("Cache");
        fs::create_dir_all(cache.join("meta")).unwrap();
        fs::create_dir_all(cache.join("raw")).unwrap();

        let mut cmd = uploader();
        base_args(&mut cmd, &cache, &root.path().join("tmp"));
        cmd.env("GITHUB_USER_PASSWORD", "token").assert().success();
    }

    #[test]
    fn server_sourced_only_tree_uploads_nothing_and_succeeds() {
        let root = tempfile::tempdir().unwrap();
        let cache = root.path().join("Cache");
        let deps = cache
            .join("meta")
            .join("toolchain-x")
            .join("zlib")
            .join("1.2.11")
            .join("archive-a")
            .join("args-b")
            .join("Release")
            .join("int-c")
            .join("deps-d");
        fs::create_dir_all(&deps).unwrap();
        fs::create_dir_all(cache.join("raw")).unwrap();
        fs::write(deps.join("CACHE.DONE"), "").unwrap();
        fs::write(deps.join("from.server"), "").unwrap();

        // The only entry came from the server, so the run ends before
        // touching the network.
        let mut cmd = uploader();
        base_args(&mut cmd, &cache, &root.path().join("tmp"));
        cmd.env("GITHUB_USER_PASSWORD", "token").assert().success();
    }
}
