//! Cache entry model
//!
//! One entry is one unit of cached build output, identified by its
//! `CACHE.DONE` completion marker. The marker sits at the bottom of a
//! fixed-depth directory schema under `<cache>/meta`:
//!
//! ```text
//! meta/<toolchain>/<package>[/<component>]/<version>/<archive>/<args>/<type>/<internal-deps>/<deps>/CACHE.DONE
//! ```
//!
//! The optional component level is marked by a reserved `__` name prefix.
//! The schema is parsed in one upward pass into a tagged record; a tree
//! that runs out of levels before reaching `meta` fails construction.

use crate::error::{UploadError, UploadResult};
use crate::github::GithubClient;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Completion marker handled by the scanner
pub const CACHE_DONE: &str = "CACHE.DONE";
/// Secondary completion marker uploaded in the same pass
pub const BASIC_DEPS_DONE: &str = "basic-deps.DONE";
/// Marker placed by the downloader for entries fetched from the server
pub const FROM_SERVER: &str = "from.server";
/// File holding the SHA-1 of the entry's raw archive
pub const CACHE_SHA1: &str = "cache.sha1";

// Always ignored, at every level. `DONE` is managed by Hunter itself and
// has no upload path here.
const IGNORED: [&str; 2] = ["cmake.lock", "DONE"];

/// Which sweep a metadata upload belongs to.
///
/// Completion markers go strictly after everything they complete, so a
/// marker visible remotely guarantees its files are already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaPass {
    /// Ordinary metadata files, markers excluded
    Payload,
    /// Only the `CACHE.DONE`/`basic-deps.DONE` markers
    Markers,
}

/// What the payload pass expects to find at a directory level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expectation {
    NonEmpty,
    Empty,
}

/// The identity chain of one cache entry, bottom level last.
///
/// Every field is the absolute path of one directory level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryIdentity {
    pub toolchain: PathBuf,
    pub package: PathBuf,
    pub component: Option<PathBuf>,
    pub version: PathBuf,
    pub archive: PathBuf,
    pub args: PathBuf,
    pub build_type: PathBuf,
    pub internal_deps: PathBuf,
    pub deps: PathBuf,
}

impl EntryIdentity {
    /// Parse the fixed-depth schema by walking up from the deps directory
    /// (the one containing the completion marker). `meta_root` must be the
    /// level directly above `toolchain`.
    pub fn parse(deps_dir: &Path, meta_root: &Path) -> UploadResult<Self> {
        let mut up = Ancestors::new(deps_dir);
        let deps = deps_dir.to_path_buf();
        let internal_deps = up.next("internal-deps")?;
        let build_type = up.next("type")?;
        let args = up.next("args")?;
        let archive = up.next("archive")?;
        let version = up.next("version")?;

        // A `__`-prefixed name above the version level is a component;
        // otherwise that level is already the package.
        let next = up.next("package")?;
        let (component, package) = if has_component_prefix(&next) {
            (Some(next), up.next("package")?)
        } else {
            (None, next)
        };
        let toolchain = up.next("toolchain")?;

        let meta = up.next("meta")?;
        if meta != meta_root {
            return Err(UploadError::SchemaViolation {
                path: deps_dir.to_path_buf(),
                reason: format!(
                    "expected {} above the toolchain level, found {}",
                    meta_root.display(),
                    meta.display()
                ),
            });
        }

        Ok(Self {
            toolchain,
            package,
            component,
            version,
            archive,
            args,
            build_type,
            internal_deps,
            deps,
        })
    }

    /// Directory levels in upload order, with the payload-pass
    /// expectation for each. The deps level goes first, the toolchain
    /// level last.
    fn levels(&self) -> Vec<(&Path, Expectation)> {
        let mut levels = vec![
            (self.deps.as_path(), Expectation::NonEmpty),
            (self.internal_deps.as_path(), Expectation::NonEmpty),
            (self.build_type.as_path(), Expectation::NonEmpty),
            (self.args.as_path(), Expectation::NonEmpty),
            (self.archive.as_path(), Expectation::NonEmpty),
            (self.version.as_path(), Expectation::Empty),
        ];
        if let Some(component) = &self.component {
            levels.push((component.as_path(), Expectation::Empty));
        }
        levels.push((self.package.as_path(), Expectation::Empty));
        levels.push((self.toolchain.as_path(), Expectation::NonEmpty));
        levels
    }
}

/// Upward walker that reports which schema level ran out
struct Ancestors {
    current: PathBuf,
    origin: PathBuf,
}

impl Ancestors {
    fn new(start: &Path) -> Self {
        Self {
            current: start.to_path_buf(),
            origin: start.to_path_buf(),
        }
    }

    fn next(&mut self, level: &str) -> UploadResult<PathBuf> {
        let parent = match self.current.parent() {
            Some(p) if !p.as_os_str().is_empty() => Some(p.to_path_buf()),
            _ => None,
        };
        match parent {
            Some(p) => {
                self.current = p.clone();
                Ok(p)
            }
            None => Err(UploadError::SchemaViolation {
                path: self.origin.clone(),
                reason: format!("tree too shallow, no {level} level"),
            }),
        }
    }
}

fn has_component_prefix(dir: &Path) -> bool {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("__"))
        .unwrap_or(false)
}

/// One discovered cache entry: a read-only view over the directory tree
#[derive(Debug, Clone)]
pub struct CacheEntry {
    marker_path: PathBuf,
    identity: EntryIdentity,
    raw_dir: PathBuf,
    meta_root: PathBuf,
    from_server: PathBuf,
    sha1_file: PathBuf,
    temp_dir: PathBuf,
}

impl CacheEntry {
    /// Build an entry from the path of its completion marker.
    ///
    /// Fails if the marker does not exist or the directory schema does
    /// not hold.
    pub fn new(marker_path: &Path, cache_dir: &Path, temp_dir: &Path) -> UploadResult<Self> {
        if !marker_path.is_file() {
            return Err(UploadError::MarkerMissing(marker_path.to_path_buf()));
        }
        let deps_dir = marker_path
            .parent()
            .ok_or_else(|| UploadError::SchemaViolation {
                path: marker_path.to_path_buf(),
                reason: "marker has no parent directory".to_string(),
            })?;

        let meta_root = cache_dir.join("meta");
        let identity = EntryIdentity::parse(deps_dir, &meta_root)?;

        Ok(Self {
            marker_path: marker_path.to_path_buf(),
            from_server: deps_dir.join(FROM_SERVER),
            sha1_file: deps_dir.join(CACHE_SHA1),
            identity,
            raw_dir: cache_dir.join("raw"),
            meta_root,
            temp_dir: temp_dir.to_path_buf(),
        })
    }

    /// Path of the completion marker this entry was discovered by
    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// The parsed identity chain
    pub fn identity(&self) -> &EntryIdentity {
        &self.identity
    }

    /// True when the entry was fetched from the server in a prior run
    /// rather than built locally
    pub fn is_server_sourced(&self) -> bool {
        self.from_server.exists()
    }

    /// Upload this entry's raw archive as a release asset.
    ///
    /// The archive lives under `<cache>/raw` and is named by the SHA-1
    /// recorded in the entry's `cache.sha1` file.
    pub fn upload_raw(&self, client: &GithubClient) -> UploadResult<()> {
        let sha1 = fs::read_to_string(&self.sha1_file)
            .map_err(|e| UploadError::io(format!("reading {}", self.sha1_file.display()), e))?;
        let raw = self.raw_dir.join(format!("{}.tar.bz2", sha1.trim()));
        client.upload_raw_file(&raw)
    }

    /// Upload the metadata files of one pass through the idempotent-put
    /// primitive
    pub fn upload_meta(&self, client: &GithubClient, pass: MetaPass) -> UploadResult<()> {
        for (local, remote) in self.collect_uploads(pass)? {
            info!("Uploading file: {}", remote);
            client.put_idempotent(&local, &remote, &self.temp_dir)?;
        }
        Ok(())
    }

    /// Plan one pass over all identity levels: which files get uploaded,
    /// and under which repository path.
    ///
    /// The payload pass enforces the per-level expectations: the version,
    /// component and package levels must hold no uploadable files, every
    /// other level must hold at least one.
    pub fn collect_uploads(&self, pass: MetaPass) -> UploadResult<Vec<(PathBuf, String)>> {
        let mut plan = Vec::new();
        for (dir, expectation) in self.identity.levels() {
            let selected = select_files(dir, pass)?;
            if pass == MetaPass::Payload {
                match expectation {
                    Expectation::Empty if !selected.is_empty() => {
                        return Err(UploadError::UnexpectedFiles(dir.to_path_buf()));
                    }
                    Expectation::NonEmpty if selected.is_empty() => {
                        return Err(UploadError::NoFilesInDir(dir.to_path_buf()));
                    }
                    _ => {}
                }
            }
            for local in selected {
                let remote = self.remote_path(&local)?;
                plan.push((local, remote));
            }
        }
        Ok(plan)
    }

    /// Repository path for a local metadata file: relative to the meta
    /// root, separators normalized to `/`
    fn remote_path(&self, local: &Path) -> UploadResult<String> {
        let relative = local
            .strip_prefix(&self.meta_root)
            .map_err(|_| UploadError::SchemaViolation {
                path: local.to_path_buf(),
                reason: format!("not under meta root {}", self.meta_root.display()),
            })?;
        let mut segments = Vec::new();
        for component in relative.components() {
            let segment = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| UploadError::NonUtf8Path(local.to_path_buf()))?;
            segments.push(segment);
        }
        Ok(segments.join("/"))
    }
}

/// List the files in one directory that belong to `pass`.
///
/// `cmake.lock` and `DONE` are ignored everywhere; subdirectories are
/// never selected.
fn select_files(dir: &Path, pass: MetaPass) -> UploadResult<Vec<PathBuf>> {
    let mut selected = Vec::new();
    let read = fs::read_dir(dir)
        .map_err(|e| UploadError::io(format!("listing {}", dir.display()), e))?;
    for dirent in read {
        let dirent = dirent.map_err(|e| UploadError::io(format!("listing {}", dir.display()), e))?;
        let name = dirent.file_name();
        let Some(name) = name.to_str() else {
            return Err(UploadError::NonUtf8Path(dirent.path()));
        };
        if IGNORED.contains(&name) {
            continue;
        }
        let is_marker = name == CACHE_DONE || name == BASIC_DEPS_DONE;
        let wanted = match pass {
            MetaPass::Payload => !is_marker,
            MetaPass::Markers => is_marker,
        };
        if !wanted {
            continue;
        }
        let path = dirent.path();
        if path.is_file() {
            selected.push(path);
        }
    }
    selected.sort();
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    /// Build `meta/<levels...>` under a `Cache` root, create the marker
    /// and `cache.sha1`, and return (root guard, cache dir, marker path).
    fn build_tree(levels: &[&str]) -> (TempDir, PathBuf, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let cache_dir = root.path().join("Cache");
        let mut deps_dir = cache_dir.join("meta");
        for level in levels {
            deps_dir.push(level);
        }
        fs::create_dir_all(&deps_dir).unwrap();
        fs::create_dir_all(cache_dir.join("raw")).unwrap();

        let marker = deps_dir.join(CACHE_DONE);
        File::create(&marker).unwrap();
        fs::write(deps_dir.join(CACHE_SHA1), "0123abcd").unwrap();
        (root, cache_dir, marker)
    }

    const PLAIN_LEVELS: [&str; 8] = [
        "toolchain-x",
        "zlib",
        "1.2.11",
        "archive-a",
        "args-b",
        "Release",
        "int-c",
        "deps-d",
    ];

    const COMPONENT_LEVELS: [&str; 9] = [
        "toolchain-x",
        "qt",
        "__qtbase",
        "5.12.0",
        "archive-a",
        "args-b",
        "Release",
        "int-c",
        "deps-d",
    ];

    #[test]
    fn identity_round_trips_to_marker_path() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        let id = entry.identity();

        // Walking back down the chain reproduces the marker path.
        assert_eq!(id.deps.join(CACHE_DONE), marker);
        assert_eq!(id.deps.parent().unwrap(), id.internal_deps);
        assert_eq!(id.internal_deps.parent().unwrap(), id.build_type);
        assert_eq!(id.build_type.parent().unwrap(), id.args);
        assert_eq!(id.args.parent().unwrap(), id.archive);
        assert_eq!(id.archive.parent().unwrap(), id.version);
        assert_eq!(id.version.parent().unwrap(), id.package);
        assert_eq!(id.package.parent().unwrap(), id.toolchain);
        assert_eq!(id.toolchain.parent().unwrap(), cache_dir.join("meta"));
        assert_eq!(id.component, None);
    }

    #[test]
    fn component_level_is_detected_by_prefix() {
        let (_root, cache_dir, marker) = build_tree(&COMPONENT_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        let id = entry.identity();

        let component = id.component.as_ref().expect("component level");
        assert_eq!(component.file_name().unwrap(), "__qtbase");
        assert_eq!(id.package.file_name().unwrap(), "qt");
        assert_eq!(id.version.parent().unwrap(), component.as_path());
    }

    #[test]
    fn too_shallow_tree_fails_construction() {
        let (_root, cache_dir, marker) = build_tree(&["toolchain-x", "zlib", "deps-d"]);
        let result = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp"));
        assert!(matches!(result, Err(UploadError::SchemaViolation { .. })));
    }

    #[test]
    fn wrong_meta_root_fails_construction() {
        // One level too deep: the walk lands inside meta, not on it.
        let mut levels = PLAIN_LEVELS.to_vec();
        levels.insert(0, "extra");
        let (_root, cache_dir, marker) = build_tree(&levels);
        let result = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp"));
        assert!(matches!(result, Err(UploadError::SchemaViolation { .. })));
    }

    #[test]
    fn missing_marker_fails_construction() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        fs::remove_file(&marker).unwrap();
        let result = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp"));
        assert!(matches!(result, Err(UploadError::MarkerMissing(_))));
    }

    #[test]
    fn server_sourced_detection() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        assert!(!entry.is_server_sourced());

        File::create(marker.parent().unwrap().join(FROM_SERVER)).unwrap();
        assert!(entry.is_server_sourced());
    }

    #[test]
    fn payload_pass_selects_only_non_markers() {
        let (_root, _cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let deps_dir = marker.parent().unwrap();
        fs::write(deps_dir.join("foo.txt"), "data").unwrap();
        File::create(deps_dir.join(BASIC_DEPS_DONE)).unwrap();
        File::create(deps_dir.join("cmake.lock")).unwrap();

        let selected = select_files(deps_dir, MetaPass::Payload).unwrap();
        let names: Vec<_> = selected
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec![CACHE_SHA1.to_string(), "foo.txt".to_string()]);
    }

    #[test]
    fn marker_pass_selects_only_markers() {
        let (_root, _cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let deps_dir = marker.parent().unwrap();
        fs::write(deps_dir.join("foo.txt"), "data").unwrap();
        File::create(deps_dir.join(BASIC_DEPS_DONE)).unwrap();

        let selected = select_files(deps_dir, MetaPass::Markers).unwrap();
        let names: Vec<_> = selected
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![CACHE_DONE.to_string(), BASIC_DEPS_DONE.to_string()]
        );
    }

    #[test]
    fn done_file_is_never_selected() {
        let (_root, _cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let deps_dir = marker.parent().unwrap();
        File::create(deps_dir.join("DONE")).unwrap();

        for pass in [MetaPass::Payload, MetaPass::Markers] {
            let selected = select_files(deps_dir, pass).unwrap();
            assert!(selected
                .iter()
                .all(|p| p.file_name().unwrap() != "DONE"));
        }
    }

    /// Populate every level so the payload expectations hold
    fn populate_levels(entry: &CacheEntry) {
        let id = entry.identity();
        for dir in [
            &id.internal_deps,
            &id.build_type,
            &id.args,
            &id.archive,
            &id.toolchain,
        ] {
            fs::write(dir.join("info.txt"), "meta").unwrap();
        }
    }

    #[test]
    fn payload_plan_covers_all_levels_and_no_markers() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        populate_levels(&entry);

        let plan = entry.collect_uploads(MetaPass::Payload).unwrap();
        // cache.sha1 at the deps level plus info.txt at five levels
        assert_eq!(plan.len(), 6);
        for (_, remote) in &plan {
            assert!(!remote.ends_with(CACHE_DONE));
            assert!(!remote.ends_with(BASIC_DEPS_DONE));
            assert!(!remote.contains('\\'));
            assert!(remote.starts_with("toolchain-x/"));
        }
    }

    #[test]
    fn marker_plan_contains_only_markers() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        populate_levels(&entry);

        let plan = entry.collect_uploads(MetaPass::Markers).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan[0].1.ends_with(CACHE_DONE));
    }

    #[test]
    fn stray_file_at_version_level_is_fatal() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        populate_levels(&entry);
        fs::write(entry.identity().version.join("stray.txt"), "x").unwrap();

        let result = entry.collect_uploads(MetaPass::Payload);
        assert!(matches!(result, Err(UploadError::UnexpectedFiles(_))));
    }

    #[test]
    fn ignored_files_at_version_level_are_fine() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        populate_levels(&entry);
        File::create(entry.identity().version.join("cmake.lock")).unwrap();
        File::create(entry.identity().version.join("DONE")).unwrap();

        assert!(entry.collect_uploads(MetaPass::Payload).is_ok());
    }

    #[test]
    fn empty_payload_level_is_fatal() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        // Levels above deps left empty on purpose.
        let result = entry.collect_uploads(MetaPass::Payload);
        assert!(matches!(result, Err(UploadError::NoFilesInDir(_))));
    }

    #[test]
    fn marker_pass_skips_all_expectations() {
        let (_root, cache_dir, marker) = build_tree(&PLAIN_LEVELS);
        let entry = CacheEntry::new(&marker, &cache_dir, &cache_dir.join("tmp")).unwrap();
        // Empty levels and a stray version file would both be fatal in
        // the payload pass.
        fs::write(entry.identity().version.join("stray.txt"), "x").unwrap();
        assert!(entry.collect_uploads(MetaPass::Markers).is_ok());
    }
}
