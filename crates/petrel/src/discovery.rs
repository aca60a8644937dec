//
// discovery.rs
//
// Composer-aware discovery of indexable workspace files
//
// Two phases per folder: declared vendor packages first (one glob per
// package, skipping test directories), then the folder's own sources
// (excluding the vendor tree and caller-supplied globs). Errors in either
// phase degrade to an empty result for that phase; discovery never fails
// as a whole because one folder or package is unreadable.
//

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use glob::Pattern;
use regex::Regex;
use tower_lsp::lsp_types::Url;
use walkdir::WalkDir;

use crate::composer;
use crate::config::IndexingConfig;
use crate::file_system::{self, FileInfo, UriScheme};
use crate::state::Folder;

const VENDOR_DIR: &str = "vendor";

/// Compiled matching rules for one discovery pass
struct Matcher {
    associations: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl Matcher {
    fn new(associations: &[String], excludes: &[String]) -> Self {
        Self {
            associations: compile_patterns(associations),
            excludes: compile_patterns(excludes),
        }
    }

    fn matches_file_name(&self, name: &str) -> bool {
        self.associations.iter().any(|p| p.matches(name))
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        self.excludes.iter().any(|p| p.matches_path(relative))
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|raw| match Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                log::warn!("Ignoring invalid glob pattern {:?}: {}", raw, err);
                None
            }
        })
        .collect()
}

/// Matches a `test`/`tests` directory component, any case
fn test_dir_regex() -> Regex {
    Regex::new(r"(?i)^tests?$").unwrap()
}

/// Discover every indexable file in the given folders.
///
/// The walk runs on the blocking pool; the returned order is vendor files
/// before sources within each folder, folders in the order given. A guard
/// set shared across folders keeps a vendor package claimed by one folder
/// from being collected again for another.
pub async fn discover_all(
    folders: &[Folder],
    associations: &[String],
    config: &IndexingConfig,
) -> Vec<FileInfo> {
    let folders = folders.to_vec();
    let associations = associations.to_vec();
    let config = config.clone();
    tokio::task::spawn_blocking(move || discover_all_blocking(&folders, &associations, &config))
        .await
        .unwrap_or_else(|err| {
            log::warn!("Discovery task failed: {}", err);
            Vec::new()
        })
}

fn discover_all_blocking(
    folders: &[Folder],
    associations: &[String],
    config: &IndexingConfig,
) -> Vec<FileInfo> {
    let matcher = Matcher::new(associations, &config.exclude_globs);
    let mut claimed_packages: HashSet<String> = HashSet::new();
    let mut discovered = Vec::new();

    for folder in folders {
        discover_folder(folder, &matcher, config, &mut claimed_packages, &mut discovered);
    }

    log::info!(
        "Discovered {} files across {} folders",
        discovered.len(),
        folders.len()
    );
    discovered
}

fn discover_folder(
    folder: &Folder,
    matcher: &Matcher,
    config: &IndexingConfig,
    claimed_packages: &mut HashSet<String>,
    out: &mut Vec<FileInfo>,
) {
    if UriScheme::of(&folder.uri) != UriScheme::LocalFile {
        log::trace!("Skipping non-local folder: {}", folder.uri);
        return;
    }
    let root = match folder.uri.to_file_path() {
        Ok(root) => root,
        Err(_) => {
            log::warn!("Folder uri has no filesystem path: {}", folder.uri);
            return;
        }
    };

    log::info!("Scanning folder: {}", folder.uri);
    if config.use_composer {
        vendor_phase(&root, matcher, claimed_packages, out);
    }
    source_phase(&root, matcher, config.use_composer, out);
}

/// Collect files from the vendor packages the folder's manifest declares.
///
/// One glob per package, scoped to that package's directory, restricted to
/// the association patterns, with `test(s)` directories skipped.
fn vendor_phase(
    root: &Path,
    matcher: &Matcher,
    claimed_packages: &mut HashSet<String>,
    out: &mut Vec<FileInfo>,
) {
    let packages = composer::package_names(root);
    if packages.is_empty() {
        return;
    }
    let test_dir = test_dir_regex();

    for package in packages {
        if !claimed_packages.insert(package.clone()) {
            log::trace!("Vendor package already claimed: {}", package);
            continue;
        }

        let package_root = root.join(VENDOR_DIR).join(&package);
        let pattern = format!("{}/**/*", package_root.display());
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("Bad vendor glob for {}: {}", package, err);
                continue;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    log::warn!("Skipping unreadable vendor path: {}", err);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !matcher.matches_file_name(name) {
                continue;
            }
            if in_test_directory(&path, &package_root, &test_dir) {
                continue;
            }
            push_file_info(&path, out);
        }
    }
}

/// Walk the folder's own sources, excluding the vendor tree (when composer
/// integration is on) and the caller-supplied exclude globs.
fn source_phase(root: &Path, matcher: &Matcher, skip_vendor: bool, out: &mut Vec<FileInfo>) {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if skip_vendor
                && entry.depth() == 1
                && entry.file_type().is_dir()
                && entry.file_name().to_str() == Some(VENDOR_DIR)
            {
                return false;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            !matcher.is_excluded(relative)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable path during discovery: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !matcher.matches_file_name(name) {
            continue;
        }
        push_file_info(entry.path(), out);
    }
}

fn in_test_directory(path: &Path, package_root: &Path, test_dir: &Regex) -> bool {
    let Ok(relative) = path.strip_prefix(package_root) else {
        return false;
    };
    let mut components: Vec<_> = relative.components().collect();
    components.pop(); // the file name itself
    components.iter().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| test_dir.is_match(s))
            .unwrap_or(false)
    })
}

fn push_file_info(path: &Path, out: &mut Vec<FileInfo>) {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            log::warn!("Failed to stat {}: {}", path.display(), err);
            return;
        }
    };
    match Url::from_file_path(path) {
        Ok(uri) => out.push(FileInfo::from_metadata(uri, &metadata)),
        Err(_) => log::warn!("Skipping path with no file uri: {}", path.display()),
    }
}

/// Restrict an arbitrary uri list to files that belong to a configured
/// folder under the same matching rules as `discover_all`: local scheme,
/// association match, caller excludes, and (when composer integration is
/// on) vendor files only from declared packages and outside their test
/// directories. Files that no longer exist are dropped.
///
/// This is the entry point for file-watch driven incremental updates.
pub async fn filter_known(
    uris: &[Url],
    folders: &[Folder],
    config: &IndexingConfig,
) -> Vec<FileInfo> {
    let matcher = Matcher::new(&config.associations, &config.exclude_globs);
    let test_dir = test_dir_regex();
    // Declared package directories per folder, read at most once per call
    let mut declared: HashMap<Url, HashSet<PathBuf>> = HashMap::new();
    let mut out = Vec::new();

    for uri in uris {
        if UriScheme::of(uri) != UriScheme::LocalFile {
            continue;
        }
        let Some(folder) = folders.iter().find(|f| f.contains(uri)) else {
            continue;
        };
        let (Ok(root), Ok(path)) = (folder.uri.to_file_path(), uri.to_file_path()) else {
            continue;
        };
        let Ok(relative) = path.strip_prefix(&root).map(Path::to_path_buf) else {
            continue;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !matcher.matches_file_name(name) {
            continue;
        }

        if config.use_composer && relative.starts_with(VENDOR_DIR) {
            let packages = declared
                .entry(folder.uri.clone())
                .or_insert_with(|| declared_package_dirs(&root));
            let package_rel: PathBuf = relative.components().take(3).collect();
            if !packages.contains(&package_rel) {
                continue;
            }
            if in_test_directory(&path, &root.join(&package_rel), &test_dir) {
                continue;
            }
        } else if matcher.is_excluded(&relative) {
            continue;
        }

        if let Some(info) = file_system::file_info(uri).await {
            out.push(info);
        }
    }

    out
}

fn declared_package_dirs(root: &Path) -> HashSet<PathBuf> {
    composer::package_names(root)
        .iter()
        .map(|package| Path::new(VENDOR_DIR).join(package))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixture_workspace::{
        create_fixture_workspace, write_fixture_workspace, FixtureConfig,
    };
    use tempfile::TempDir;

    fn fixture_folder(dir: &TempDir) -> Folder {
        Folder::new(Url::from_file_path(dir.path()).unwrap(), "fixture")
    }

    fn discover(folders: &[Folder], config: &IndexingConfig) -> Vec<FileInfo> {
        discover_all_blocking(folders, &config.indexing_associations(), config)
    }

    fn uris(files: &[FileInfo]) -> Vec<String> {
        files.iter().map(|f| f.uri.to_string()).collect()
    }

    #[test]
    fn test_plain_workspace_discovers_all_sources() {
        let fixture = FixtureConfig::plain();
        let workspace = create_fixture_workspace(&fixture);
        let folder = fixture_folder(&workspace);

        let files = discover(&[folder], &IndexingConfig::default());
        assert_eq!(files.len(), fixture.file_count);
    }

    #[test]
    fn test_vendor_phase_collects_declared_packages_only() {
        let fixture = FixtureConfig::with_vendor();
        let workspace = create_fixture_workspace(&fixture);
        // an installed but undeclared package must not be discovered
        let undeclared = workspace.path().join("vendor/other/pkg");
        std::fs::create_dir_all(&undeclared).unwrap();
        std::fs::write(undeclared.join("lib.php"), "<?php\n").unwrap();

        let folder = fixture_folder(&workspace);
        let files = discover(&[folder], &IndexingConfig::default());

        let expected =
            fixture.file_count + fixture.vendor_packages.len() * fixture.files_per_package;
        assert_eq!(files.len(), expected, "got: {:?}", uris(&files));
        assert!(!uris(&files).iter().any(|u| u.contains("vendor/other")));
    }

    #[test]
    fn test_vendor_test_directories_excluded() {
        let fixture = FixtureConfig::with_vendor();
        let workspace = create_fixture_workspace(&fixture);
        let folder = fixture_folder(&workspace);

        let files = discover(&[folder], &IndexingConfig::default());
        assert!(!uris(&files).iter().any(|u| u.contains("/tests/")));
    }

    #[test]
    fn test_vendor_test_directories_excluded_any_case() {
        let fixture = FixtureConfig {
            vendor_packages: vec!["acme/util".to_string()],
            files_per_package: 1,
            write_manifest: true,
            ..FixtureConfig::plain()
        };
        let workspace = create_fixture_workspace(&fixture);
        let upper = workspace.path().join("vendor/acme/util/Tests");
        std::fs::create_dir_all(&upper).unwrap();
        std::fs::write(upper.join("CaseTest.php"), "<?php\n").unwrap();

        let folder = fixture_folder(&workspace);
        let files = discover(&[folder], &IndexingConfig::default());
        assert!(!uris(&files).iter().any(|u| u.contains("CaseTest.php")));
    }

    #[test]
    fn test_composer_disabled_vendor_phase_contributes_nothing() {
        let fixture = FixtureConfig::with_vendor();
        let workspace = create_fixture_workspace(&fixture);
        let folder = fixture_folder(&workspace);

        let config = IndexingConfig {
            use_composer: false,
            ..Default::default()
        };
        let files = discover(&[folder], &config);

        // With composer integration off the vendor tree is ordinary source:
        // everything under it is walked, test directories included, and the
        // per-package restriction no longer applies.
        let vendor_files = fixture.vendor_packages.len() * fixture.files_per_package * 2;
        assert_eq!(files.len(), fixture.file_count + vendor_files);
    }

    #[test]
    fn test_unparsable_manifest_matches_disabled_composer() {
        let fixture = FixtureConfig::plain();
        let workspace = create_fixture_workspace(&fixture);
        std::fs::write(workspace.path().join("composer.json"), "{ not json").unwrap();
        let folder = fixture_folder(&workspace);

        let with_composer = discover(
            std::slice::from_ref(&folder),
            &IndexingConfig::default(),
        );
        let without_composer = discover(
            &[folder],
            &IndexingConfig {
                use_composer: false,
                ..Default::default()
            },
        );

        assert_eq!(uris(&with_composer), uris(&without_composer));
    }

    #[test]
    fn test_cross_folder_package_dedup() {
        let fixture = FixtureConfig {
            file_count: 1,
            vendor_packages: vec!["acme/util".to_string()],
            files_per_package: 2,
            write_manifest: true,
            ..FixtureConfig::plain()
        };
        let first = create_fixture_workspace(&fixture);
        let second = create_fixture_workspace(&fixture);

        let folders = vec![fixture_folder(&first), fixture_folder(&second)];
        let files = discover(&folders, &IndexingConfig::default());

        // Both folders declare acme/util; the second folder's copy is
        // skipped by the shared guard set, its sources are not.
        let expected = 2 * fixture.file_count + fixture.files_per_package;
        assert_eq!(files.len(), expected, "got: {:?}", uris(&files));
    }

    #[test]
    fn test_exclude_globs_applied_to_sources() {
        let fixture = FixtureConfig::plain();
        let workspace = create_fixture_workspace(&fixture);
        let generated = workspace.path().join("build/generated");
        std::fs::create_dir_all(&generated).unwrap();
        std::fs::write(generated.join("gen.php"), "<?php\n").unwrap();

        let folder = fixture_folder(&workspace);
        let config = IndexingConfig {
            exclude_globs: vec!["**/build/**".to_string()],
            ..Default::default()
        };
        let files = discover(&[folder], &config);
        assert_eq!(files.len(), fixture.file_count);
    }

    #[test]
    fn test_associations_select_file_types() {
        let workspace = TempDir::new().unwrap();
        std::fs::write(workspace.path().join("a.php"), "<?php\n").unwrap();
        std::fs::write(workspace.path().join("b.inc"), "<?php\n").unwrap();
        std::fs::write(workspace.path().join("c.txt"), "text").unwrap();

        let folder = fixture_folder(&workspace);
        let config = IndexingConfig {
            associations: vec!["*.php".to_string(), "*.inc".to_string()],
            ..Default::default()
        };
        let files = discover(&[folder], &config);

        let found = uris(&files);
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|u| u.ends_with("a.php")));
        assert!(found.iter().any(|u| u.ends_with("b.inc")));
    }

    #[test]
    fn test_non_local_folder_yields_nothing() {
        let folder = Folder::new(Url::parse("untitled:workspace").unwrap(), "odd");
        let files = discover(&[folder], &IndexingConfig::default());
        assert!(files.is_empty());
    }

    #[test]
    fn test_missing_folder_path_degrades_to_empty() {
        let folder = Folder::new(
            Url::parse("file:///no/such/petrel/folder").unwrap(),
            "ghost",
        );
        let files = discover(&[folder], &IndexingConfig::default());
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_filter_known_keeps_matching_sources() {
        let fixture = FixtureConfig::plain();
        let workspace = create_fixture_workspace(&fixture);
        let folder = fixture_folder(&workspace);

        let inside = Url::from_file_path(workspace.path().join("file_0.php")).unwrap();
        let outside = Url::parse("file:///elsewhere/file.php").unwrap();
        let wrong_type = Url::from_file_path(workspace.path().join("composer.json")).unwrap();
        let unsupported = Url::parse("untitled:Untitled-1").unwrap();

        let files = filter_known(
            &[inside.clone(), outside, wrong_type, unsupported],
            &[folder],
            &IndexingConfig::default(),
        )
        .await;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].uri, inside);
    }

    #[tokio::test]
    async fn test_filter_known_applies_excludes() {
        let workspace = TempDir::new().unwrap();
        let cache_dir = workspace.path().join("var/cache");
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join("a.php"), "<?php\n").unwrap();

        let folder = fixture_folder(&workspace);
        let uri = Url::from_file_path(cache_dir.join("a.php")).unwrap();
        let config = IndexingConfig {
            exclude_globs: vec!["**/var/**".to_string()],
            ..Default::default()
        };

        let files = filter_known(&[uri], &[folder], &config).await;
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_filter_known_vendor_rules() {
        let fixture = FixtureConfig::with_vendor();
        let workspace = create_fixture_workspace(&fixture);
        let undeclared = workspace.path().join("vendor/other/pkg");
        std::fs::create_dir_all(&undeclared).unwrap();
        std::fs::write(undeclared.join("lib.php"), "<?php\n").unwrap();

        let folder = fixture_folder(&workspace);
        let declared_uri =
            Url::from_file_path(workspace.path().join("vendor/acme/util/lib_0.php")).unwrap();
        let test_uri =
            Url::from_file_path(workspace.path().join("vendor/acme/util/tests/LibTest_0.php"))
                .unwrap();
        let undeclared_uri = Url::from_file_path(undeclared.join("lib.php")).unwrap();

        let files = filter_known(
            &[declared_uri.clone(), test_uri, undeclared_uri],
            &[folder],
            &IndexingConfig::default(),
        )
        .await;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].uri, declared_uri);
    }

    #[tokio::test]
    async fn test_filter_known_drops_deleted_files() {
        let workspace = TempDir::new().unwrap();
        write_fixture_workspace(workspace.path(), &FixtureConfig::plain());
        let folder = fixture_folder(&workspace);

        let gone = Url::from_file_path(workspace.path().join("file_9999.php")).unwrap();
        let files = filter_known(&[gone], &[folder], &IndexingConfig::default()).await;
        assert!(files.is_empty());
    }
}
