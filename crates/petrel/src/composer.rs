//
// composer.rs
//
// Composer manifest reading: declared vendor packages only
//

use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;

/// Manifest file name looked up at each workspace folder root
pub const MANIFEST_FILE: &str = "composer.json";

/// The subset of `composer.json` the indexer consumes. Only the keys of
/// `require` and `require-dev` matter; version constraints and every other
/// section of the manifest are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ComposerManifest {
    #[serde(default)]
    require: serde_json::Map<String, serde_json::Value>,
    #[serde(default, rename = "require-dev")]
    require_dev: serde_json::Map<String, serde_json::Value>,
}

impl ComposerManifest {
    /// Declared package names in manifest order, `require` before
    /// `require-dev`, filtered down to names that map to a `vendor/`
    /// directory pair.
    pub fn package_names(&self) -> Vec<String> {
        self.require
            .keys()
            .chain(self.require_dev.keys())
            .filter(|name| {
                if !is_safe_package_name(name) {
                    log::warn!("Skipping suspicious package name: {}", name);
                    return false;
                }
                // Platform requirements (php, ext-*, lib-*) have no
                // vendor directory and never contribute files.
                name.contains('/')
            })
            .cloned()
            .collect()
    }
}

/// Package names become `vendor/<name>` path segments; anything that could
/// escape the vendor tree is rejected.
fn is_safe_package_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.contains("..")
        && !name.contains('\\')
}

/// Read the packages a folder declares.
///
/// A missing manifest means the project has no composer dependencies; an
/// unreadable or malformed one is treated the same way, with a warning.
/// Neither case is a failure.
pub fn package_names(folder: &Path) -> Vec<String> {
    let manifest_path = folder.join(MANIFEST_FILE);
    let text = match std::fs::read_to_string(&manifest_path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::trace!("No {} in {}", MANIFEST_FILE, folder.display());
            return Vec::new();
        }
        Err(err) => {
            log::warn!("Failed to read {}: {}", manifest_path.display(), err);
            return Vec::new();
        }
    };

    match serde_json::from_str::<ComposerManifest>(&text) {
        Ok(manifest) => manifest.package_names(),
        Err(err) => {
            log::warn!("Ignoring malformed {}: {}", manifest_path.display(), err);
            Vec::new()
        }
    }
}
