//
// state.rs
//
// Workspace folder set and per-workspace cache key
//

use std::collections::HashMap;

use tower_lsp::lsp_types::Url;

use crate::config::IndexingConfig;

/// A workspace root folder.
///
/// The uri is normalized to always end with a path separator so that
/// child-uri prefix checks cannot match a sibling folder with a shared
/// name prefix (`/proj` vs `/proj-docs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub uri: Url,
    pub name: String,
}

impl Folder {
    pub fn new(uri: Url, name: impl Into<String>) -> Self {
        Self {
            uri: normalize_folder_uri(uri),
            name: name.into(),
        }
    }

    /// Whether `uri` points inside this folder.
    pub fn contains(&self, uri: &Url) -> bool {
        uri.as_str().starts_with(self.uri.as_str())
    }
}

/// Ensure a folder uri carries a trailing path separator.
pub fn normalize_folder_uri(uri: Url) -> Url {
    if uri.cannot_be_a_base() || uri.path().ends_with('/') {
        return uri;
    }
    let mut normalized = uri.clone();
    normalized.set_path(&format!("{}/", uri.path()));
    normalized
}

/// Shared workspace state: the configured folders and indexing settings.
///
/// Folders are a mapping keyed by normalized uri (set semantics) and are
/// mutated only by the explicit add/remove events the protocol layer
/// forwards. Constructed once per server process and shared as
/// `Arc<tokio::sync::RwLock<WorkspaceState>>`.
pub struct WorkspaceState {
    folders: HashMap<Url, Folder>,
    pub config: IndexingConfig,
}

impl WorkspaceState {
    pub fn new(config: IndexingConfig) -> Self {
        Self {
            folders: HashMap::new(),
            config,
        }
    }

    pub fn add_folder(&mut self, uri: Url, name: impl Into<String>) {
        let folder = Folder::new(uri, name);
        self.folders.insert(folder.uri.clone(), folder);
    }

    pub fn remove_folder(&mut self, uri: &Url) {
        let key = normalize_folder_uri(uri.clone());
        self.folders.remove(&key);
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Snapshot of the configured folders, in stable (sorted-by-uri) order.
    pub fn folders(&self) -> Vec<Folder> {
        let mut folders: Vec<Folder> = self.folders.values().cloned().collect();
        folders.sort_by(|a, b| a.uri.as_str().cmp(b.uri.as_str()));
        folders
    }

    /// Cache key identifying this workspace: a 32-bit hash of the
    /// concatenated folder uris, rendered as 8 hex digits. Folder uris are
    /// sorted first so the key does not depend on map iteration order.
    pub fn workspace_cache_key(&self) -> String {
        let mut uris: Vec<&str> = self.folders.keys().map(|u| u.as_str()).collect();
        uris.sort_unstable();
        format!("{:08x}", fnv1a_32(&uris.concat()))
    }
}

/// 32-bit FNV-1a
fn fnv1a_32(input: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 16_777_619;
    input
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ byte as u32).wrapping_mul(PRIME))
}
