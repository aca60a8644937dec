//
// config.rs
//
// Indexing configuration
//

use serde_json::Value;

/// File-name pattern for the primary source extension. Full-workspace
/// indexing always includes it, whatever the configured associations say.
pub const PRIMARY_ASSOCIATION: &str = "*.php";

/// Settings that shape discovery and indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingConfig {
    /// File-name glob patterns selecting indexable files
    pub associations: Vec<String>,
    /// Exclusion globs matched against folder-relative paths
    pub exclude_globs: Vec<String>,
    /// Whether vendor packages declared in `composer.json` are indexed
    pub use_composer: bool,
    /// Files larger than this are never submitted for indexing
    pub max_file_size_bytes: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            associations: vec![PRIMARY_ASSOCIATION.to_string()],
            exclude_globs: vec![
                "**/.git/**".to_string(),
                "**/node_modules/**".to_string(),
            ],
            use_composer: true,
            max_file_size_bytes: 1_000_000,
        }
    }
}

impl IndexingConfig {
    /// Association set used for full-workspace indexing: the configured
    /// patterns, extended with the primary source pattern if absent.
    pub fn indexing_associations(&self) -> Vec<String> {
        let mut patterns = self.associations.clone();
        if !patterns.iter().any(|p| p == PRIMARY_ASSOCIATION) {
            patterns.push(PRIMARY_ASSOCIATION.to_string());
        }
        patterns
    }
}

/// Parse indexing configuration from LSP settings.
///
/// Reads the top-level `files` section (`associations`, `exclude`,
/// `maxSize`) and `composer.enabled` from a serde_json::Value. Only fields
/// present in the provided JSON are applied; absent fields retain their
/// defaults from `IndexingConfig::default()`. Returns `None` if the
/// top-level `files` section is missing.
pub fn parse_indexing_config(settings: &Value) -> Option<IndexingConfig> {
    let files = settings.get("files")?;

    let mut config = IndexingConfig::default();

    if let Some(patterns) = files.get("associations").and_then(|v| v.as_array()) {
        let patterns: Vec<String> = patterns
            .iter()
            .filter_map(|p| p.as_str())
            .map(str::to_string)
            .collect();
        if !patterns.is_empty() {
            config.associations = patterns;
        }
    }
    if let Some(patterns) = files.get("exclude").and_then(|v| v.as_array()) {
        config.exclude_globs = patterns
            .iter()
            .filter_map(|p| p.as_str())
            .map(str::to_string)
            .collect();
    }
    if let Some(v) = files.get("maxSize").and_then(|v| v.as_u64()) {
        config.max_file_size_bytes = v;
    }
    if let Some(v) = settings
        .get("composer")
        .and_then(|c| c.get("enabled"))
        .and_then(|v| v.as_bool())
    {
        config.use_composer = v;
    }

    Some(config)
}
