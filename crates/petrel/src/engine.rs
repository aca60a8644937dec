//
// engine.rs
//
// Narrow interface to the external symbol engine
//

use std::collections::HashSet;
use std::time::SystemTime;

use async_trait::async_trait;
use serde_json::Value;
use tower_lsp::lsp_types::Url;

/// The documents the engine currently holds indexed, plus the instant the
/// snapshot was taken. Fetched once per full-index run and used as the diff
/// baseline: discovered files older than `timestamp` that the engine
/// already knows are skipped.
#[derive(Debug, Clone)]
pub struct KnownDocumentsSnapshot {
    pub document_uris: HashSet<Url>,
    pub timestamp: SystemTime,
}

impl KnownDocumentsSnapshot {
    pub fn empty() -> Self {
        Self {
            document_uris: HashSet::new(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Everything the indexing core needs from the symbol engine.
///
/// Parsing, completion, hover and the rest of the engine stay behind this
/// seam; the coordinator only submits documents, forgets them, and asks
/// what the engine already knows. Configuration hooks let the embedding
/// server hand user settings through without the core interpreting them.
#[async_trait]
pub trait SymbolEngine: Send + Sync {
    /// Snapshot of the engine's current document set.
    async fn known_documents(&self) -> KnownDocumentsSnapshot;

    /// Submit one document for symbol discovery. Returns the number of
    /// symbols the engine found in it.
    async fn discover_symbols(&self, uri: &Url, text: &str) -> anyhow::Result<usize>;

    /// Drop a document from the engine's index.
    async fn forget(&self, uri: &Url) -> anyhow::Result<()>;

    /// Current engine configuration.
    async fn configuration(&self) -> Value;

    /// Replace the engine configuration.
    async fn update_configuration(&self, settings: Value);
}
