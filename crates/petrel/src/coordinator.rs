//! Incremental index coordinator.
//!
//! Owns the single active full-workspace indexing run, diffs discovery
//! results against the engine's known-document set, and drives full and
//! incremental re-indexing without starving interactive requests: control
//! is yielded back to the scheduler between files, and cancellation is
//! observed at those same file boundaries, never inside one file's
//! read or submission.
//!
//! # Serialization
//! The full-workspace walk and the file-watch driven incremental walks all
//! write to the engine's document set. A single walk lock serializes them
//! so the set is never updated from two walks at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::Url;

use crate::discovery;
use crate::engine::SymbolEngine;
use crate::file_system::{self, FileInfo};
use crate::state::WorkspaceState;

/// Summary of one full-workspace run. Consumed by logging and telemetry,
/// never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexResult {
    /// Files produced by discovery, oversize files included
    pub total_file_count: usize,
    /// Files actually read and submitted to the engine
    pub indexed_file_count: usize,
    /// Previously known files forgotten because discovery no longer saw them
    pub forgotten_file_count: usize,
    /// Sum of per-file symbol counts reported by the engine
    pub symbol_count: usize,
    pub elapsed: Duration,
    pub was_cancelled: bool,
}

impl IndexResult {
    /// The result of a run that never started: cancelled, zero counters.
    fn declined() -> Self {
        Self {
            was_cancelled: true,
            ..Self::default()
        }
    }
}

/// The currently running full-workspace index
struct ActiveRun {
    id: u64,
    token: CancellationToken,
}

/// Drives indexing against the external symbol engine.
///
/// Constructed once per server process and shared by reference with the
/// protocol handlers; the active-run slot is an owned field, so two server
/// instances in one process cannot trip over each other's cancellation
/// state.
pub struct IndexCoordinator {
    engine: Arc<dyn SymbolEngine>,
    state: Arc<RwLock<WorkspaceState>>,
    active_run: Mutex<Option<ActiveRun>>,
    next_run_id: AtomicU64,
    walk_lock: AsyncMutex<()>,
}

impl IndexCoordinator {
    pub fn new(engine: Arc<dyn SymbolEngine>, state: Arc<RwLock<WorkspaceState>>) -> Self {
        Self {
            engine,
            state,
            active_run: Mutex::new(None),
            next_run_id: AtomicU64::new(1),
            walk_lock: AsyncMutex::new(()),
        }
    }

    /// Index the whole workspace.
    ///
    /// If a run is already active the call either declines (returning a
    /// cancelled result with zero counters and no side effects) or, with
    /// `restart_if_running`, cancels the active run and supersedes it. The
    /// superseded run stops at its next file boundary and reports
    /// `was_cancelled` to its own caller.
    pub async fn index_workspace(&self, restart_if_running: bool) -> IndexResult {
        let token = CancellationToken::new();
        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut active = self.active_run.lock().unwrap();
            if let Some(run) = active.as_ref() {
                if !restart_if_running {
                    log::info!("Declining workspace index request: run {} is active", run.id);
                    return IndexResult::declined();
                }
                log::info!("Restarting workspace indexing: cancelling run {}", run.id);
                run.token.cancel();
            }
            *active = Some(ActiveRun {
                id: run_id,
                token: token.clone(),
            });
        }

        let started = Instant::now();
        // Wait for any in-flight walk (a just-cancelled run included) to
        // reach a file boundary and release the lock.
        let _walk = self.walk_lock.lock().await;

        let snapshot = self.engine.known_documents().await;
        let (folders, associations, config) = {
            let state = self.state.read().await;
            (
                state.folders(),
                state.config.indexing_associations(),
                state.config.clone(),
            )
        };

        log::info!(
            "Indexing run {} over {} folders ({} documents known to engine)",
            run_id,
            folders.len(),
            snapshot.document_uris.len()
        );
        let discovered = discovery::discover_all(&folders, &associations, &config).await;

        let mut result = IndexResult {
            total_file_count: discovered.len(),
            ..Default::default()
        };
        let mut remaining_known = snapshot.document_uris;

        for file in &discovered {
            if token.is_cancelled() {
                result.was_cancelled = true;
                break;
            }

            let already_known = remaining_known.remove(&file.uri);
            if already_known && file.modified < snapshot.timestamp {
                // unchanged since the engine last saw it
                continue;
            }
            if file.size > config.max_file_size_bytes {
                log::warn!(
                    "Not indexing {}: {} bytes exceeds the {} byte ceiling",
                    file.uri,
                    file.size,
                    config.max_file_size_bytes
                );
                continue;
            }

            match self.submit(file).await {
                Ok(symbols) => {
                    result.indexed_file_count += 1;
                    result.symbol_count += symbols;
                }
                Err(err) => log::warn!("Failed to index {}: {}", file.uri, err),
            }
            tokio::task::yield_now().await;
        }

        if !result.was_cancelled {
            // whatever the engine still holds was not rediscovered: forget it
            for uri in &remaining_known {
                match self.engine.forget(uri).await {
                    Ok(()) => result.forgotten_file_count += 1,
                    Err(err) => log::warn!("Failed to forget {}: {}", uri, err),
                }
                tokio::task::yield_now().await;
            }
        }

        result.elapsed = started.elapsed();
        self.release_run(run_id);
        log::info!(
            "Indexing run {} {}: {}/{} files indexed, {} forgotten, {} symbols in {}ms",
            run_id,
            if result.was_cancelled { "cancelled" } else { "complete" },
            result.indexed_file_count,
            result.total_file_count,
            result.forgotten_file_count,
            result.symbol_count,
            result.elapsed.as_millis()
        );
        result
    }

    /// Cancel the active full-workspace run, if any. The run winds down at
    /// its next file boundary; cancellation is not an error and the run
    /// still reports a (partial) result to its caller.
    pub fn cancel_indexing(&self) {
        let mut active = self.active_run.lock().unwrap();
        if let Some(run) = active.take() {
            log::info!("Cancelling workspace indexing run {}", run.id);
            run.token.cancel();
        }
    }

    /// Whether a full-workspace run is currently active
    pub fn is_indexing(&self) -> bool {
        self.active_run.lock().unwrap().is_some()
    }

    /// Incremental path for file-change notifications.
    ///
    /// Filters `uris` down to files that belong to a configured folder
    /// under the current matching rules, then reads and submits each one.
    /// No diffing against the known set and no cancellation handle; this
    /// is for small bursts from the file watcher. Returns the number of
    /// files submitted.
    pub async fn index_files(&self, uris: &[Url]) -> usize {
        let (folders, config) = {
            let state = self.state.read().await;
            (state.folders(), state.config.clone())
        };
        let files = discovery::filter_known(uris, &folders, &config).await;

        let _walk = self.walk_lock.lock().await;
        let mut indexed = 0;
        for file in &files {
            if file.size > config.max_file_size_bytes {
                log::warn!(
                    "Not indexing {}: {} bytes exceeds the {} byte ceiling",
                    file.uri,
                    file.size,
                    config.max_file_size_bytes
                );
                continue;
            }
            match self.submit(file).await {
                Ok(_) => indexed += 1,
                Err(err) => log::warn!("Failed to index {}: {}", file.uri, err),
            }
            tokio::task::yield_now().await;
        }
        log::trace!("Incrementally indexed {}/{} changed files", indexed, uris.len());
        indexed
    }

    /// Drop deleted files from the engine's index. Returns the number of
    /// files the engine forgot.
    pub async fn forget_files(&self, uris: &[Url]) -> usize {
        let _walk = self.walk_lock.lock().await;
        let mut forgotten = 0;
        for uri in uris {
            match self.engine.forget(uri).await {
                Ok(()) => forgotten += 1,
                Err(err) => log::warn!("Failed to forget {}: {}", uri, err),
            }
            tokio::task::yield_now().await;
        }
        forgotten
    }

    /// Read one file and hand it to the engine for symbol discovery
    async fn submit(&self, file: &FileInfo) -> anyhow::Result<usize> {
        let Some(text) = file_system::read_file(&file.uri).await? else {
            // discovery only yields local files, so this is unreachable in
            // practice; treat it as a skipped file rather than a crash
            anyhow::bail!("unsupported uri scheme: {}", file.uri);
        };
        self.engine.discover_symbols(&file.uri, &text).await
    }

    /// Clear the active-run slot, but only if this run still owns it: a
    /// superseded run must not clear its successor's slot.
    fn release_run(&self, run_id: u64) {
        let mut active = self.active_run.lock().unwrap();
        if active.as_ref().map(|run| run.id) == Some(run_id) {
            *active = None;
        }
    }
}
