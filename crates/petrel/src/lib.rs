// lib.rs — Crate root for the petrel workspace indexing core.
//
// Petrel keeps an external PHP symbol engine's view of a workspace in sync
// with the filesystem: composer-aware file discovery, an incremental index
// coordinator with cooperative cancellation, and a small JSON cache the
// engine uses to persist state across sessions.
//
// The LSP request/response surface and the symbol engine itself live in the
// embedding server. This crate only reaches them through the
// `engine::SymbolEngine` trait and `tower_lsp::lsp_types` types.

pub mod cache;
pub mod composer;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod engine;
pub mod file_system;
pub mod state;

// test_utils is available in test builds and when the `test-support` feature
// is enabled, so integration tests and downstream benchmarks can import the
// fixture generator directly instead of #[path] hacks.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
