//
// cache.rs
//
// Persistent JSON-array-per-key cache handed to the symbol engine
//

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::Context;
use serde::ser::{SerializeSeq, Serializer};
use serde_json::Value;

/// A directory of `<key>.json` files, each holding one ordered sequence of
/// JSON records.
///
/// Keys are used verbatim as file name stems; callers supply collision-free,
/// filesystem-legal keys (the coordinator's caller derives one per workspace
/// from `WorkspaceState::workspace_cache_key`). The cache imposes no schema
/// on the records.
///
/// Blocking I/O and the streaming serializer run on the blocking pool so
/// cache traffic never stalls protocol handling.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    /// Open a cache rooted at `dir`, creating the directory if missing.
    ///
    /// Returns `None` when the directory cannot be created; callers must
    /// tolerate that by operating uncached, it is never fatal.
    pub async fn create(dir: impl Into<PathBuf>) -> Option<Self> {
        let dir = dir.into();
        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => Some(Self { dir }),
            Err(err) => {
                log::warn!(
                    "Failed to create cache directory {}: {}; operating uncached",
                    dir.display(),
                    err
                );
                None
            }
        }
    }

    fn backing_file(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Write `records` as a single JSON array under `key`.
    ///
    /// The array is streamed to disk record by record rather than
    /// serialized into one in-memory buffer; the call resolves once the
    /// write is flushed. I/O and serialization errors propagate.
    pub async fn put(&self, key: &str, records: Vec<Value>) -> anyhow::Result<()> {
        let path = self.backing_file(key);
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let file =
                File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            let mut serializer = serde_json::Serializer::new(&mut writer);
            let mut seq = serializer.serialize_seq(Some(records.len()))?;
            for record in &records {
                seq.serialize_element(record)?;
            }
            seq.end()?;
            writer
                .flush()
                .with_context(|| format!("flushing {}", path.display()))?;
            Ok(())
        })
        .await?
    }

    /// Read the record sequence stored under `key`.
    ///
    /// A key that was never written reads as an empty sequence; any other
    /// I/O or parse failure propagates.
    pub async fn get(&self, key: &str) -> anyhow::Result<Vec<Value>> {
        let path = self.backing_file(key);
        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Value>> {
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(err) => {
                    return Err(err).with_context(|| format!("opening {}", path.display()))
                }
            };
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing {}", path.display()))
        })
        .await?
    }

    /// Remove the backing file for `key`.
    ///
    /// Errors propagate, a missing file included: deleting a key that was
    /// never written is a caller bug this cache chooses to surface rather
    /// than swallow.
    pub async fn del(&self, key: &str) -> anyhow::Result<()> {
        let path = self.backing_file(key);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("removing {}", path.display()))
    }

    /// Remove the cache directory and everything under it.
    pub async fn dispose(&self) -> anyhow::Result<()> {
        tokio::fs::remove_dir_all(&self.dir)
            .await
            .with_context(|| format!("removing {}", self.dir.display()))
    }
}
