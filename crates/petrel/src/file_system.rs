//
// file_system.rs
//
// Scheme-gated filesystem access for discovery and indexing
//

use std::time::SystemTime;

use anyhow::anyhow;
use tower_lsp::lsp_types::Url;

/// Snapshot of one discovered file, produced fresh on every discovery call
/// and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub uri: Url,
    /// File modification time (from filesystem metadata)
    pub modified: SystemTime,
    /// File size in bytes
    pub size: u64,
}

impl FileInfo {
    /// Create a snapshot from filesystem metadata
    pub fn from_metadata(uri: Url, metadata: &std::fs::Metadata) -> Self {
        Self {
            uri,
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: metadata.len(),
        }
    }
}

/// The closed set of uri schemes the index understands. Anything that is
/// not a local file resolves to empty/absent results rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriScheme {
    LocalFile,
    Unsupported,
}

impl UriScheme {
    pub fn of(uri: &Url) -> Self {
        match uri.scheme() {
            "file" => UriScheme::LocalFile,
            _ => UriScheme::Unsupported,
        }
    }
}

/// Read a file's content.
///
/// Unsupported schemes resolve to `Ok(None)`; local-file read failures are
/// real errors for the caller to handle.
pub async fn read_file(uri: &Url) -> anyhow::Result<Option<String>> {
    match UriScheme::of(uri) {
        UriScheme::Unsupported => Ok(None),
        UriScheme::LocalFile => {
            let path = uri
                .to_file_path()
                .map_err(|_| anyhow!("invalid file uri: {}", uri))?;
            Ok(Some(tokio::fs::read_to_string(&path).await?))
        }
    }
}

/// Stat a file. Returns `None` for unsupported schemes, invalid paths, or
/// stat failure (a watched file may already be gone by the time we look).
pub async fn file_info(uri: &Url) -> Option<FileInfo> {
    match UriScheme::of(uri) {
        UriScheme::Unsupported => None,
        UriScheme::LocalFile => {
            let path = uri.to_file_path().ok()?;
            let metadata = tokio::fs::metadata(&path).await.ok()?;
            Some(FileInfo {
                uri: uri.clone(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: metadata.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_scheme_dispatch() {
        let local = Url::parse("file:///tmp/a.php").unwrap();
        assert_eq!(UriScheme::of(&local), UriScheme::LocalFile);

        let remote = Url::parse("untitled:Untitled-1").unwrap();
        assert_eq!(UriScheme::of(&remote), UriScheme::Unsupported);

        let http = Url::parse("https://example.com/a.php").unwrap();
        assert_eq!(UriScheme::of(&http), UriScheme::Unsupported);
    }

    #[tokio::test]
    async fn test_read_file_local() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "<?php echo 1;").unwrap();
        let uri = Url::from_file_path(temp.path()).unwrap();

        let content = read_file(&uri).await.unwrap();
        assert_eq!(content.as_deref(), Some("<?php echo 1;"));
    }

    #[tokio::test]
    async fn test_read_file_unsupported_scheme_is_none() {
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        assert!(read_file(&uri).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_file_missing_is_error() {
        let uri = Url::parse("file:///definitely/not/here.php").unwrap();
        assert!(read_file(&uri).await.is_err());
    }

    #[tokio::test]
    async fn test_file_info_local() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "<?php").unwrap();
        let uri = Url::from_file_path(temp.path()).unwrap();

        let info = file_info(&uri).await.unwrap();
        assert_eq!(info.uri, uri);
        assert_eq!(info.size, 5);
    }

    #[tokio::test]
    async fn test_file_info_missing_is_none() {
        let uri = Url::parse("file:///definitely/not/here.php").unwrap();
        assert!(file_info(&uri).await.is_none());
    }

    #[tokio::test]
    async fn test_file_info_unsupported_scheme_is_none() {
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        assert!(file_info(&uri).await.is_none());
    }
}
