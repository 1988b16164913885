//! Output sink: durable per-task artifacts.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Write failure, carrying the path that could not be written
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct SinkError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl SinkError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Create the artifact root once per run if absent
    async fn prepare(&self) -> Result<(), SinkError>;

    /// Replace the content at `path` with `text`
    async fn write(&self, path: &Path, text: &str) -> Result<(), SinkError>;
}

/// Sink writing plain files under a root directory
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl OutputSink for FileSink {
    async fn prepare(&self) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SinkError::new(&self.root, e))
    }

    async fn write(&self, path: &Path, text: &str) -> Result<(), SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SinkError::new(parent, e))?;
        }
        tokio::fs::write(path, text)
            .await
            .map_err(|e| SinkError::new(path, e))?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "Artifact written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_prepare_creates_nested_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("reports").join("widget");
        let sink = FileSink::new(&root);

        sink.prepare().await.unwrap();
        assert!(root.is_dir());
        // idempotent
        sink.prepare().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        let path = dir.path().join("stages").join("1-price-data.md");

        sink.write(&path, "A1").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A1");
    }

    #[tokio::test]
    async fn test_second_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        let path = dir.path().join("report.md");

        sink.write(&path, "same text").await.unwrap();
        sink.write(&path, "same text").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "same text");

        sink.write(&path, "short").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short");
    }

    #[tokio::test]
    async fn test_unwritable_path_reports_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let sink = FileSink::new(dir.path());

        let target = blocker.join("report.md");
        let err = sink.write(&target, "text").await.unwrap_err();
        assert_eq!(err.path, blocker);
    }
}
