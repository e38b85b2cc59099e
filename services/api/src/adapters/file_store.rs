//! services/api/src/adapters/file_store.rs
//!
//! A `SnapshotSink` that keeps one pretty-printed JSON file per snapshot key
//! under a data directory. Used when no database is configured.

use async_trait::async_trait;
use review_core::ports::{PortError, PortResult, SnapshotSink};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// Creates the data directory if needed.
    pub async fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn persist(&self, key: &str, snapshot: serde_json::Value) -> PortResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&snapshot)?;

        // The rename replaces the previous snapshot in one step.
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| PortError::Unexpected(format!("writing {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PortError::Unexpected(format!("replacing {}: {}", path.display(), e)))?;

        debug!("Persisted snapshot {} ({} bytes)", key, body.len());
        Ok(())
    }

    async fn load(&self, key: &str) -> PortResult<Option<serde_json::Value>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Unexpected(format!(
                "reading {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn persisted_snapshot_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("data")).await.unwrap();

        sink.persist("link_registry", json!({"entries": {}})).await.unwrap();
        sink.persist("link_registry", json!({"entries": {"a": 1}})).await.unwrap();

        let loaded = sink.load("link_registry").await.unwrap();
        assert_eq!(loaded, Some(json!({"entries": {"a": 1}})));
        assert!(!dir.path().join("data/link_registry.json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path()).await.unwrap();

        assert_eq!(sink.load("review_sessions").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("users.json"), b"{not json").unwrap();
        let sink = JsonFileSink::new(dir.path()).await.unwrap();

        assert!(matches!(sink.load("users").await, Err(PortError::Unexpected(_))));
    }
}
