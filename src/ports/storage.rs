use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage backend: {0}")]
    Backend(String),
}

/// Object storage as the transcode pipeline consumes it: fetch a source
/// object to a local path, push an output file under a key.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError>;

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
