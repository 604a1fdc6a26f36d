use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::modules::transcode::model::{AssetKind, HlsStatus, StatusCounts, VideoAsset};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} asset {id} not found")]
    NotFound { kind: AssetKind, id: Uuid },
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence seen from the orchestrator. One trait covers both owning
/// record kinds; the kind is always passed explicitly.
///
/// `set_completed` is the only writer of the playback url / storage prefix
/// pair, which keeps the both-or-neither invariant in one place. `set_failed`
/// deliberately leaves any previously stored pair untouched.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn load(&self, kind: AssetKind, id: Uuid) -> Result<VideoAsset, StoreError>;

    async fn set_status(
        &self,
        kind: AssetKind,
        id: Uuid,
        status: HlsStatus,
    ) -> Result<(), StoreError>;

    async fn set_completed(
        &self,
        kind: AssetKind,
        id: Uuid,
        playback_url: &str,
        s3_prefix: &str,
    ) -> Result<(), StoreError>;

    async fn set_failed(&self, kind: AssetKind, id: Uuid) -> Result<(), StoreError>;

    /// All assets currently in `FAILED`, newest failure first.
    async fn failed_assets(&self, kind: AssetKind) -> Result<Vec<VideoAsset>, StoreError>;

    async fn status_counts(&self, kind: AssetKind) -> Result<StatusCounts, StoreError>;
}
