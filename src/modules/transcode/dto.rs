use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{HlsStatus, StatusCounts, VideoAsset};

/// Outcome of one full attempt cycle (success, or all attempts spent).
/// Precondition and configuration problems surface as `TranscodeError`
/// instead, before any attempt runs.
#[derive(Debug, Clone, Serialize)]
pub struct TranscodeResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_playback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_s3_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

impl TranscodeResult {
    pub fn completed(playback_url: String, s3_prefix: String, attempts: u32) -> Self {
        Self {
            success: true,
            hls_playback_url: Some(playback_url),
            hls_s3_prefix: Some(s3_prefix),
            error: None,
            attempts,
        }
    }

    pub fn failed(error: String, attempts: u32) -> Self {
        Self {
            success: false,
            hls_playback_url: None,
            hls_s3_prefix: None,
            error: Some(error),
            attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub hls_status: HlsStatus,
    pub hls_playback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedAssetView {
    pub id: Uuid,
    pub title: String,
    pub failed_at: OffsetDateTime,
}

impl From<VideoAsset> for FailedAssetView {
    fn from(asset: VideoAsset) -> Self {
        Self {
            id: asset.id,
            title: asset.title,
            failed_at: asset.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkRetryReceipt {
    pub queued: usize,
    pub asset_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscodeStats {
    pub library: StatusCounts,
    pub school: StatusCounts,
}
