use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// The two owning record kinds that carry transcodable video. Callers always
/// say which kind they mean; nothing probes tables to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Library,
    School,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Library => "library",
            AssetKind::School => "school",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            AssetKind::Library => "library_videos",
            AssetKind::School => "school_videos",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HlsStatus {
    None,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl HlsStatus {
    /// Uppercase form stored in the database. A NULL column reads back as
    /// `None` via `From<String>` in the other direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            HlsStatus::None => "NONE",
            HlsStatus::Pending => "PENDING",
            HlsStatus::Processing => "PROCESSING",
            HlsStatus::Completed => "COMPLETED",
            HlsStatus::Failed => "FAILED",
        }
    }
}

impl From<String> for HlsStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => HlsStatus::Pending,
            "PROCESSING" => HlsStatus::Processing,
            "COMPLETED" => HlsStatus::Completed,
            "FAILED" => HlsStatus::Failed,
            _ => HlsStatus::None,
        }
    }
}

impl fmt::Display for HlsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct VideoAsset {
    pub id: Uuid,
    pub title: String,
    pub source_key: Option<String>,
    pub hls_status: Option<String>, // Stored as string in DB
    pub hls_playback_url: Option<String>,
    pub hls_s3_prefix: Option<String>,
    pub updated_at: OffsetDateTime,
}

impl VideoAsset {
    pub fn status(&self) -> HlsStatus {
        self.hls_status
            .clone()
            .map(HlsStatus::from)
            .unwrap_or(HlsStatus::None)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub none: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: HlsStatus, count: i64) {
        match status {
            HlsStatus::None => self.none += count,
            HlsStatus::Pending => self.pending += count,
            HlsStatus::Processing => self.processing += count,
            HlsStatus::Completed => self.completed += count,
            HlsStatus::Failed => self.failed += count,
        }
    }
}
