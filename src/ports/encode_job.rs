use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeJobError {
    #[error("encode service: {0}")]
    Service(String),
    #[error("encode job {0} not found")]
    NotFound(String),
}

/// One adaptive-bitrate output rendition of a remote encode job. Bitrates are
/// in bits per second; the GOP length is pinned to the segment duration so
/// every rendition cuts segments on the same frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionSpec {
    pub name_modifier: String,
    pub width: u32,
    pub height: u32,
    pub video_bitrate: u32,
    pub audio_bitrate: u32,
    pub gop_frames: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJobSpec {
    pub role_arn: String,
    pub input_url: String,
    pub destination_url: String,
    pub base_name: String,
    pub segment_seconds: u32,
    pub renditions: Vec<RenditionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteJobStatus {
    Queued,
    Progressing,
    Complete,
    Error(String),
    Canceled,
}

/// Remote encode job queue consumed by the managed provider. The remote
/// service reads the input from object storage and writes all outputs to the
/// destination itself; no bytes pass through this process.
#[async_trait]
pub trait EncodeJobClient: Send + Sync {
    async fn submit_job(&self, spec: &EncodeJobSpec) -> Result<String, EncodeJobError>;

    async fn job_status(&self, job_id: &str) -> Result<RemoteJobStatus, EncodeJobError>;
}
