use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::modules::transcode::error::ProviderError;
use crate::modules::transcode::ladder::{GOP_FRAMES, LADDER, SEGMENT_SECONDS};
use crate::modules::transcode::provider::{ProviderKind, TranscodeInput, TranscodeProvider};
use crate::ports::encode_job::{
    EncodeJobClient, EncodeJobSpec, RemoteJobStatus, RenditionSpec,
};

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const POLL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Output base name the remote service uses for the generated playlists
/// (`main.m3u8` plus one `main_<rung>.m3u8` per rendition).
const OUTPUT_BASE_NAME: &str = "main";

/// Hands the encode to a remote job queue and polls until it reaches a
/// terminal state. The remote service reads and writes object storage
/// directly, so this provider never touches local files and does not honor
/// handed-over local sources.
pub struct ManagedEncoder {
    client: Option<Arc<dyn EncodeJobClient>>,
    role_arn: Option<String>,
    bucket: String,
}

impl ManagedEncoder {
    pub fn new(
        client: Option<Arc<dyn EncodeJobClient>>,
        role_arn: Option<String>,
        bucket: impl Into<String>,
    ) -> Self {
        if role_arn.is_none() {
            warn!("managed encoder has no execution role configured; transcode calls will fail");
        }
        if client.is_none() {
            warn!("managed encoder has no job client wired; transcode calls will fail");
        }
        Self {
            client,
            role_arn,
            bucket: bucket.into(),
        }
    }

    fn build_job_spec(&self, input: &TranscodeInput, role_arn: &str) -> EncodeJobSpec {
        EncodeJobSpec {
            role_arn: role_arn.to_string(),
            input_url: format!("s3://{}/{}", self.bucket, input.source_key),
            destination_url: format!("s3://{}/{}/", self.bucket, input.output_prefix),
            base_name: OUTPUT_BASE_NAME.to_string(),
            segment_seconds: SEGMENT_SECONDS,
            renditions: LADDER
                .iter()
                .map(|rung| RenditionSpec {
                    name_modifier: format!("_{}", rung.name),
                    width: rung.width,
                    height: rung.height,
                    video_bitrate: rung.video_bitrate_kbps * 1000,
                    audio_bitrate: rung.audio_bitrate_kbps * 1000,
                    gop_frames: GOP_FRAMES,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl TranscodeProvider for ManagedEncoder {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Managed
    }

    fn supports_local_input(&self) -> bool {
        false
    }

    async fn transcode(
        &self,
        input: TranscodeInput,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let role_arn = self
            .role_arn
            .as_deref()
            .ok_or_else(|| ProviderError::config("managed encoder role is not configured"))?;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ProviderError::config("managed encoder client is not configured"))?;
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled());
        }

        let spec = self.build_job_spec(&input, role_arn);
        let job_id = client.submit_job(&spec).await?;
        info!(job_id = %job_id, title = %input.title, "submitted managed encode job");

        let deadline = tokio::time::Instant::now() + POLL_TIMEOUT;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::cancelled()),
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }

            match client.job_status(&job_id).await? {
                RemoteJobStatus::Complete => {
                    info!(job_id = %job_id, "managed encode job completed");
                    return Ok(());
                }
                RemoteJobStatus::Error(message) => {
                    return Err(ProviderError::transient(format!(
                        "encode job {job_id} failed: {message}"
                    )));
                }
                RemoteJobStatus::Canceled => {
                    return Err(ProviderError::transient(format!(
                        "encode job {job_id} was canceled"
                    )));
                }
                RemoteJobStatus::Queued | RemoteJobStatus::Progressing => {}
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ProviderError::transient(format!(
                    "encode job {job_id} did not finish within {}s",
                    POLL_TIMEOUT.as_secs()
                )));
            }
        }
    }
}
