use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::modules::transcode::error::ProviderError;
use crate::modules::transcode::ladder::{self, GOP_FRAMES, LADDER, SEGMENT_SECONDS};
use crate::modules::transcode::provider::{ProviderKind, TranscodeInput, TranscodeProvider};
use crate::ports::storage::ObjectStorage;

const STDERR_TAIL_CHARS: usize = 512;

/// Process seam around the encode invocation so tests can script it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EncoderRunner: Send + Sync {
    async fn run_encode(&self, args: Vec<String>) -> std::io::Result<Output>;
}

pub struct FfmpegRunner {
    binary: PathBuf,
}

impl FfmpegRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl EncoderRunner for FfmpegRunner {
    async fn run_encode(&self, args: Vec<String>) -> std::io::Result<Output> {
        Command::new(&self.binary)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }
}

/// Encodes the whole ladder on local compute with one ffmpeg invocation and
/// uploads every produced file under the output prefix.
pub struct LocalEncoder {
    storage: Arc<dyn ObjectStorage>,
    runner: Arc<dyn EncoderRunner>,
}

impl LocalEncoder {
    pub fn new(storage: Arc<dyn ObjectStorage>, ffmpeg_binary: impl Into<PathBuf>) -> Self {
        Self::with_runner(storage, Arc::new(FfmpegRunner::new(ffmpeg_binary)))
    }

    pub fn with_runner(storage: Arc<dyn ObjectStorage>, runner: Arc<dyn EncoderRunner>) -> Self {
        Self { storage, runner }
    }

    async fn stage_source(
        &self,
        source_key: &str,
        local_source: Option<PathBuf>,
        workdir: &Path,
    ) -> Result<PathBuf, ProviderError> {
        let ext = Path::new(source_key)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let dest = workdir.join(format!("source.{ext}"));
        match local_source {
            Some(path) => {
                tokio::fs::copy(&path, &dest).await?;
                // We own the handed-over upload once we have our copy.
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %err, "could not remove handed-over upload");
                }
            }
            None => self.storage.download(source_key, &dest).await?,
        }
        Ok(dest)
    }

    async fn upload_outputs(&self, out_dir: &Path, prefix: &str) -> Result<usize, ProviderError> {
        let mut entries = tokio::fs::read_dir(out_dir).await?;
        let mut uploaded = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = format!("{prefix}/{name}");
            self.storage
                .upload(&entry.path(), &key, &content_type_for(&name))
                .await?;
            uploaded += 1;
        }
        Ok(uploaded)
    }
}

#[async_trait]
impl TranscodeProvider for LocalEncoder {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn supports_local_input(&self) -> bool {
        true
    }

    async fn transcode(
        &self,
        input: TranscodeInput,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled());
        }

        // Dropping the TempDir removes it on every exit path below.
        let workdir = TempDir::new()?;
        let TranscodeInput {
            source_key,
            output_prefix,
            title,
            local_source,
        } = input;

        let source = self
            .stage_source(&source_key, local_source, workdir.path())
            .await?;
        let out_dir = workdir.path().join("hls");
        tokio::fs::create_dir_all(&out_dir).await?;

        info!(title = %title, source = %source_key, "starting local hls encode");
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::cancelled()),
            result = self.runner.run_encode(encode_args(&source, &out_dir)) => {
                result.map_err(|err| ProviderError::transient(format!("failed to run encoder: {err}")))?
            }
        };
        if !output.status.success() {
            return Err(ProviderError::transient(exit_diagnostic(&output)));
        }

        let master = out_dir.join(ProviderKind::Local.master_playlist_name());
        tokio::fs::write(&master, ladder::master_playlist(&LADDER)).await?;

        let uploaded = self.upload_outputs(&out_dir, &output_prefix).await?;
        info!(title = %title, uploaded, prefix = %output_prefix, "local hls encode uploaded");
        Ok(())
    }
}

/// One invocation produces all rungs: the decoded input is split once and
/// each branch is scaled and segmented on its own output.
fn encode_args(source: &Path, out_dir: &Path) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        source.display().to_string(),
    ];

    let mut filter = format!("[0:v]split={}", LADDER.len());
    for (i, _) in LADDER.iter().enumerate() {
        filter.push_str(&format!("[v{i}]"));
    }
    for (i, rung) in LADDER.iter().enumerate() {
        // force_divisible_by keeps aspect-corrected dimensions even; libx264
        // rejects odd widths/heights in yuv420p.
        filter.push_str(&format!(
            ";[v{i}]scale=w={}:h={}:force_original_aspect_ratio=decrease:force_divisible_by=2[v{i}out]",
            rung.width, rung.height
        ));
    }
    args.push("-filter_complex".to_string());
    args.push(filter);

    for (i, rung) in LADDER.iter().enumerate() {
        args.extend([
            "-map".to_string(),
            format!("[v{i}out]"),
            "-map".to_string(),
            "0:a:0?".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-profile:v".to_string(),
            "main".to_string(),
            "-b:v".to_string(),
            format!("{}k", rung.video_bitrate_kbps),
            "-maxrate".to_string(),
            format!("{}k", rung.video_bitrate_kbps),
            "-bufsize".to_string(),
            format!("{}k", rung.video_bitrate_kbps * 2),
            "-g".to_string(),
            GOP_FRAMES.to_string(),
            "-keyint_min".to_string(),
            GOP_FRAMES.to_string(),
            "-sc_threshold".to_string(),
            "0".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", rung.audio_bitrate_kbps),
            "-ac".to_string(),
            "2".to_string(),
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            SEGMENT_SECONDS.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-hls_segment_filename".to_string(),
            out_dir.join(rung.segment_pattern()).display().to_string(),
            out_dir.join(rung.playlist_name()).display().to_string(),
        ]);
    }
    args
}

fn content_type_for(file_name: &str) -> String {
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl".to_string(),
        Some("ts") => "video/mp2t".to_string(),
        _ => mime_guess::from_path(file_name)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

fn exit_diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail = diagnostic_tail(&stderr);
    match (output.status.code(), tail.is_empty()) {
        (Some(code), true) => format!("encoder exited {code}"),
        (Some(code), false) => format!("encoder exited {code}: {tail}"),
        (None, true) => "encoder terminated by signal".to_string(),
        (None, false) => format!("encoder terminated by signal: {tail}"),
    }
}

fn diagnostic_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    match trimmed.char_indices().rev().nth(STDERR_TAIL_CHARS - 1) {
        Some((idx, _)) => &trimmed[idx..],
        None => trimmed,
    }
}
