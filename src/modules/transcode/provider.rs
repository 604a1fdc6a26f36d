use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::modules::transcode::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Managed,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::Managed => "managed",
        }
    }

    /// The master playlist filename each provider writes. The local encoder
    /// names it `master.m3u8`; the managed encoder emits `main.m3u8` from its
    /// fixed output base name. Playback URLs are built from this, so the
    /// split is a configuration fact, not an accident.
    pub fn master_playlist_name(&self) -> &'static str {
        match self {
            ProviderKind::Local => "master.m3u8",
            ProviderKind::Managed => "main.m3u8",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ProviderKind::Local),
            "managed" => Ok(ProviderKind::Managed),
            other => Err(format!(
                "unknown transcode provider '{other}' (expected 'local' or 'managed')"
            )),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct TranscodeInput {
    pub source_key: String,
    pub output_prefix: String,
    /// Only used for logging.
    pub title: String,
    /// Already-local copy of the source, handed over by the upload pipeline.
    /// The provider that accepts it owns the file and removes it after use.
    pub local_source: Option<PathBuf>,
}

/// One encode backend. Implementations convert every internal failure into a
/// `ProviderError` and tolerate re-invocation against the same output prefix
/// (retries overwrite, last write wins).
#[async_trait]
pub trait TranscodeProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether `TranscodeInput::local_source` is honored. Callers branch on
    /// this instead of relying on a silent no-op.
    fn supports_local_input(&self) -> bool;

    async fn transcode(
        &self,
        input: TranscodeInput,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;
}
