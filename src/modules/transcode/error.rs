use thiserror::Error;
use uuid::Uuid;

use crate::modules::transcode::model::AssetKind;
use crate::ports::encode_job::EncodeJobError;
use crate::ports::repository::StoreError;
use crate::ports::storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Worth retrying: network hiccup, nonzero encoder exit, remote job error
    /// or timeout.
    Transient,
    /// Structural misconfiguration. Retrying cannot heal it.
    Configuration,
    Cancelled,
}

/// The only failure shape a provider lets escape. Displays as the bare
/// message so the final surfaced error reads exactly as captured.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Configuration,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: ProviderErrorKind::Cancelled,
            message: "transcode cancelled".to_string(),
        }
    }

    pub fn is_config(&self) -> bool {
        self.kind == ProviderErrorKind::Configuration
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ProviderErrorKind::Cancelled
    }
}

impl From<StorageError> for ProviderError {
    fn from(err: StorageError) -> Self {
        ProviderError::transient(err.to_string())
    }
}

impl From<EncodeJobError> for ProviderError {
    fn from(err: EncodeJobError) -> Self {
        ProviderError::transient(err.to_string())
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::transient(format!("io: {err}"))
    }
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("{kind} asset {id} not found")]
    AssetNotFound { kind: AssetKind, id: Uuid },
    #[error("{kind} asset {id} has no source video to transcode")]
    MissingSource { kind: AssetKind, id: Uuid },
    #[error("{kind} asset {id} already has a transcode in flight")]
    AlreadyInFlight { kind: AssetKind, id: Uuid },
    #[error("transcoder misconfigured: {0}")]
    Configuration(String),
    #[error("transcode cancelled")]
    Cancelled,
    #[error("asset store: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TranscodeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => TranscodeError::AssetNotFound { kind, id },
            other => TranscodeError::Store(other),
        }
    }
}
