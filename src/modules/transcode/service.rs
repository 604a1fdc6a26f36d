use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::infrastructure::cdn::CdnUrlBuilder;
use crate::modules::transcode::dto::{
    BulkRetryReceipt, FailedAssetView, StatusView, TranscodeResult, TranscodeStats,
};
use crate::modules::transcode::error::{ProviderError, TranscodeError};
use crate::modules::transcode::model::{AssetKind, HlsStatus};
use crate::modules::transcode::provider::{TranscodeInput, TranscodeProvider};
use crate::modules::transcode::retry::BackoffPolicy;
use crate::ports::repository::AssetStore;

/// Storage prefix all attempts of one asset write under. Stable across
/// retries, so re-runs overwrite instead of leaking new prefixes.
pub fn output_prefix(kind: AssetKind, id: Uuid) -> String {
    format!("hls/{}/{}", kind.as_str(), id)
}

#[derive(Debug, Default)]
pub struct TranscodeOptions {
    pub local_source: Option<PathBuf>,
    /// Absent means run to natural completion.
    pub cancel: Option<CancellationToken>,
}

/// Drives the attempt loop for one asset: status transitions, backoff,
/// playback URL construction and the admin projections. The provider is
/// chosen once at construction and never re-resolved.
#[derive(Clone)]
pub struct TranscodeService {
    store: Arc<dyn AssetStore>,
    provider: Arc<dyn TranscodeProvider>,
    cdn: CdnUrlBuilder,
    backoff: BackoffPolicy,
    in_flight: Arc<Mutex<HashSet<(AssetKind, Uuid)>>>,
}

impl TranscodeService {
    pub fn new(
        store: Arc<dyn AssetStore>,
        provider: Arc<dyn TranscodeProvider>,
        cdn: CdnUrlBuilder,
    ) -> Self {
        Self {
            store,
            provider,
            cdn,
            backoff: BackoffPolicy::default(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn transcode_asset(
        &self,
        kind: AssetKind,
        id: Uuid,
        options: TranscodeOptions,
    ) -> Result<TranscodeResult, TranscodeError> {
        let guard = self.claim(kind, id)?;
        self.run_attempts(guard, kind, id, options, false).await
    }

    /// Resets the asset to `PENDING` and runs the full attempt cycle. Blocks
    /// for the whole cycle, backoff included.
    pub async fn retry_asset(
        &self,
        kind: AssetKind,
        id: Uuid,
    ) -> Result<TranscodeResult, TranscodeError> {
        let guard = self.claim(kind, id)?;
        self.run_attempts(guard, kind, id, TranscodeOptions::default(), true)
            .await
    }

    /// Queues one detached retry per failed asset and returns immediately.
    /// A supervisor task logs each outcome; panics in one retry are isolated
    /// from the rest and from the caller.
    pub async fn retry_all_failed(
        &self,
        kind: AssetKind,
    ) -> Result<BulkRetryReceipt, TranscodeError> {
        let failed = self.store.failed_assets(kind).await?;
        let asset_ids: Vec<Uuid> = failed.iter().map(|asset| asset.id).collect();

        let mut handles = Vec::with_capacity(asset_ids.len());
        for &id in &asset_ids {
            let service = self.clone();
            handles.push((
                id,
                tokio::spawn(async move { service.retry_asset(kind, id).await }),
            ));
        }
        tokio::spawn(supervise_retries(kind, handles));

        info!(kind = %kind, queued = asset_ids.len(), "queued retry for all failed assets");
        Ok(BulkRetryReceipt {
            queued: asset_ids.len(),
            asset_ids,
        })
    }

    pub async fn get_status(&self, kind: AssetKind, id: Uuid) -> Result<StatusView, TranscodeError> {
        let asset = self.store.load(kind, id).await?;
        Ok(StatusView {
            hls_status: asset.status(),
            hls_playback_url: asset.hls_playback_url,
        })
    }

    pub async fn failed_assets(
        &self,
        kind: AssetKind,
    ) -> Result<Vec<FailedAssetView>, TranscodeError> {
        let assets = self.store.failed_assets(kind).await?;
        Ok(assets.into_iter().map(FailedAssetView::from).collect())
    }

    pub async fn stats(&self) -> Result<TranscodeStats, TranscodeError> {
        let library = self.store.status_counts(AssetKind::Library).await?;
        let school = self.store.status_counts(AssetKind::School).await?;
        Ok(TranscodeStats { library, school })
    }

    fn claim(&self, kind: AssetKind, id: Uuid) -> Result<InFlightGuard, TranscodeError> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert((kind, id)) {
            return Err(TranscodeError::AlreadyInFlight { kind, id });
        }
        Ok(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            entry: (kind, id),
        })
    }

    async fn run_attempts(
        &self,
        _guard: InFlightGuard,
        kind: AssetKind,
        id: Uuid,
        options: TranscodeOptions,
        reset_to_pending: bool,
    ) -> Result<TranscodeResult, TranscodeError> {
        if reset_to_pending {
            self.store.set_status(kind, id, HlsStatus::Pending).await?;
        }

        let asset = self.store.load(kind, id).await?;
        let source_key = match asset.source_key.filter(|key| !key.is_empty()) {
            Some(key) => key,
            None => return Err(TranscodeError::MissingSource { kind, id }),
        };

        let prefix = output_prefix(kind, id);
        let cancel = options.cancel.unwrap_or_default();
        let mut local_source = options.local_source;
        if local_source.is_some() && !self.provider.supports_local_input() {
            warn!(kind = %kind, asset = %id, "provider does not take local input; using the stored source");
            local_source = None;
        }

        self.store.set_status(kind, id, HlsStatus::Processing).await?;
        info!(
            kind = %kind,
            asset = %id,
            title = %asset.title,
            provider = %self.provider.kind(),
            "starting transcode"
        );

        let mut last_error: Option<ProviderError> = None;
        for attempt in 1..=self.backoff.max_attempts {
            let input = TranscodeInput {
                source_key: source_key.clone(),
                output_prefix: prefix.clone(),
                title: asset.title.clone(),
                // The first attempt consumes the handed-over file; later
                // attempts go back to storage.
                local_source: local_source.take(),
            };

            match self.provider.transcode(input, &cancel).await {
                Ok(()) => {
                    let master = self.provider.kind().master_playlist_name();
                    let playback_url = self.cdn.playback_url(&prefix, master);
                    self.store
                        .set_completed(kind, id, &playback_url, &prefix)
                        .await?;
                    info!(kind = %kind, asset = %id, attempt, url = %playback_url, "transcode completed");
                    return Ok(TranscodeResult::completed(playback_url, prefix, attempt));
                }
                Err(err) if err.is_config() => {
                    // Structural, cannot heal by retrying: fail fast without
                    // spending the remaining attempts.
                    error!(kind = %kind, asset = %id, error = %err, "transcode aborted by misconfiguration");
                    self.store.set_failed(kind, id).await?;
                    return Err(TranscodeError::Configuration(err.message));
                }
                Err(err) if err.is_cancelled() => {
                    info!(kind = %kind, asset = %id, attempt, "transcode cancelled");
                    self.store.set_status(kind, id, HlsStatus::Pending).await?;
                    return Err(TranscodeError::Cancelled);
                }
                Err(err) => {
                    warn!(kind = %kind, asset = %id, attempt, error = %err, "transcode attempt failed");
                    if attempt < self.backoff.max_attempts {
                        let delay = self.backoff.delay_after(attempt);
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                self.store.set_status(kind, id, HlsStatus::Pending).await?;
                                return Err(TranscodeError::Cancelled);
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    last_error = Some(err);
                }
            }
        }

        self.store.set_failed(kind, id).await?;
        let message = last_error.map(|err| err.to_string()).unwrap_or_default();
        error!(
            kind = %kind,
            asset = %id,
            attempts = self.backoff.max_attempts,
            error = %message,
            "transcode failed, attempts exhausted"
        );
        Ok(TranscodeResult::failed(message, self.backoff.max_attempts))
    }
}

async fn supervise_retries(
    kind: AssetKind,
    handles: Vec<(Uuid, JoinHandle<Result<TranscodeResult, TranscodeError>>)>,
) {
    for (id, handle) in handles {
        match handle.await {
            Ok(Ok(result)) if result.success => {
                info!(kind = %kind, asset = %id, attempts = result.attempts, "bulk retry completed")
            }
            Ok(Ok(result)) => {
                warn!(
                    kind = %kind,
                    asset = %id,
                    attempts = result.attempts,
                    error = result.error.as_deref().unwrap_or(""),
                    "bulk retry exhausted"
                )
            }
            Ok(Err(err)) => warn!(kind = %kind, asset = %id, error = %err, "bulk retry failed"),
            Err(err) if err.is_panic() => {
                error!(kind = %kind, asset = %id, "bulk retry task panicked")
            }
            Err(err) => warn!(kind = %kind, asset = %id, error = %err, "bulk retry task aborted"),
        }
    }
}

struct InFlightGuard {
    set: Arc<Mutex<HashSet<(AssetKind, Uuid)>>>,
    entry: (AssetKind, Uuid),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.entry);
    }
}
