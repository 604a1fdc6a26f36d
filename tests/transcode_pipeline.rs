use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::{Duration as TimeDuration, OffsetDateTime};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use edustream::infrastructure::cdn::CdnUrlBuilder;
use edustream::modules::transcode::error::{ProviderError, TranscodeError};
use edustream::modules::transcode::model::{AssetKind, HlsStatus, StatusCounts, VideoAsset};
use edustream::modules::transcode::provider::{ProviderKind, TranscodeInput, TranscodeProvider};
use edustream::modules::transcode::service::{TranscodeOptions, TranscodeService};
use edustream::ports::repository::{AssetStore, StoreError};

#[derive(Default)]
struct InMemoryStore {
    assets: Mutex<HashMap<(AssetKind, Uuid), VideoAsset>>,
    status_writes: Mutex<Vec<(Uuid, HlsStatus)>>,
}

impl InMemoryStore {
    async fn insert(&self, kind: AssetKind, asset: VideoAsset) {
        self.assets.lock().await.insert((kind, asset.id), asset);
    }

    async fn get(&self, kind: AssetKind, id: Uuid) -> VideoAsset {
        self.assets
            .lock()
            .await
            .get(&(kind, id))
            .cloned()
            .expect("asset exists")
    }

    /// Status writes for one asset in the order they were persisted,
    /// terminal writes included.
    async fn writes_for(&self, id: Uuid) -> Vec<HlsStatus> {
        self.status_writes
            .lock()
            .await
            .iter()
            .filter(|(written_id, _)| *written_id == id)
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl AssetStore for InMemoryStore {
    async fn load(&self, kind: AssetKind, id: Uuid) -> Result<VideoAsset, StoreError> {
        self.assets
            .lock()
            .await
            .get(&(kind, id))
            .cloned()
            .ok_or(StoreError::NotFound { kind, id })
    }

    async fn set_status(
        &self,
        kind: AssetKind,
        id: Uuid,
        status: HlsStatus,
    ) -> Result<(), StoreError> {
        let mut assets = self.assets.lock().await;
        let asset = assets
            .get_mut(&(kind, id))
            .ok_or(StoreError::NotFound { kind, id })?;
        asset.hls_status = Some(status.as_str().to_string());
        asset.updated_at = OffsetDateTime::now_utc();
        drop(assets);
        self.status_writes.lock().await.push((id, status));
        Ok(())
    }

    async fn set_completed(
        &self,
        kind: AssetKind,
        id: Uuid,
        playback_url: &str,
        s3_prefix: &str,
    ) -> Result<(), StoreError> {
        let mut assets = self.assets.lock().await;
        let asset = assets
            .get_mut(&(kind, id))
            .ok_or(StoreError::NotFound { kind, id })?;
        asset.hls_status = Some(HlsStatus::Completed.as_str().to_string());
        asset.hls_playback_url = Some(playback_url.to_string());
        asset.hls_s3_prefix = Some(s3_prefix.to_string());
        asset.updated_at = OffsetDateTime::now_utc();
        drop(assets);
        self.status_writes.lock().await.push((id, HlsStatus::Completed));
        Ok(())
    }

    async fn set_failed(&self, kind: AssetKind, id: Uuid) -> Result<(), StoreError> {
        let mut assets = self.assets.lock().await;
        let asset = assets
            .get_mut(&(kind, id))
            .ok_or(StoreError::NotFound { kind, id })?;
        asset.hls_status = Some(HlsStatus::Failed.as_str().to_string());
        asset.updated_at = OffsetDateTime::now_utc();
        drop(assets);
        self.status_writes.lock().await.push((id, HlsStatus::Failed));
        Ok(())
    }

    async fn failed_assets(&self, kind: AssetKind) -> Result<Vec<VideoAsset>, StoreError> {
        let mut failed: Vec<VideoAsset> = self
            .assets
            .lock()
            .await
            .iter()
            .filter(|((asset_kind, _), asset)| {
                *asset_kind == kind && asset.status() == HlsStatus::Failed
            })
            .map(|(_, asset)| asset.clone())
            .collect();
        failed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(failed)
    }

    async fn status_counts(&self, kind: AssetKind) -> Result<StatusCounts, StoreError> {
        let mut counts = StatusCounts::default();
        for ((asset_kind, _), asset) in self.assets.lock().await.iter() {
            if *asset_kind == kind {
                counts.add(asset.status(), 1);
            }
        }
        Ok(counts)
    }
}

enum Outcome {
    Fail(&'static str),
    Config(&'static str),
    Cancel,
    /// Block until `gate` is notified, then succeed.
    Hang,
}

#[derive(Debug, Clone)]
struct RecordedCall {
    source_key: String,
    output_prefix: String,
    local_source: Option<PathBuf>,
}

/// Plays back a list of outcomes, one per `transcode` call; once the script
/// is exhausted every further call succeeds.
struct ScriptedProvider {
    kind: ProviderKind,
    supports_local: bool,
    script: Mutex<Vec<Outcome>>,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Notify,
}

impl ScriptedProvider {
    fn new(kind: ProviderKind, supports_local: bool, script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            supports_local,
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
            gate: Notify::new(),
        })
    }

    fn local(script: Vec<Outcome>) -> Arc<Self> {
        Self::new(ProviderKind::Local, true, script)
    }

    fn managed(script: Vec<Outcome>) -> Arc<Self> {
        Self::new(ProviderKind::Managed, false, script)
    }

    async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl TranscodeProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn supports_local_input(&self) -> bool {
        self.supports_local
    }

    async fn transcode(
        &self,
        input: TranscodeInput,
        _cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        self.calls.lock().await.push(RecordedCall {
            source_key: input.source_key,
            output_prefix: input.output_prefix,
            local_source: input.local_source,
        });

        let outcome = {
            let mut script = self.script.lock().await;
            if script.is_empty() {
                return Ok(());
            }
            script.remove(0)
        };
        match outcome {
            Outcome::Fail(message) => Err(ProviderError::transient(message)),
            Outcome::Config(message) => Err(ProviderError::config(message)),
            Outcome::Cancel => Err(ProviderError::cancelled()),
            Outcome::Hang => {
                self.gate.notified().await;
                Ok(())
            }
        }
    }
}

/// Succeeds for every asset except one, whose encode panics outright.
struct CrashingProvider {
    poisoned: Uuid,
}

#[async_trait]
impl TranscodeProvider for CrashingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn supports_local_input(&self) -> bool {
        true
    }

    async fn transcode(
        &self,
        input: TranscodeInput,
        _cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        if input.output_prefix.ends_with(&self.poisoned.to_string()) {
            panic!("encoder crashed");
        }
        Ok(())
    }
}

fn asset(id: Uuid, source_key: Option<&str>) -> VideoAsset {
    VideoAsset {
        id,
        title: "Algebra lecture 4".to_string(),
        source_key: source_key.map(str::to_string),
        hls_status: None,
        hls_playback_url: None,
        hls_s3_prefix: None,
        updated_at: OffsetDateTime::now_utc(),
    }
}

fn failed_asset(id: Uuid, minutes_ago: i64) -> VideoAsset {
    VideoAsset {
        id,
        title: format!("Recorded session {minutes_ago}"),
        source_key: Some(format!("uploads/school/{id}/session.mp4")),
        hls_status: Some(HlsStatus::Failed.as_str().to_string()),
        hls_playback_url: None,
        hls_s3_prefix: None,
        updated_at: OffsetDateTime::now_utc() - TimeDuration::minutes(minutes_ago),
    }
}

fn make_service(store: &Arc<InMemoryStore>, provider: &Arc<ScriptedProvider>) -> TranscodeService {
    let cdn = CdnUrlBuilder::new(Some("cdn.example.com"), "http://localhost:9000/videos")
        .expect("valid cdn base");
    TranscodeService::new(store.clone(), provider.clone(), cdn)
}

#[tokio::test]
async fn completes_on_first_attempt_and_persists_playback_url() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::Library, asset(id, Some("uploads/library/lecture.mp4")))
        .await;
    let provider = ScriptedProvider::local(vec![]);
    let service = make_service(&store, &provider);

    let result = service
        .transcode_asset(AssetKind::Library, id, TranscodeOptions::default())
        .await
        .unwrap();

    let expected_url = format!("https://cdn.example.com/hls/library/{id}/master.m3u8");
    let expected_prefix = format!("hls/library/{id}");
    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.hls_playback_url.as_deref(), Some(expected_url.as_str()));
    assert_eq!(result.hls_s3_prefix.as_deref(), Some(expected_prefix.as_str()));

    let stored = store.get(AssetKind::Library, id).await;
    assert_eq!(stored.status(), HlsStatus::Completed);
    assert_eq!(stored.hls_playback_url.as_deref(), Some(expected_url.as_str()));
    assert_eq!(stored.hls_s3_prefix.as_deref(), Some(expected_prefix.as_str()));
    assert_eq!(
        store.writes_for(id).await,
        vec![HlsStatus::Processing, HlsStatus::Completed]
    );

    let calls = provider.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].source_key, "uploads/library/lecture.mp4");

    let status = service.get_status(AssetKind::Library, id).await.unwrap();
    assert_eq!(status.hls_status, HlsStatus::Completed);
    assert_eq!(status.hls_playback_url.as_deref(), Some(expected_url.as_str()));
}

#[tokio::test(start_paused = true)]
async fn backs_off_thirty_then_sixty_seconds_before_succeeding() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::Library, asset(id, Some("uploads/library/lecture.mp4")))
        .await;
    let provider = ScriptedProvider::local(vec![
        Outcome::Fail("encoder exited 1"),
        Outcome::Fail("encoder exited 1"),
    ]);
    let service = make_service(&store, &provider);

    let started = tokio::time::Instant::now();
    let result = service
        .transcode_asset(AssetKind::Library, id, TranscodeOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(started.elapsed(), Duration::from_secs(90));
    assert_eq!(store.get(AssetKind::Library, id).await.status(), HlsStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn exhausts_attempts_and_surfaces_last_error_verbatim() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::Library, asset(id, Some("uploads/library/lecture.mp4")))
        .await;
    let provider = ScriptedProvider::local(vec![
        Outcome::Fail("encoder exited 137: out of memory"),
        Outcome::Fail("encoder exited 137: out of memory"),
        Outcome::Fail("encoder exited 137: out of memory"),
    ]);
    let service = make_service(&store, &provider);

    let started = tokio::time::Instant::now();
    let result = service
        .transcode_asset(AssetKind::Library, id, TranscodeOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.error.as_deref(), Some("encoder exited 137: out of memory"));
    assert_eq!(result.hls_playback_url, None);
    // Backoff runs between attempts, not after the last one.
    assert_eq!(started.elapsed(), Duration::from_secs(90));
    assert_eq!(provider.calls().await.len(), 3);

    let stored = store.get(AssetKind::Library, id).await;
    assert_eq!(stored.status(), HlsStatus::Failed);
    assert_eq!(stored.hls_playback_url, None);
    assert_eq!(stored.hls_s3_prefix, None);
    assert_eq!(
        store.writes_for(id).await,
        vec![HlsStatus::Processing, HlsStatus::Failed]
    );
}

#[tokio::test(start_paused = true)]
async fn late_failure_keeps_stale_playback_fields() {
    let id = Uuid::new_v4();
    let url = format!("https://cdn.example.com/hls/library/{id}/master.m3u8");
    let prefix = format!("hls/library/{id}");

    let mut seeded = asset(id, Some("uploads/library/lecture.mp4"));
    seeded.hls_status = Some(HlsStatus::Completed.as_str().to_string());
    seeded.hls_playback_url = Some(url.clone());
    seeded.hls_s3_prefix = Some(prefix.clone());

    let store = Arc::new(InMemoryStore::default());
    store.insert(AssetKind::Library, seeded).await;
    let provider = ScriptedProvider::local(vec![
        Outcome::Fail("encoder exited 1"),
        Outcome::Fail("encoder exited 1"),
        Outcome::Fail("encoder exited 1"),
    ]);
    let service = make_service(&store, &provider);

    let result = service.retry_asset(AssetKind::Library, id).await.unwrap();
    assert!(!result.success);

    // The last successful run's pointers survive a later failed retry.
    let stored = store.get(AssetKind::Library, id).await;
    assert_eq!(stored.status(), HlsStatus::Failed);
    assert_eq!(stored.hls_playback_url.as_deref(), Some(url.as_str()));
    assert_eq!(stored.hls_s3_prefix.as_deref(), Some(prefix.as_str()));
}

#[tokio::test]
async fn asset_without_source_is_rejected_before_any_attempt() {
    let missing = Uuid::new_v4();
    let empty = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store.insert(AssetKind::School, asset(missing, None)).await;
    store.insert(AssetKind::School, asset(empty, Some(""))).await;
    let provider = ScriptedProvider::local(vec![]);
    let service = make_service(&store, &provider);

    for id in [missing, empty] {
        let err = service
            .transcode_asset(AssetKind::School, id, TranscodeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::MissingSource { .. }));
        assert!(store.writes_for(id).await.is_empty());
        assert_eq!(store.get(AssetKind::School, id).await.status(), HlsStatus::None);
    }
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn unknown_asset_is_not_found() {
    let store = Arc::new(InMemoryStore::default());
    let provider = ScriptedProvider::local(vec![]);
    let service = make_service(&store, &provider);

    let id = Uuid::new_v4();
    let err = service
        .transcode_asset(AssetKind::Library, id, TranscodeOptions::default())
        .await
        .unwrap_err();
    match err {
        TranscodeError::AssetNotFound { kind, id: reported } => {
            assert_eq!(kind, AssetKind::Library);
            assert_eq!(reported, id);
        }
        other => panic!("expected AssetNotFound, got {other:?}"),
    }
    assert!(provider.calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn every_attempt_writes_under_the_same_prefix() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::School, asset(id, Some("uploads/school/session.mp4")))
        .await;
    let provider = ScriptedProvider::local(vec![
        Outcome::Fail("encoder exited 1"),
        Outcome::Fail("encoder exited 1"),
    ]);
    let service = make_service(&store, &provider);

    let result = service
        .transcode_asset(AssetKind::School, id, TranscodeOptions::default())
        .await
        .unwrap();

    let expected_prefix = format!("hls/school/{id}");
    assert_eq!(result.hls_s3_prefix.as_deref(), Some(expected_prefix.as_str()));
    let calls = provider.calls().await;
    assert_eq!(calls.len(), 3);
    for call in &calls {
        assert_eq!(call.output_prefix, expected_prefix);
    }
}

#[tokio::test]
async fn managed_provider_reads_storage_and_links_main_playlist() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::Library, asset(id, Some("uploads/library/lecture.mp4")))
        .await;
    let provider = ScriptedProvider::managed(vec![]);
    let service = make_service(&store, &provider);

    let options = TranscodeOptions {
        local_source: Some(PathBuf::from("/tmp/upload-7.mp4")),
        ..TranscodeOptions::default()
    };
    let result = service
        .transcode_asset(AssetKind::Library, id, options)
        .await
        .unwrap();

    assert!(result.success);
    let url = result.hls_playback_url.unwrap();
    assert!(url.ends_with("/main.m3u8"), "got {url}");

    // A provider that reads storage directly never sees the local file.
    let calls = provider.calls().await;
    assert_eq!(calls[0].local_source, None);
}

#[tokio::test]
async fn retry_walks_pending_processing_completed() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store.insert(AssetKind::School, failed_asset(id, 30)).await;
    let provider = ScriptedProvider::local(vec![]);
    let service = make_service(&store, &provider);

    let result = service.retry_asset(AssetKind::School, id).await.unwrap();

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(
        store.writes_for(id).await,
        vec![HlsStatus::Pending, HlsStatus::Processing, HlsStatus::Completed]
    );
}

#[tokio::test]
async fn concurrent_runs_for_same_asset_are_rejected() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::Library, asset(id, Some("uploads/library/lecture.mp4")))
        .await;
    let provider = ScriptedProvider::local(vec![Outcome::Hang]);
    let service = make_service(&store, &provider);

    let background = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .transcode_asset(AssetKind::Library, id, TranscodeOptions::default())
                .await
        })
    };

    let mut polls = 0;
    while provider.calls().await.is_empty() {
        polls += 1;
        assert!(polls < 1000, "first run never reached the provider");
        tokio::task::yield_now().await;
    }

    let err = service
        .transcode_asset(AssetKind::Library, id, TranscodeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscodeError::AlreadyInFlight { .. }));

    provider.gate.notify_one();
    let result = background.await.unwrap().unwrap();
    assert!(result.success);

    // The slot frees once the first run finishes.
    let result = service
        .transcode_asset(AssetKind::Library, id, TranscodeOptions::default())
        .await
        .unwrap();
    assert!(result.success);
}

#[tokio::test(start_paused = true)]
async fn misconfiguration_aborts_without_backoff() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::Library, asset(id, Some("uploads/library/lecture.mp4")))
        .await;
    let provider = ScriptedProvider::managed(vec![Outcome::Config(
        "managed encoder has no execution role configured",
    )]);
    let service = make_service(&store, &provider);

    let started = tokio::time::Instant::now();
    let err = service
        .transcode_asset(AssetKind::Library, id, TranscodeOptions::default())
        .await
        .unwrap_err();

    assert_eq!(started.elapsed(), Duration::ZERO);
    match err {
        TranscodeError::Configuration(message) => {
            assert!(message.contains("execution role"), "got {message}")
        }
        other => panic!("expected Configuration, got {other:?}"),
    }
    assert_eq!(provider.calls().await.len(), 1);
    assert_eq!(store.get(AssetKind::Library, id).await.status(), HlsStatus::Failed);
    assert_eq!(
        store.writes_for(id).await,
        vec![HlsStatus::Processing, HlsStatus::Failed]
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_leaves_asset_pending() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::Library, asset(id, Some("uploads/library/lecture.mp4")))
        .await;
    let provider = ScriptedProvider::local(vec![Outcome::Fail("encoder exited 1")]);
    let service = make_service(&store, &provider);

    let cancel = CancellationToken::new();
    let options = TranscodeOptions {
        local_source: None,
        cancel: Some(cancel.clone()),
    };
    let background = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .transcode_asset(AssetKind::Library, id, options)
                .await
        })
    };

    let mut polls = 0;
    while provider.calls().await.is_empty() {
        polls += 1;
        assert!(polls < 1000, "first attempt never ran");
        tokio::task::yield_now().await;
    }
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    cancel.cancel();
    let err = background.await.unwrap().unwrap_err();

    assert!(matches!(err, TranscodeError::Cancelled));
    assert_eq!(provider.calls().await.len(), 1);
    assert_eq!(store.get(AssetKind::Library, id).await.status(), HlsStatus::Pending);
    assert_eq!(
        store.writes_for(id).await,
        vec![HlsStatus::Processing, HlsStatus::Pending]
    );
}

#[tokio::test]
async fn provider_reported_cancel_leaves_asset_pending() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::School, asset(id, Some("uploads/school/session.mp4")))
        .await;
    let provider = ScriptedProvider::local(vec![Outcome::Cancel]);
    let service = make_service(&store, &provider);

    let err = service
        .transcode_asset(AssetKind::School, id, TranscodeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, TranscodeError::Cancelled));
    assert_eq!(store.get(AssetKind::School, id).await.status(), HlsStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn bulk_retry_acknowledges_immediately_then_heals_in_background() {
    let store = Arc::new(InMemoryStore::default());
    let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    store.insert(AssetKind::School, failed_asset(ids[0], 180)).await;
    store.insert(AssetKind::School, failed_asset(ids[1], 60)).await;
    store.insert(AssetKind::School, failed_asset(ids[2], 10)).await;

    let untouched = Uuid::new_v4();
    let mut done = asset(untouched, Some("uploads/school/done.mp4"));
    done.hls_status = Some(HlsStatus::Completed.as_str().to_string());
    store.insert(AssetKind::School, done).await;

    // Every first attempt fails, every second one succeeds.
    let provider = ScriptedProvider::local(vec![
        Outcome::Fail("encoder exited 1"),
        Outcome::Fail("encoder exited 1"),
        Outcome::Fail("encoder exited 1"),
    ]);
    let service = make_service(&store, &provider);

    let started = tokio::time::Instant::now();
    let receipt = service.retry_all_failed(AssetKind::School).await.unwrap();

    // The receipt arrives before any retry cycle finishes.
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(receipt.queued, 3);
    assert_eq!(receipt.asset_ids, vec![ids[2], ids[1], ids[0]]);

    // Let the 30s backoff elapse so the second attempts run.
    tokio::time::sleep(Duration::from_secs(31)).await;

    for id in ids {
        assert_eq!(store.get(AssetKind::School, id).await.status(), HlsStatus::Completed);
        assert_eq!(
            store.writes_for(id).await,
            vec![HlsStatus::Pending, HlsStatus::Processing, HlsStatus::Completed]
        );
    }
    assert_eq!(store.get(AssetKind::School, untouched).await.status(), HlsStatus::Completed);
    assert!(store.writes_for(untouched).await.is_empty());
    assert_eq!(provider.calls().await.len(), 6);
}

#[tokio::test]
async fn bulk_retry_survives_a_panicking_task_and_frees_its_slot() {
    let store = Arc::new(InMemoryStore::default());
    let poisoned = Uuid::new_v4();
    let healthy = Uuid::new_v4();
    store.insert(AssetKind::School, failed_asset(poisoned, 60)).await;
    store.insert(AssetKind::School, failed_asset(healthy, 10)).await;

    let provider = Arc::new(CrashingProvider { poisoned });
    let cdn = CdnUrlBuilder::new(Some("cdn.example.com"), "http://localhost:9000/videos")
        .expect("valid cdn base");
    let service = TranscodeService::new(store.clone(), provider, cdn);

    let receipt = service.retry_all_failed(AssetKind::School).await.unwrap();
    assert_eq!(receipt.queued, 2);
    assert_eq!(receipt.asset_ids, vec![healthy, poisoned]);

    // The sibling heals even though the other retry task dies.
    let mut polls = 0;
    while store.get(AssetKind::School, healthy).await.status() != HlsStatus::Completed {
        polls += 1;
        assert!(polls < 1000, "healthy retry never completed");
        tokio::task::yield_now().await;
    }

    // Once the panicked task unwinds, its in-flight slot must be free again:
    // a fresh claim reaches the provider (and dies the same way) instead of
    // bouncing off the previous run.
    let mut claims = 0;
    loop {
        claims += 1;
        assert!(claims < 1000, "in-flight slot never freed after the panic");
        let attempt = {
            let service = service.clone();
            tokio::spawn(async move { service.retry_asset(AssetKind::School, poisoned).await })
        };
        match attempt.await {
            Ok(Err(TranscodeError::AlreadyInFlight { .. })) => tokio::task::yield_now().await,
            Err(join_err) => {
                assert!(join_err.is_panic());
                break;
            }
            other => panic!("expected a panic or an in-flight conflict, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn failed_listing_is_newest_first_and_stats_count_both_kinds() {
    let store = Arc::new(InMemoryStore::default());
    let older = Uuid::new_v4();
    let newer = Uuid::new_v4();
    store.insert(AssetKind::School, failed_asset(older, 120)).await;
    store.insert(AssetKind::School, failed_asset(newer, 5)).await;

    let completed = Uuid::new_v4();
    let mut done = asset(completed, Some("uploads/library/done.mp4"));
    done.hls_status = Some(HlsStatus::Completed.as_str().to_string());
    store.insert(AssetKind::Library, done).await;
    store
        .insert(AssetKind::Library, asset(Uuid::new_v4(), Some("uploads/library/raw.mp4")))
        .await;

    let provider = ScriptedProvider::local(vec![]);
    let service = make_service(&store, &provider);

    let failed = service.failed_assets(AssetKind::School).await.unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].id, newer);
    assert_eq!(failed[1].id, older);

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.school.failed, 2);
    assert_eq!(stats.school.completed, 0);
    assert_eq!(stats.library.completed, 1);
    assert_eq!(stats.library.none, 1);
}

#[tokio::test(start_paused = true)]
async fn handed_over_local_file_is_used_once() {
    let id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::default());
    store
        .insert(AssetKind::Library, asset(id, Some("uploads/library/lecture.mp4")))
        .await;
    let provider = ScriptedProvider::local(vec![Outcome::Fail("encoder exited 1")]);
    let service = make_service(&store, &provider);

    let options = TranscodeOptions {
        local_source: Some(PathBuf::from("/tmp/upload-42.mp4")),
        ..TranscodeOptions::default()
    };
    let result = service
        .transcode_asset(AssetKind::Library, id, options)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.attempts, 2);
    let calls = provider.calls().await;
    assert_eq!(calls[0].local_source, Some(PathBuf::from("/tmp/upload-42.mp4")));
    assert_eq!(calls[1].local_source, None);
}
