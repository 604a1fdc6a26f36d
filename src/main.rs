use std::sync::Arc;

use dotenvy::dotenv;
use tracing::info;

use edustream::app;
use edustream::config::settings::AppConfig;
use edustream::infrastructure::cdn::CdnUrlBuilder;
use edustream::infrastructure::db::pool::connect_to_db;
use edustream::infrastructure::queue::rabbitmq::RabbitMqService;
use edustream::infrastructure::storage::s3::StorageService;
use edustream::modules::transcode::provider::{ProviderKind, TranscodeProvider};
use edustream::modules::transcode::providers::local::LocalEncoder;
use edustream::modules::transcode::providers::managed::ManagedEncoder;
use edustream::modules::transcode::repository::PgAssetStore;
use edustream::modules::transcode::service::TranscodeService;
use edustream::ports::storage::ObjectStorage;
use edustream::state::AppState;
use edustream::workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = AppConfig::new()?;
    info!(
        "Starting edustream with '{}' transcode provider...",
        config.provider.as_str()
    );

    let db = connect_to_db(&config.database_url).await?;

    let storage: Arc<dyn ObjectStorage> = Arc::new(StorageService::new(
        config.storage_endpoint.as_deref(),
        &config.storage_region,
        &config.storage_bucket,
        &config.storage_access_key,
        &config.storage_secret_key,
    ));

    let provider: Arc<dyn TranscodeProvider> = match config.provider {
        ProviderKind::Local => Arc::new(LocalEncoder::new(storage, &config.ffmpeg_path)),
        // No job client is wired yet, so a managed deployment fails fast on
        // the first transcode instead of at startup.
        ProviderKind::Managed => Arc::new(ManagedEncoder::new(
            None,
            config.transcoder_role_arn.clone(),
            config.storage_bucket.clone(),
        )),
    };

    let store = Arc::new(PgAssetStore::new(db));
    let cdn = CdnUrlBuilder::new(config.cdn_domain.as_deref(), &config.storage_base_url())?;
    let transcode = TranscodeService::new(store, provider, cdn);

    let queue = RabbitMqService::new(&config.amqp_url).await?;
    let addr = format!("0.0.0.0:{}", config.server_port);

    let state = AppState::new(config, queue, transcode);
    tokio::spawn(workers::transcoder::start_transcoder_worker(state.clone()));

    let app = app::create_app(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
