use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::modules::transcode::error::TranscodeError;
use crate::modules::transcode::events::{TRANSCODE_QUEUE, TranscodeRequest};
use crate::modules::transcode::service::TranscodeOptions;
use crate::state::AppState;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Consumes transcode requests until the process exits. Requests are
/// handled one at a time; a single encode already saturates the host.
pub async fn start_transcoder_worker(state: AppState) {
    info!("🎥 Starting transcode worker...");

    loop {
        match consume(&state).await {
            Ok(()) => warn!("RabbitMQ consumer stream ended"),
            Err(e) => error!("❌ Transcode worker errored: {e}"),
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
        if let Err(e) = state.queue.reconnect().await {
            error!("❌ RabbitMQ reconnect failed: {e}");
        }
    }
}

async fn consume(state: &AppState) -> anyhow::Result<()> {
    let channel = state.queue.get_channel().await;
    let channel_guard = channel.lock().await;

    channel_guard
        .queue_declare(
            TRANSCODE_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel_guard
        .basic_consume(
            TRANSCODE_QUEUE,
            "transcode_worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;
    drop(channel_guard);

    info!("🎥 Transcode worker listening on '{}'", TRANSCODE_QUEUE);

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!("Consumer error: {e}");
                continue;
            }
        };

        info!("📦 Received transcode request");
        match serde_json::from_slice::<TranscodeRequest>(&delivery.data) {
            Ok(request) => handle_request(state, request).await,
            Err(e) => error!("❌ Failed to parse transcode request: {e}"),
        }

        // Ack regardless of outcome: failed assets are marked FAILED in the
        // database and recovered through the admin retry routes, not by
        // broker redelivery.
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!("Failed to ack message: {e}");
        }
    }

    Ok(())
}

async fn handle_request(state: &AppState, request: TranscodeRequest) {
    let TranscodeRequest {
        asset_id,
        kind,
        local_path,
    } = request;

    let options = TranscodeOptions {
        local_source: local_path,
        ..TranscodeOptions::default()
    };

    match state.transcode.transcode_asset(kind, asset_id, options).await {
        Ok(result) if result.success => info!(
            "✅ Transcode completed for {kind} asset {asset_id} (attempt {})",
            result.attempts
        ),
        Ok(result) => error!(
            "❌ Transcode failed for {kind} asset {asset_id} after {} attempts: {}",
            result.attempts,
            result.error.as_deref().unwrap_or("unknown error")
        ),
        Err(TranscodeError::AlreadyInFlight { .. }) => {
            warn!("Skipping {kind} asset {asset_id}: transcode already in flight")
        }
        Err(e) => error!("❌ Transcode aborted for {kind} asset {asset_id}: {e}"),
    }
}
