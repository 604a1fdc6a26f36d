use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};

pub mod dto;
pub mod error;
pub mod events;
pub mod handler;
pub mod ladder;
pub mod model;
pub mod provider;
pub mod providers;
pub mod repository;
pub mod retry;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(handler::get_transcode_stats))
        .route("/{kind}/failed", get(handler::list_failed_assets))
        .route("/{kind}/retry-failed", post(handler::retry_failed_assets))
        .route("/{kind}/{id}/status", get(handler::get_asset_status))
        .route("/{kind}/{id}/retry", post(handler::retry_asset))
}
