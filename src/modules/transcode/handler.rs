use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::transcode::error::TranscodeError;
use crate::modules::transcode::model::AssetKind;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Per-status asset counts across both tables.
pub async fn get_transcode_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.transcode.stats().await {
        Ok(stats) => ApiSuccess(
            ApiResponse::success(stats, "Transcode stats retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), error_status(&e)).into_response(),
    }
}

/// Failed assets for one kind, newest failure first.
pub async fn list_failed_assets(
    State(state): State<AppState>,
    Path(kind): Path<AssetKind>,
) -> impl IntoResponse {
    match state.transcode.failed_assets(kind).await {
        Ok(assets) => ApiSuccess(
            ApiResponse::success(assets, "Failed assets retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), error_status(&e)).into_response(),
    }
}

pub async fn get_asset_status(
    State(state): State<AppState>,
    Path((kind, id)): Path<(AssetKind, Uuid)>,
) -> impl IntoResponse {
    match state.transcode.get_status(kind, id).await {
        Ok(status) => ApiSuccess(
            ApiResponse::success(status, "Transcode status retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), error_status(&e)).into_response(),
    }
}

/// Runs a full retry cycle inline and reports its outcome. Responds 200 for
/// a finished cycle even when every attempt failed; the body says which.
pub async fn retry_asset(
    State(state): State<AppState>,
    Path((kind, id)): Path<(AssetKind, Uuid)>,
) -> impl IntoResponse {
    match state.transcode.retry_asset(kind, id).await {
        Ok(result) => {
            let message = if result.success {
                "Transcode completed successfully"
            } else {
                "Transcode failed after all attempts"
            };
            ApiSuccess(ApiResponse::success(result, message), StatusCode::OK).into_response()
        }
        Err(e) => ApiError(e.to_string(), error_status(&e)).into_response(),
    }
}

pub async fn retry_failed_assets(
    State(state): State<AppState>,
    Path(kind): Path<AssetKind>,
) -> impl IntoResponse {
    match state.transcode.retry_all_failed(kind).await {
        Ok(receipt) => ApiSuccess(
            ApiResponse::success(receipt, "Retry queued for failed assets"),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), error_status(&e)).into_response(),
    }
}

fn error_status(err: &TranscodeError) -> StatusCode {
    match err {
        TranscodeError::AssetNotFound { .. } => StatusCode::NOT_FOUND,
        TranscodeError::MissingSource { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        TranscodeError::AlreadyInFlight { .. } => StatusCode::CONFLICT,
        TranscodeError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        TranscodeError::Cancelled | TranscodeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
