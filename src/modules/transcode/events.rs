use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::AssetKind;

/// Queue the upload flow publishes transcode work onto.
pub const TRANSCODE_QUEUE: &str = "transcode_requests";

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscodeRequest {
    pub asset_id: Uuid,
    pub kind: AssetKind,
    /// Set when the uploaded file is still on this host's disk, so the local
    /// provider can skip the storage round trip.
    pub local_path: Option<PathBuf>,
}
