use async_trait::async_trait;
use uuid::Uuid;

use crate::infrastructure::db::pool::DbPool;
use crate::modules::transcode::model::{AssetKind, HlsStatus, StatusCounts, VideoAsset};
use crate::ports::repository::{AssetStore, StoreError};

const ASSET_COLUMNS: &str =
    "id, title, source_key, hls_status, hls_playback_url, hls_s3_prefix, updated_at";

/// Postgres-backed asset store. The owning table is picked from the kind;
/// both tables share the same column layout for this subsystem.
pub struct PgAssetStore {
    pool: DbPool,
}

impl PgAssetStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetStore for PgAssetStore {
    async fn load(&self, kind: AssetKind, id: Uuid) -> Result<VideoAsset, StoreError> {
        let sql = format!(
            "SELECT {ASSET_COLUMNS} FROM {} WHERE id = $1",
            kind.table()
        );
        sqlx::query_as::<_, VideoAsset>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { kind, id })
    }

    async fn set_status(
        &self,
        kind: AssetKind,
        id: Uuid,
        status: HlsStatus,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE {} SET hls_status = $1, updated_at = NOW() WHERE id = $2",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind, id });
        }
        Ok(())
    }

    async fn set_completed(
        &self,
        kind: AssetKind,
        id: Uuid,
        playback_url: &str,
        s3_prefix: &str,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE {} SET hls_status = $1, hls_playback_url = $2, hls_s3_prefix = $3, \
             updated_at = NOW() WHERE id = $4",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(HlsStatus::Completed.as_str())
            .bind(playback_url)
            .bind(s3_prefix)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind, id });
        }
        Ok(())
    }

    async fn set_failed(&self, kind: AssetKind, id: Uuid) -> Result<(), StoreError> {
        // Leaves hls_playback_url / hls_s3_prefix from an earlier success in
        // place; they stay stale until the next completed run overwrites them.
        self.set_status(kind, id, HlsStatus::Failed).await
    }

    async fn failed_assets(&self, kind: AssetKind) -> Result<Vec<VideoAsset>, StoreError> {
        let sql = format!(
            "SELECT {ASSET_COLUMNS} FROM {} WHERE hls_status = $1 ORDER BY updated_at DESC",
            kind.table()
        );
        let assets = sqlx::query_as::<_, VideoAsset>(&sql)
            .bind(HlsStatus::Failed.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(assets)
    }

    async fn status_counts(&self, kind: AssetKind) -> Result<StatusCounts, StoreError> {
        let sql = format!(
            "SELECT hls_status, COUNT(*) FROM {} GROUP BY hls_status",
            kind.table()
        );
        let rows: Vec<(Option<String>, i64)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.add(HlsStatus::from(status.unwrap_or_default()), count);
        }
        Ok(counts)
    }
}
