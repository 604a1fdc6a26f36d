use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::ports::storage::{ObjectStorage, StorageError};

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub fn new(
        endpoint: Option<&str>,
        region: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let mut config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials);

        if let Some(endpoint) = endpoint {
            // Custom endpoints (MinIO) only answer path-style requests.
            config = config.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(config.build());
        info!("✅ Connected to S3 object storage");

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for StorageService {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify_get_error(key, err))?;

        // Stream to disk chunk by chunk; source videos do not fit in memory.
        let mut body = resp.body;
        let mut file = File::create(dest).await?;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| StorageError::Backend(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }
}

fn classify_get_error(key: &str, err: SdkError<GetObjectError>) -> StorageError {
    if let Some(service_err) = err.as_service_error() {
        if service_err.is_no_such_key() {
            return StorageError::NotFound(key.to_string());
        }
    }
    StorageError::Backend(DisplayErrorContext(&err).to_string())
}
