use anyhow::anyhow;
use serde::Deserialize;

use crate::config::env::{self, EnvKey};
use crate::modules::transcode::provider::ProviderKind;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub amqp_url: String,
    pub provider: ProviderKind,
    pub transcoder_role_arn: Option<String>,
    pub storage_endpoint: Option<String>,
    pub storage_region: String,
    pub storage_bucket: String,
    pub storage_access_key: String,
    pub storage_secret_key: String,
    pub cdn_domain: Option<String>,
    pub ffmpeg_path: String,
}

impl AppConfig {
    pub fn new() -> anyhow::Result<Self> {
        let provider = env::get_or(EnvKey::TranscodeProvider, "local")
            .parse::<ProviderKind>()
            .map_err(|e| anyhow!(e))?;

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: require(EnvKey::DatabaseUrl)?,
            amqp_url: require(EnvKey::AmqpUrl)?,
            provider,
            transcoder_role_arn: env::get(EnvKey::TranscoderRoleArn).ok(),
            storage_endpoint: env::get(EnvKey::StorageEndpoint).ok(),
            storage_region: env::get_or(EnvKey::StorageRegion, "us-east-1"),
            storage_bucket: require(EnvKey::StorageBucket)?,
            storage_access_key: require(EnvKey::StorageAccessKey)?,
            storage_secret_key: require(EnvKey::StorageSecretKey)?,
            cdn_domain: env::get(EnvKey::CdnDomain).ok(),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
        })
    }

    /// Base URL under which stored objects are directly reachable, used as the
    /// playback fallback when no CDN domain is configured.
    pub fn storage_base_url(&self) -> String {
        match &self.storage_endpoint {
            Some(endpoint) => format!(
                "{}/{}",
                endpoint.trim_end_matches('/'),
                self.storage_bucket
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com",
                self.storage_bucket, self.storage_region
            ),
        }
    }
}

fn require(key: EnvKey) -> anyhow::Result<String> {
    let name = key.as_str();
    env::get(key).map_err(|_| anyhow!("{name} is not set"))
}
