use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    AmqpUrl,
    TranscodeProvider,
    TranscoderRoleArn,
    StorageEndpoint,
    StorageRegion,
    StorageBucket,
    StorageAccessKey,
    StorageSecretKey,
    CdnDomain,
    FfmpegPath,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::TranscodeProvider => "TRANSCODER_PROVIDER",
            EnvKey::TranscoderRoleArn => "TRANSCODER_ROLE_ARN",
            EnvKey::StorageEndpoint => "S3_ENDPOINT",
            EnvKey::StorageRegion => "AWS_REGION",
            EnvKey::StorageBucket => "S3_BUCKET_VIDEOS",
            EnvKey::StorageAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::StorageSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::CdnDomain => "CDN_DOMAIN",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
