use url::Url;

use crate::modules::transcode::provider::ProviderKind;

/// Builds public playback URLs for stored HLS objects. A configured CDN
/// domain fronts the bucket; without one, URLs point straight at storage.
#[derive(Clone)]
pub struct CdnUrlBuilder {
    base: Url,
}

impl CdnUrlBuilder {
    pub fn new(cdn_domain: Option<&str>, storage_base: &str) -> Result<Self, url::ParseError> {
        let raw = match cdn_domain.filter(|domain| !domain.is_empty()) {
            Some(domain) if domain.starts_with("http://") || domain.starts_with("https://") => {
                domain.to_string()
            }
            Some(domain) => format!("https://{domain}"),
            None => storage_base.to_string(),
        };

        // Url::join treats a base without a trailing slash as a file and
        // would drop its last path segment.
        let normalized = if raw.ends_with('/') {
            raw
        } else {
            format!("{raw}/")
        };
        let base = Url::parse(&normalized)?;
        Ok(Self { base })
    }

    /// Public URL for one stored object key.
    pub fn build_url(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match self.base.join(key) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base, key),
        }
    }

    /// Public URL of the master playlist under an asset's output prefix.
    pub fn playback_url(&self, prefix: &str, master_name: &str) -> String {
        self.build_url(&format!("{prefix}/{master_name}"))
    }

    /// Rewrites the final path segment of a stored playback URL to the
    /// master playlist name the given provider writes. Assets transcoded
    /// before a provider switch keep working on the read path.
    pub fn normalize_master_playlist_url(&self, stored_url: &str, provider: ProviderKind) -> String {
        let master = provider.master_playlist_name();
        match stored_url.rsplit_once('/') {
            Some((base, _)) => format!("{base}/{master}"),
            None => master.to_string(),
        }
    }
}
