//! Remote catalog source.
//!
//! The engine only sees the [`CatalogSource`] trait; [`HttpCatalog`] is the
//! production implementation backed by the static JSON mirror.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CatalogConfig;
use crate::protocol::{Channel, CountryDirectory};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Raised by non-HTTP sources (fixtures, caches).
    #[error("{0}")]
    Other(String),
}

/// Pure fetch functions the engine consumes.
///
/// Channel lists come back empty when the mirror has nothing for the key;
/// every other failure is an error.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_channels_by_country(&self, country_code: &str) -> Result<Vec<Channel>, FetchError>;

    async fn fetch_channels_by_category(&self, category_slug: &str) -> Result<Vec<Channel>, FetchError>;

    async fn fetch_country_metadata(&self) -> Result<CountryDirectory, FetchError>;
}

pub struct HttpCatalog {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("tvsurf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch_channel_list(&self, path: &str) -> Result<Vec<Channel>, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!("No channels found at {}", url);
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let channels: Vec<Channel> = response
            .json()
            .await
            .map_err(|source| FetchError::Decode {
                url: url.clone(),
                source,
            })?;
        let total = channels.len();
        let playable = playable_only(channels);
        debug!("{}: {} channels ({} playable)", url, total, playable.len());
        Ok(playable)
    }
}

/// Drop channels that carry no stream URL.
pub fn playable_only(channels: Vec<Channel>) -> Vec<Channel> {
    channels.into_iter().filter(Channel::is_playable).collect()
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch_channels_by_country(&self, country_code: &str) -> Result<Vec<Channel>, FetchError> {
        self.fetch_channel_list(&format!("countries/{}.json", country_code.to_lowercase()))
            .await
    }

    async fn fetch_channels_by_category(&self, category_slug: &str) -> Result<Vec<Channel>, FetchError> {
        self.fetch_channel_list(&format!("categories/{}.json", category_slug))
            .await
    }

    async fn fetch_country_metadata(&self) -> Result<CountryDirectory, FetchError> {
        let url = format!("{}/countries_metadata.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        response
            .json::<CountryDirectory>()
            .await
            .map_err(|source| FetchError::Decode { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playable_only() {
        let channels = vec![
            Channel {
                nanoid: "a".into(),
                iptv_urls: vec!["https://example.com/a.m3u8".into()],
                ..Default::default()
            },
            Channel {
                nanoid: "b".into(),
                youtube_urls: vec!["https://youtube.com/b".into()],
                ..Default::default()
            },
        ];
        let kept = playable_only(channels);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id(), "a");
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let config = CatalogConfig {
            base_url: "https://mirror.example/".into(),
            ..Default::default()
        };
        let catalog = HttpCatalog::new(&config).unwrap();
        assert_eq!(catalog.base_url, "https://mirror.example");
    }
}
