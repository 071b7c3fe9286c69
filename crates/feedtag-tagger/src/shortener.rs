//! Link shortening through the Short.io `links` endpoint.

use std::time::Duration;

use feedtag_core::ShortenerConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::TaggerError;

/// Turns a long URL into a short one. `None` means "no short link".
#[allow(async_fn_in_trait)]
pub trait LinkShortener {
    async fn shorten(&self, long_url: &str) -> Option<String>;
}

#[derive(Serialize)]
struct ShortenRequest<'a> {
    domain: &'a str,
    #[serde(rename = "originalURL")]
    original_url: &'a str,
}

#[derive(Deserialize)]
struct ShortenResponse {
    #[serde(rename = "shortURL")]
    short_url: Option<String>,
}

/// Client for the Short.io link API.
pub struct ShortIoClient {
    client: Client,
    endpoint: String,
    token: String,
    domain: String,
}

impl ShortIoClient {
    /// # Errors
    ///
    /// Returns [`TaggerError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: &ShortenerConfig, timeout_secs: u64) -> Result<Self, TaggerError> {
        Self::with_base_url(&config.token, &config.domain, timeout_secs, &config.base_url)
    }

    /// Client against a custom base URL (used with wiremock in tests).
    ///
    /// # Errors
    ///
    /// Returns [`TaggerError::Http`] if the HTTP client cannot be constructed.
    pub fn with_base_url(
        token: &str,
        domain: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, TaggerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/links", base_url.trim_end_matches('/')),
            token: token.to_owned(),
            domain: domain.to_owned(),
        })
    }

    /// Shorten `long_url`, surfacing every failure.
    ///
    /// # Errors
    ///
    /// - [`TaggerError::Http`] on network failure or an undecodable body.
    /// - [`TaggerError::UnexpectedStatus`] on a non-2xx response.
    /// - [`TaggerError::MalformedResponse`] if `shortURL` is missing or blank.
    pub async fn try_shorten(&self, long_url: &str) -> Result<String, TaggerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("accept", "application/json")
            .header("authorization", &self.token)
            .json(&ShortenRequest {
                domain: &self.domain,
                original_url: long_url,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TaggerError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body: ShortenResponse = response.json().await?;
        body.short_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| TaggerError::MalformedResponse {
                service: "short.io",
                reason: "response has no shortURL".to_string(),
            })
    }
}

impl LinkShortener for ShortIoClient {
    async fn shorten(&self, long_url: &str) -> Option<String> {
        if long_url.trim().is_empty() {
            return None;
        }
        match self.try_shorten(long_url).await {
            Ok(short) => Some(short),
            Err(e) => {
                tracing::warn!(url = long_url, error = %e, "link shortening failed");
                None
            }
        }
    }
}

/// Shortener used when no Short.io credentials are configured: the original
/// link is kept as the live source.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughShortener;

impl LinkShortener for PassthroughShortener {
    async fn shorten(&self, long_url: &str) -> Option<String> {
        let trimmed = long_url.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// The shortener selected from configuration.
pub enum Shortener {
    ShortIo(ShortIoClient),
    Passthrough(PassthroughShortener),
}

impl Shortener {
    /// Short.io when credentials are present, passthrough otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TaggerError::Http`] if the HTTP client cannot be constructed.
    pub fn from_config(
        config: Option<&ShortenerConfig>,
        timeout_secs: u64,
    ) -> Result<Self, TaggerError> {
        match config {
            Some(config) => Ok(Self::ShortIo(ShortIoClient::new(config, timeout_secs)?)),
            None => {
                tracing::warn!("SHORT_IO_TOKEN not set; live source links will not be shortened");
                Ok(Self::Passthrough(PassthroughShortener))
            }
        }
    }
}

impl LinkShortener for Shortener {
    async fn shorten(&self, long_url: &str) -> Option<String> {
        match self {
            Self::ShortIo(client) => client.shorten(long_url).await,
            Self::Passthrough(passthrough) => passthrough.shorten(long_url).await,
        }
    }
}
