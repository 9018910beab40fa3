use crate::config::HttpConfig;
use anyhow::{Context, Result};
use rand::RngExt;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Low-level HTTP failure. Each source maps these onto its own slot of the
/// fetch taxonomy, so the client itself stays source-agnostic.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("could not decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct HttpClient {
    inner: reqwest::Client,
    request_delay_ms: u64,
    jitter_ms: u64,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            request_delay_ms: config.request_delay_ms,
            jitter_ms: config.jitter_ms,
        })
    }

    /// GET a URL with query parameters and decode the JSON body.
    /// Single attempt; the configured timeout bounds the call.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, HttpError> {
        self.polite_delay().await;
        debug!("GET {}", url);

        let resp = self.inner.get(url).query(query).send().await?;
        Self::decode(resp).await
    }

    /// POST a JSON body with extra headers and decode the JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: Url,
        headers: &[(&'static str, String)],
        body: &B,
    ) -> Result<T, HttpError> {
        self.polite_delay().await;
        debug!("POST {}", url);

        let mut req = self.inner.post(url).json(body);
        for (name, value) in headers {
            req = req.header(*name, value);
        }

        let resp = req.send().await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, HttpError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(HttpError::Status(status));
        }

        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        if self.request_delay_ms == 0 && self.jitter_ms == 0 {
            return;
        }
        let jitter = rand::rng().random_range(0..=self.jitter_ms);
        sleep(Duration::from_millis(self.request_delay_ms + jitter)).await;
    }
}
