use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Shared HTTP client for all sources. Every request is bounded by the configured
/// timeout; timeouts, connection failures and 5xx answers are retried with
/// exponential backoff (`retry_delay_ms`, then doubling).
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay_ms: u64,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let language = HeaderValue::from_str(&config.accept_language).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!("Invalid accept_language: {}", e)))
        })?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.request_timeout.min(10)))
            .build()?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` and return the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        // base^n * factor with base 2 gives retry_delay_ms, 2x, 4x, ...
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.retry_delay_ms / 2)
            .take(self.retry_attempts as usize);

        RetryIf::start(
            strategy,
            || self.get_once(url),
            |err: &AppError| {
                let transient = err.is_transient();
                if transient {
                    tracing::warn!(url, error = %err, "transient fetch error, retrying");
                }
                transient
            },
        )
        .await
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}
