use crate::api::MarketDataSource;
use crate::config::BingxConfig;
use crate::models::Candle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;

const MAX_RETRIES: u32 = 3;

// Type alias for the rate limiter to simplify signatures
type BingxRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Public BingX swap market-data client with rate limiting
///
/// Cloneable; all clones share one rate limiter. Only unauthenticated
/// quote endpoints are used, so no API key is required.
#[derive(Clone)]
pub struct BingxMarketData {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BingxRateLimiter>,
}

/// Response from /openApi/swap/v3/quote/klines
#[derive(Debug, Deserialize)]
struct KlinesResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<RawKline>,
}

#[derive(Debug, Deserialize)]
struct RawKline {
    open: String,
    close: String,
    high: String,
    low: String,
    volume: String,
    time: i64,
}

impl RawKline {
    fn into_candle(self, symbol: &str) -> Result<Candle> {
        let timestamp = Utc
            .timestamp_millis_opt(self.time)
            .single()
            .context("invalid kline timestamp")?;
        Ok(Candle {
            symbol: symbol.to_string(),
            timestamp,
            open: self.open.parse().context("bad open price")?,
            high: self.high.parse().context("bad high price")?,
            low: self.low.parse().context("bad low price")?,
            close: self.close.parse().context("bad close price")?,
            volume: self.volume.parse().context("bad volume")?,
        })
    }
}

/// Response from /openApi/swap/v2/quote/price
#[derive(Debug, Deserialize)]
struct PriceResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<PriceData>,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    price: String,
}

impl BingxMarketData {
    pub fn new(config: &BingxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let rpm = NonZeroU32::new(config.rate_limit_rpm.max(1)).context("zero rate limit")?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    /// Make a rate-limited request with retry on 429/5xx/network errors
    async fn make_request(&self, url: &str) -> Result<reqwest::Response> {
        for attempt in 1..=MAX_RETRIES {
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let backoff_secs = 2u64.pow(attempt);
                        tracing::warn!(
                            %status,
                            backoff_secs,
                            attempt,
                            "BingX request throttled or failing, backing off"
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        continue;
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    anyhow::bail!("BingX API error ({}): {}", status, error_text);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    let backoff_secs = 2u64.pow(attempt);
                    tracing::warn!(error = %e, backoff_secs, attempt, "network error, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                }
                Err(e) => anyhow::bail!("Network error after {} retries: {}", MAX_RETRIES, e),
            }
        }

        anyhow::bail!("Failed after {} retries", MAX_RETRIES)
    }

    async fn try_fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/openApi/swap/v3/quote/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let response = self.make_request(&url).await?;
        let body: KlinesResponse = response.json().await.context("Failed to parse klines")?;

        if body.code != 0 {
            anyhow::bail!("BingX klines error code {}: {}", body.code, body.msg);
        }

        let mut candles = body
            .data
            .into_iter()
            .map(|k| k.into_candle(symbol))
            .collect::<Result<Vec<_>>>()?;

        // The venue returns newest first
        candles.sort_by_key(|c| c.timestamp);

        tracing::debug!(symbol, count = candles.len(), "fetched candles");
        Ok(candles)
    }

    async fn try_current_price(&self, symbol: &str) -> Result<f64> {
        let url = format!(
            "{}/openApi/swap/v2/quote/price?symbol={}",
            self.base_url, symbol
        );

        let response = self.make_request(&url).await?;
        let body: PriceResponse = response.json().await.context("Failed to parse price")?;

        if body.code != 0 {
            anyhow::bail!("BingX price error code {}: {}", body.code, body.msg);
        }

        let data = body.data.context("price response missing data")?;
        data.price.parse().context("bad price value")
    }
}

#[async_trait]
impl MarketDataSource for BingxMarketData {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: u32) -> Vec<Candle> {
        match self.try_fetch_candles(symbol, interval, limit).await {
            Ok(candles) => candles,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "candle fetch failed, returning empty series");
                Vec::new()
            }
        }
    }

    async fn current_price(&self, symbol: &str) -> f64 {
        match self.try_current_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "price fetch failed");
                0.0
            }
        }
    }
}
