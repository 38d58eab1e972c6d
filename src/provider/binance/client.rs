//! Binance REST client
//!
//! Implements `ExchangeApi` over the public spot endpoints. Every call waits
//! on the shared request limiter before going out.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ExchangeSettings;
use crate::provider::{ExchangeApi, ProviderError, ProviderResult};
use crate::schema::{Bar, Cadence, DepthSnapshot, Trade};
use crate::symbol::SymbolInfo;

use super::endpoints::{paths, BinanceEndpoints, MAX_DEPTH_LIMIT, MAX_ROWS_PER_REQUEST};
use super::rate_limiter::RequestRateLimiter;
use super::types::{
    bars_from_rows, DepthPayload, ExchangeInfoResponse, RestTrade, ServerTimeResponse,
};

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Binance spot REST client
pub struct BinanceClient {
    /// The underlying HTTP client
    http: Client,
    /// REST and stream base URLs
    endpoints: BinanceEndpoints,
    /// Shared request spacing
    rate_limiter: Arc<RequestRateLimiter>,
}

impl BinanceClient {
    /// Create a new client.
    ///
    /// The API key, when present, is sent on every request; public market
    /// data endpoints do not require it.
    pub fn new(
        endpoints: BinanceEndpoints,
        api_key: Option<&str>,
        rate_limiter: Arc<RequestRateLimiter>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let value = header::HeaderValue::from_str(key)
                .map_err(|e| ProviderError::Configuration(format!("Invalid API key: {}", e)))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            endpoints,
            rate_limiter,
        })
    }

    /// Create a client from the exchange section of the settings
    pub fn from_settings(settings: &ExchangeSettings) -> ProviderResult<Self> {
        let endpoints = BinanceEndpoints::for_network(settings.testnet).with_overrides(
            settings.rest_url.as_deref(),
            settings.stream_url.as_deref(),
        );
        let rate_limiter = Arc::new(RequestRateLimiter::per_minute(
            settings.requests_per_minute,
        ));

        Self::new(
            endpoints,
            Some(settings.api_key.as_str()),
            rate_limiter,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn endpoints(&self) -> &BinanceEndpoints {
        &self.endpoints
    }

    pub fn rate_limiter(&self) -> &Arc<RequestRateLimiter> {
        &self.rate_limiter
    }

    /// Rate-limited GET decoding the JSON body
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ProviderResult<T> {
        self.rate_limiter.acquire().await;

        let url = format!("{}{}", self.endpoints.rest_url, path);
        debug!("GET {} {:?}", url, params);

        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        Self::handle_response(response).await
    }

    /// Non-success statuses become errors carrying the body
    async fn handle_response<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Parse(format!("{} (body: {})", e, truncate(&body, 256))))
    }
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        cadence: Cadence,
        start_time: i64,
        end_time: i64,
        limit: u32,
    ) -> ProviderResult<Vec<Bar>> {
        // endTime is inclusive upstream; the window is half-open
        let inclusive_end = if end_time > start_time {
            end_time - 1
        } else {
            end_time
        };

        let params = [
            ("symbol", symbol.to_uppercase()),
            ("interval", cadence.code().to_string()),
            ("startTime", start_time.to_string()),
            ("endTime", inclusive_end.to_string()),
            ("limit", limit.clamp(1, MAX_ROWS_PER_REQUEST).to_string()),
        ];

        let rows: Vec<Value> = self.get(paths::KLINES, &params).await?;
        Ok(bars_from_rows(&rows))
    }

    async fn fetch_recent_trades(&self, symbol: &str, limit: u32) -> ProviderResult<Vec<Trade>> {
        let params = [
            ("symbol", symbol.to_uppercase()),
            ("limit", limit.clamp(1, MAX_ROWS_PER_REQUEST).to_string()),
        ];

        let trades: Vec<RestTrade> = self.get(paths::TRADES, &params).await?;
        Ok(trades.into_iter().map(Trade::from).collect())
    }

    async fn fetch_depth(&self, symbol: &str, limit: u32) -> ProviderResult<DepthSnapshot> {
        let params = [
            ("symbol", symbol.to_uppercase()),
            ("limit", limit.clamp(1, MAX_DEPTH_LIMIT).to_string()),
        ];

        let depth: DepthPayload = self.get(paths::DEPTH, &params).await?;
        Ok(depth.to_snapshot())
    }

    async fn fetch_exchange_info(&self) -> ProviderResult<Vec<SymbolInfo>> {
        let info: ExchangeInfoResponse = self.get(paths::EXCHANGE_INFO, &[]).await?;
        if info.symbols.is_empty() {
            return Err(ProviderError::DataNotAvailable(
                "exchange info lists no symbols".to_string(),
            ));
        }
        Ok(info.symbols.into_iter().map(SymbolInfo::from).collect())
    }

    async fn fetch_server_time(&self) -> ProviderResult<i64> {
        let time: ServerTimeResponse = self.get(paths::TIME, &[]).await?;
        Ok(time.server_time)
    }

    fn stream_base_url(&self) -> &str {
        &self.endpoints.stream_url
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
