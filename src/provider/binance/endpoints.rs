//! Binance spot endpoints.

/// Endpoint configuration for the spot API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinanceEndpoints {
    /// REST API base URL
    pub rest_url: String,
    /// Combined-stream WebSocket URL
    pub stream_url: String,
}

impl BinanceEndpoints {
    /// Production or testnet endpoints
    pub fn for_network(testnet: bool) -> Self {
        if testnet {
            Self::spot_testnet()
        } else {
            Self::spot()
        }
    }

    /// Binance.com spot production endpoints.
    pub fn spot() -> Self {
        Self {
            rest_url: "https://api.binance.com".to_string(),
            stream_url: "wss://stream.binance.com:9443/stream".to_string(),
        }
    }

    /// Binance.com spot testnet endpoints.
    pub fn spot_testnet() -> Self {
        Self {
            rest_url: "https://testnet.binance.vision".to_string(),
            stream_url: "wss://testnet.binance.vision/stream".to_string(),
        }
    }

    /// Replace either URL, trailing slashes dropped
    pub fn with_overrides(mut self, rest_url: Option<&str>, stream_url: Option<&str>) -> Self {
        if let Some(url) = rest_url.filter(|u| !u.is_empty()) {
            self.rest_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = stream_url.filter(|u| !u.is_empty()) {
            self.stream_url = url.trim_end_matches('/').to_string();
        }
        self
    }
}

/// REST paths
pub mod paths {
    pub const KLINES: &str = "/api/v3/klines";
    pub const TRADES: &str = "/api/v3/trades";
    pub const DEPTH: &str = "/api/v3/depth";
    pub const EXCHANGE_INFO: &str = "/api/v3/exchangeInfo";
    pub const TIME: &str = "/api/v3/time";
}

/// Largest `limit` the klines and trades endpoints accept
pub const MAX_ROWS_PER_REQUEST: u32 = 1000;

/// Largest `limit` the depth endpoint accepts
pub const MAX_DEPTH_LIMIT: u32 = 5000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_selection() {
        assert_eq!(
            BinanceEndpoints::for_network(false).rest_url,
            "https://api.binance.com"
        );
        assert_eq!(
            BinanceEndpoints::for_network(true).stream_url,
            "wss://testnet.binance.vision/stream"
        );
    }

    #[test]
    fn test_overrides() {
        let endpoints = BinanceEndpoints::spot()
            .with_overrides(Some("http://127.0.0.1:8080/"), None);
        assert_eq!(endpoints.rest_url, "http://127.0.0.1:8080");
        assert_eq!(endpoints.stream_url, "wss://stream.binance.com:9443/stream");

        let unchanged = BinanceEndpoints::spot().with_overrides(Some(""), Some(""));
        assert_eq!(unchanged, BinanceEndpoints::spot());
    }
}
