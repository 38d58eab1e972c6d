//! Symbol universe management
//!
//! This module provides:
//! - SymbolInfo: catalog entry with trading metadata
//! - SymbolUniverse: include/exclude lists reconciled against the exchange catalog

mod universe;

pub use universe::*;

use serde::{Deserialize, Serialize};

/// Catalog status of a symbol open for trading
pub const STATUS_TRADING: &str = "TRADING";

/// Symbol with the metadata the exchange catalog reports
///
/// Only symbols discovered through the catalog carry metadata; explicitly
/// configured symbols are plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub spot_trading_allowed: bool,
    pub margin_trading_allowed: bool,
}

impl SymbolInfo {
    /// Spot symbol with the given status
    pub fn new(
        symbol: impl Into<String>,
        status: impl Into<String>,
        base_asset: impl Into<String>,
        quote_asset: impl Into<String>,
        spot_trading_allowed: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            status: status.into(),
            base_asset: base_asset.into(),
            quote_asset: quote_asset.into(),
            spot_trading_allowed,
            margin_trading_allowed: false,
        }
    }

    /// Open for trading and spot trading permitted
    pub fn is_tradable(&self) -> bool {
        self.status == STATUS_TRADING && self.spot_trading_allowed
    }
}
