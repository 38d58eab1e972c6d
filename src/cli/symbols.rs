//! Symbols command - print the working symbol set

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tracing::info;

use crate::provider::binance::BinanceClient;
use crate::provider::ExchangeApi;
use crate::symbol::SymbolUniverse;

use super::load_settings;

/// Arguments for the symbols command
#[derive(Args)]
pub struct SymbolsArgs {
    /// Configuration file path
    #[arg(long, short)]
    pub config: Option<String>,

    /// Only symbols containing this text (case-insensitive)
    #[arg(long, short)]
    pub pattern: Option<String>,

    /// Only symbols quoted in this asset (e.g., USDT)
    #[arg(long, short)]
    pub quote: Option<String>,

    /// Extra symbols to exclude (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,
}

/// Execute the symbols command
pub async fn execute(args: SymbolsArgs) -> Result<()> {
    let settings = load_settings(args.config.as_deref())?;
    let exchange: Arc<dyn ExchangeApi> = Arc::new(BinanceClient::from_settings(&settings.exchange)?);

    let universe = SymbolUniverse::new(
        exchange,
        &settings.symbols.include,
        &settings.symbols.exclude,
    );
    for symbol in &args.exclude {
        universe.add_exclude(symbol);
    }
    universe.resolve().await;

    let symbols = select_symbols(&universe, args.pattern.as_deref(), args.quote.as_deref());

    info!(
        "{} of {} working symbols selected",
        symbols.len(),
        universe.symbol_count()
    );
    for symbol in &symbols {
        println!("{}", symbol);
    }

    Ok(())
}

fn select_symbols(universe: &SymbolUniverse, pattern: Option<&str>, quote: Option<&str>) -> Vec<String> {
    let mut symbols = match pattern {
        Some(pattern) => universe.symbols_matching(pattern),
        None => universe.working_set(),
    };
    if let Some(quote) = quote {
        let quoted = universe.symbols_by_quote_asset(quote);
        symbols.retain(|s| quoted.contains(s));
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockExchange;
    use crate::symbol::{SymbolInfo, STATUS_TRADING};

    #[tokio::test]
    async fn test_select_symbols_filters() {
        let exchange = MockExchange::new().with_catalog(vec![
            SymbolInfo::new("BTCUSDT", STATUS_TRADING, "BTC", "USDT", true),
            SymbolInfo::new("ETHUSDT", STATUS_TRADING, "ETH", "USDT", true),
            SymbolInfo::new("ETHBTC", STATUS_TRADING, "ETH", "BTC", true),
        ]);
        let universe = SymbolUniverse::new(Arc::new(exchange), &[], &[]);
        universe.resolve().await;

        assert_eq!(select_symbols(&universe, None, None).len(), 3);
        assert_eq!(
            select_symbols(&universe, Some("eth"), None),
            vec!["ETHUSDT", "ETHBTC"]
        );
        assert_eq!(
            select_symbols(&universe, Some("eth"), Some("usdt")),
            vec!["ETHUSDT"]
        );
    }
}
