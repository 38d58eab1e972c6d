//! Symbol universe resolver
//!
//! Reconciles the configured include and exclude lists against the
//! exchange catalog to produce the working symbol set.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::provider::{ExchangeApi, ProviderResult};

use super::SymbolInfo;

#[derive(Default)]
struct UniverseState {
    /// Explicit symbols, upper-cased, in configuration order
    includes: Vec<String>,
    /// Symbols never ingested, upper-cased
    excludes: Vec<String>,
    /// Tradable catalog symbols, in exchange order
    catalog: Vec<SymbolInfo>,
    catalog_loaded: bool,
}

impl UniverseState {
    fn is_excluded(&self, symbol: &str) -> bool {
        contains_ignore_case(&self.excludes, symbol)
    }

    fn working_set(&self) -> Vec<String> {
        let source: Box<dyn Iterator<Item = &String>> = if self.includes.is_empty() {
            Box::new(self.catalog.iter().map(|s| &s.symbol))
        } else {
            Box::new(self.includes.iter())
        };

        source
            .filter(|s| !self.is_excluded(s))
            .cloned()
            .collect()
    }
}

/// Symbol universe resolver
///
/// The working set is derived on every call rather than stored: the
/// explicit includes when any are configured, otherwise the tradable
/// catalog, in both cases minus the excludes. The catalog is fetched once
/// and cached; reads take a shared lock.
pub struct SymbolUniverse {
    exchange: Arc<dyn ExchangeApi>,
    state: RwLock<UniverseState>,
}

impl SymbolUniverse {
    /// Create a universe from configured lists
    pub fn new(exchange: Arc<dyn ExchangeApi>, includes: &[String], excludes: &[String]) -> Self {
        let mut state = UniverseState::default();
        for symbol in includes {
            push_unique(&mut state.includes, symbol);
        }
        for symbol in excludes {
            push_unique(&mut state.excludes, symbol);
        }

        Self {
            exchange,
            state: RwLock::new(state),
        }
    }

    /// Load the catalog if it has not been loaded yet
    ///
    /// A failed fetch is logged and leaves the catalog empty; the next call
    /// tries again.
    pub async fn resolve(&self) {
        if self.state.read().catalog_loaded {
            return;
        }

        if let Err(e) = self.load_catalog().await {
            error!("Failed to load symbol catalog: {}", e);
        }
    }

    /// Reload the catalog unconditionally
    pub async fn refresh(&self) -> ProviderResult<usize> {
        self.load_catalog().await
    }

    async fn load_catalog(&self) -> ProviderResult<usize> {
        let symbols = self.exchange.fetch_exchange_info().await?;
        let total = symbols.len();
        let tradable: Vec<SymbolInfo> = symbols.into_iter().filter(|s| s.is_tradable()).collect();
        let count = tradable.len();

        {
            let mut state = self.state.write();
            state.catalog = tradable;
            state.catalog_loaded = true;
        }

        info!(
            "Loaded symbol catalog: {} tradable of {} listed",
            count, total
        );
        Ok(count)
    }

    /// Whether the catalog has been fetched successfully
    pub fn is_catalog_loaded(&self) -> bool {
        self.state.read().catalog_loaded
    }

    /// Symbols to ingest
    pub fn working_set(&self) -> Vec<String> {
        self.state.read().working_set()
    }

    pub fn symbol_count(&self) -> usize {
        self.working_set().len()
    }

    pub fn includes(&self) -> Vec<String> {
        self.state.read().includes.clone()
    }

    pub fn excludes(&self) -> Vec<String> {
        self.state.read().excludes.clone()
    }

    /// Cached tradable catalog
    pub fn catalog(&self) -> Vec<SymbolInfo> {
        self.state.read().catalog.clone()
    }

    /// Add an explicit symbol; returns false if it was already present
    pub fn add_include(&self, symbol: &str) -> bool {
        let added = push_unique(&mut self.state.write().includes, symbol);
        if added {
            debug!("Added include symbol: {}", symbol.to_uppercase());
        }
        added
    }

    /// Remove an explicit symbol; returns false if it was not present
    pub fn remove_include(&self, symbol: &str) -> bool {
        let removed = remove_ignore_case(&mut self.state.write().includes, symbol);
        if removed {
            debug!("Removed include symbol: {}", symbol.to_uppercase());
        }
        removed
    }

    /// Exclude a symbol; returns false if it was already excluded
    pub fn add_exclude(&self, symbol: &str) -> bool {
        let added = push_unique(&mut self.state.write().excludes, symbol);
        if added {
            debug!("Added exclude symbol: {}", symbol.to_uppercase());
        }
        added
    }

    /// Lift an exclusion; returns false if the symbol was not excluded
    pub fn remove_exclude(&self, symbol: &str) -> bool {
        let removed = remove_ignore_case(&mut self.state.write().excludes, symbol);
        if removed {
            debug!("Removed exclude symbol: {}", symbol.to_uppercase());
        }
        removed
    }

    /// True for a non-excluded symbol that is either included or in the catalog
    pub fn is_valid_symbol(&self, symbol: &str) -> bool {
        let state = self.state.read();
        if state.is_excluded(symbol) {
            return false;
        }
        contains_ignore_case(&state.includes, symbol)
            || state
                .catalog
                .iter()
                .any(|s| s.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Working-set symbols containing `pattern`, case-insensitive
    pub fn symbols_matching(&self, pattern: &str) -> Vec<String> {
        let pattern = pattern.to_uppercase();
        self.working_set()
            .into_iter()
            .filter(|s| s.contains(&pattern))
            .collect()
    }

    /// Working-set symbols quoted in `asset`
    ///
    /// Uses catalog metadata when the symbol is known there, a suffix match
    /// otherwise.
    pub fn symbols_by_quote_asset(&self, asset: &str) -> Vec<String> {
        let asset = asset.to_uppercase();
        let state = self.state.read();

        state
            .working_set()
            .into_iter()
            .filter(|symbol| {
                match state.catalog.iter().find(|s| &s.symbol == symbol) {
                    Some(info) => info.quote_asset.eq_ignore_ascii_case(&asset),
                    None => symbol.ends_with(&asset),
                }
            })
            .collect()
    }
}

fn contains_ignore_case(list: &[String], symbol: &str) -> bool {
    list.iter().any(|s| s.eq_ignore_ascii_case(symbol))
}

fn push_unique(list: &mut Vec<String>, symbol: &str) -> bool {
    let symbol = symbol.trim();
    if symbol.is_empty() || contains_ignore_case(list, symbol) {
        return false;
    }
    list.push(symbol.to_uppercase());
    true
}

fn remove_ignore_case(list: &mut Vec<String>, symbol: &str) -> bool {
    let before = list.len();
    list.retain(|s| !s.eq_ignore_ascii_case(symbol.trim()));
    list.len() != before
}
