use async_trait::async_trait;
use futures_util::future::join_all;

use crate::{
    error::MarketDataError,
    models::{StockDetails, StockSearchItem, WatchlistEntry, WatchlistQuote},
};

/// Source of quotes and symbol lookups.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn get_stock_details(&self, symbol: &str) -> Result<StockDetails, MarketDataError>;

    /// Empty query => a short list of popular symbols.
    async fn search_stocks(&self, query: &str) -> Result<Vec<StockSearchItem>, MarketDataError>;
}

pub fn mark_watchlisted(items: &mut [StockSearchItem], watchlist_symbols: &[String]) {
    for it in items.iter_mut() {
        it.is_in_watchlist = watchlist_symbols.iter().any(|s| s == &it.symbol);
    }
}

/// Fetch details for every entry concurrently. Entries whose lookup fails keep
/// their stored fields only.
pub async fn watchlist_with_data(
    market: &dyn MarketData,
    entries: &[WatchlistEntry],
) -> Vec<WatchlistQuote> {
    let lookups = entries.iter().map(|e| async move {
        match market.get_stock_details(&e.symbol).await {
            Ok(d) => WatchlistQuote::new(e, Some(&d)),
            Err(err) => {
                tracing::warn!(symbol = %e.symbol, error = %err, "stock details unavailable");
                WatchlistQuote::new(e, None)
            }
        }
    });

    join_all(lookups).await
}
