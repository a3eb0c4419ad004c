use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

pub mod alert;
pub mod quote;
pub mod user;
pub mod watchlist;

pub use alert::{Alert, AlertType, Frequency, NewAlert, TriggerUpdate};
pub use quote::{StockDetails, StockSearchItem};
pub use user::{CurrentUser, UserContact};
pub use watchlist::{WatchlistEntry, WatchlistQuote};

// plain tickers plus exchange-qualified forms like BRK.B, BINANCE:BTCUSDT, ^GSPC
static SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9^][A-Z0-9.:\-=^]{0,23}$").expect("symbol regex")
});

/// Trim + uppercase a ticker and reject anything that cannot be one.
pub fn normalize_symbol(raw: &str) -> Result<String, ValidationError> {
    let sym = raw.trim().to_uppercase();
    if sym.is_empty() {
        return Err(ValidationError::MissingField { field: "symbol" });
    }
    if !SYMBOL_RE.is_match(&sym) {
        return Err(ValidationError::InvalidSymbol { value: raw.to_string() });
    }
    Ok(sym)
}
