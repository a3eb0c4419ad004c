use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::StockDetails;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistEntry {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: String,
    pub symbol: String,
    pub company: String,

    pub added_at: i64,
}

/// A watchlist entry joined with whatever market data could be fetched for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistQuote {
    pub symbol: String,
    pub company: String,
    pub added_at: i64,

    pub current_price: Option<f64>,
    pub change_percent: Option<f64>,
    pub price_formatted: String,
    pub change_formatted: String,
    pub market_cap: String,
    pub pe_ratio: String,
}

impl WatchlistQuote {
    pub fn new(entry: &WatchlistEntry, details: Option<&StockDetails>) -> Self {
        match details {
            Some(d) => Self {
                symbol: entry.symbol.clone(),
                company: entry.company.clone(),
                added_at: entry.added_at,
                current_price: d.current_price,
                change_percent: d.change_percent,
                price_formatted: d.price_formatted.clone(),
                change_formatted: d.change_formatted.clone(),
                market_cap: d.market_cap_formatted.clone(),
                pe_ratio: d.pe_ratio_formatted.clone(),
            },
            None => Self {
                symbol: entry.symbol.clone(),
                company: entry.company.clone(),
                added_at: entry.added_at,
                current_price: None,
                change_percent: None,
                price_formatted: String::new(),
                change_formatted: String::new(),
                market_cap: String::new(),
                pe_ratio: String::new(),
            },
        }
    }
}
