use serde::Serialize;

/// Point-in-time market data for one symbol. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockDetails {
    pub symbol: String,
    pub name: String,

    pub current_price: Option<f64>,
    pub change_percent: Option<f64>,
    // USD
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,

    pub price_formatted: String,
    pub change_formatted: String,
    pub market_cap_formatted: String,
    pub pe_ratio_formatted: String,
}

impl StockDetails {
    pub fn new(
        symbol: &str,
        name: Option<String>,
        current_price: Option<f64>,
        change_percent: Option<f64>,
        market_cap: Option<f64>,
        pe_ratio: Option<f64>,
    ) -> Self {
        let symbol = symbol.trim().to_uppercase();
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| symbol.clone());

        // a zero / missing quote means "no usable price"
        let current_price = current_price.filter(|p| p.is_finite() && *p > 0.0);
        let change_percent = change_percent.filter(|c| c.is_finite());

        Self {
            price_formatted: current_price.map(format_price).unwrap_or_default(),
            change_formatted: change_percent.map(format_change_percent).unwrap_or_default(),
            market_cap_formatted: market_cap.map(format_market_cap).unwrap_or_default(),
            pe_ratio_formatted: format_pe_ratio(pe_ratio),
            symbol,
            name,
            current_price,
            change_percent,
            market_cap,
            pe_ratio,
        }
    }
}

/// Search hit shown in the stock search dialog.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockSearchItem {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_in_watchlist: bool,
}

pub fn format_price(price: f64) -> String {
    format!("{:.2}", price)
}

pub fn format_change_percent(change: f64) -> String {
    let sign = if change >= 0.0 { "+" } else { "" };
    format!("{sign}{:.2}%", change)
}

pub fn format_market_cap(usd: f64) -> String {
    if !usd.is_finite() {
        return String::new();
    }

    if usd >= 1e12 {
        format!("${:.2}T", usd / 1e12)
    } else if usd >= 1e9 {
        format!("${:.2}B", usd / 1e9)
    } else if usd >= 1e6 {
        format!("${:.2}M", usd / 1e6)
    } else {
        format!("${:.0}", usd)
    }
}

pub fn format_pe_ratio(pe: Option<f64>) -> String {
    match pe {
        Some(v) if v.is_finite() => format!("{:.2}", v),
        _ => "N/A".to_string(),
    }
}
