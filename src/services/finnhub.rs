use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::MarketDataError,
    models::{StockDetails, StockSearchItem},
};

use super::market_data::MarketData;

const QUOTE_TTL: Duration = Duration::from_secs(60);
const PROFILE_TTL: Duration = Duration::from_secs(3600);
const METRIC_TTL: Duration = Duration::from_secs(3600);
const SEARCH_TTL: Duration = Duration::from_secs(1800);

const MAX_SEARCH_RESULTS: usize = 15;
const MAX_CACHE_ENTRIES: usize = 2048;

pub const POPULAR_STOCK_SYMBOLS: [&str; 10] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA", "NFLX", "ORCL", "CRM",
];

#[derive(Clone)]
pub struct FinnhubClient {
    http: Client,
    api_key: String,
    base_url: String,
    cache: ResponseCache,
}

impl FinnhubClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_default();

        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: ResponseCache::default(),
        }
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        ttl: Duration,
    ) -> Result<T, MarketDataError> {
        if !self.has_key() {
            return Err(MarketDataError::MissingApiKey);
        }

        // token stays out of the key
        let key = cache_key(path, params);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(serde_json::from_value(hit)?);
        }

        let url = format!("{}{}", self.base_url, path);
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("token", self.api_key.as_str()));

        let res = self.http.get(&url).query(&query).send().await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(MarketDataError::Status { status, body });
        }

        let value: serde_json::Value = res.json().await?;
        let parsed = serde_json::from_value::<T>(value.clone())?;
        self.cache.put(key, value, ttl);

        Ok(parsed)
    }

    pub async fn search(&self, q: &str) -> Result<SearchResponse, MarketDataError> {
        self.get_json("/search", &[("q", q)], SEARCH_TTL).await
    }

    pub async fn quote(&self, symbol: &str) -> Result<QuoteResponse, MarketDataError> {
        self.get_json("/quote", &[("symbol", symbol)], QUOTE_TTL).await
    }

    pub async fn profile(&self, symbol: &str) -> Result<ProfileResponse, MarketDataError> {
        self.get_json("/stock/profile2", &[("symbol", symbol)], PROFILE_TTL)
            .await
    }

    pub async fn metrics(&self, symbol: &str) -> Result<MetricResponse, MarketDataError> {
        self.get_json("/stock/metric", &[("symbol", symbol), ("metric", "all")], METRIC_TTL)
            .await
    }

    async fn popular_stocks(&self) -> Vec<StockSearchItem> {
        let lookups = POPULAR_STOCK_SYMBOLS.iter().map(|sym| async move {
            match self.profile(sym).await {
                Ok(p) => {
                    let exchange = p.exchange.unwrap_or_else(|| "US".to_string());
                    p.name
                        .or(p.ticker)
                        .filter(|n| !n.trim().is_empty())
                        .map(|name| StockSearchItem {
                            symbol: sym.to_string(),
                            name,
                            exchange,
                            kind: "Common Stock".to_string(),
                            is_in_watchlist: false,
                        })
                }
                Err(e) => {
                    tracing::warn!(symbol = %sym, error = %e, "profile lookup failed");
                    None
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }
}

#[async_trait]
impl MarketData for FinnhubClient {
    async fn get_stock_details(&self, symbol: &str) -> Result<StockDetails, MarketDataError> {
        let sym = symbol.trim().to_uppercase();

        let (quote, profile, metrics) =
            tokio::join!(self.quote(&sym), self.profile(&sym), self.metrics(&sym));

        let quote = quote?;

        // profile / metrics only decorate the quote
        let profile = profile
            .inspect_err(|e| tracing::debug!(symbol = %sym, error = %e, "profile unavailable"))
            .unwrap_or_default();
        let pe_ratio = metrics
            .inspect_err(|e| tracing::debug!(symbol = %sym, error = %e, "metrics unavailable"))
            .ok()
            .and_then(|m| m.metric)
            .and_then(|m| m.pe_basic_excl_extra_ttm);

        Ok(StockDetails::new(
            &sym,
            profile.name,
            quote.c,
            quote.dp,
            // finnhub reports market cap in millions
            profile.market_capitalization.map(|m| m * 1e6),
            pe_ratio,
        ))
    }

    async fn search_stocks(&self, query: &str) -> Result<Vec<StockSearchItem>, MarketDataError> {
        let q = query.trim();

        if q.is_empty() {
            if !self.has_key() {
                return Err(MarketDataError::MissingApiKey);
            }
            return Ok(self.popular_stocks().await);
        }

        let resp = self.search(q).await?;

        let items = resp
            .result
            .into_iter()
            .filter(|it| !it.symbol.trim().is_empty())
            .take(MAX_SEARCH_RESULTS)
            .map(|it| {
                let symbol = it.symbol.trim().to_uppercase();
                let name = if it.description.trim().is_empty() {
                    symbol.clone()
                } else {
                    it.description
                };
                let exchange = if it.display_symbol.trim().is_empty() {
                    "US".to_string()
                } else {
                    it.display_symbol
                };
                let kind = if it.kind.trim().is_empty() {
                    "Stock".to_string()
                } else {
                    it.kind
                };

                StockSearchItem {
                    symbol,
                    name,
                    exchange,
                    kind,
                    is_in_watchlist: false,
                }
            })
            .collect();

        Ok(items)
    }
}

fn cache_key(path: &str, params: &[(&str, &str)]) -> String {
    let mut key = path.to_string();
    for (k, v) in params {
        key.push('|');
        key.push_str(k);
        key.push('=');
        key.push_str(v);
    }
    key
}

struct CachedResponse {
    value: serde_json::Value,
    expires_at: Instant,
}

#[derive(Clone, Default)]
struct ResponseCache {
    inner: Arc<Mutex<HashMap<String, CachedResponse>>>,
}

impl ResponseCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut map = self.inner.lock().ok()?;
        let now = Instant::now();

        if let Some(c) = map.get(key) {
            if c.expires_at > now {
                return Some(c.value.clone());
            }
        }

        map.remove(key);
        None
    }

    fn put(&self, key: String, value: serde_json::Value, ttl: Duration) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };

        let now = Instant::now();
        if map.len() >= MAX_CACHE_ENTRIES {
            map.retain(|_, c| c.expires_at > now);
        }

        map.insert(
            key,
            CachedResponse {
                value,
                expires_at: now + ttl,
            },
        );
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub result: Vec<SearchItem>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchItem {
    #[serde(default)]
    pub description: String,

    #[serde(default, rename = "displaySymbol")]
    pub display_symbol: String,

    #[serde(default)]
    pub symbol: String,

    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct QuoteResponse {
    // current
    pub c: Option<f64>,
    // change
    pub d: Option<f64>,
    // percent change
    pub dp: Option<f64>,
    // high
    pub h: Option<f64>,
    // low
    pub l: Option<f64>,
    // open
    pub o: Option<f64>,
    // previous close
    pub pc: Option<f64>,
    // timestamp
    pub t: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProfileResponse {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub exchange: Option<String>,

    // millions of USD
    #[serde(rename = "marketCapitalization")]
    pub market_capitalization: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MetricResponse {
    pub metric: Option<MetricValues>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MetricValues {
    #[serde(rename = "peBasicExclExtraTTM")]
    pub pe_basic_excl_extra_ttm: Option<f64>,
}
