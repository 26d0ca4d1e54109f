use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use crate::core::config::AnalystConfig;

pub const BYBIT_MAINNET_URL: &str = "https://api.bybit.com";
pub const BYBIT_TESTNET_URL: &str = "https://api-testnet.bybit.com";

pub const VALID_INTERVALS: [&str; 13] = [
    "1", "3", "5", "15", "30", "60", "120", "240", "360", "720", "D", "W", "M",
];
pub const VALID_CATEGORIES: [&str; 4] = ["spot", "linear", "inverse", "option"];

const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Normalizes a trading pair to Bybit's form: "btc/usdt" -> "BTCUSDT".
pub fn format_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase().replace(['/', '-', '_'], "")
}

pub fn validate_category(category: &str) -> Result<&str> {
    if !VALID_CATEGORIES.contains(&category) {
        return Err(anyhow!(
            "Invalid category '{}'. Valid options: {}",
            category,
            VALID_CATEGORIES.join(", ")
        ));
    }
    Ok(category)
}

pub fn validate_interval(interval: &str) -> Result<&str> {
    if !VALID_INTERVALS.contains(&interval) {
        return Err(anyhow!(
            "Invalid interval '{}'. Valid options: {}",
            interval,
            VALID_INTERVALS.join(", ")
        ));
    }
    Ok(interval)
}

/// Public-endpoint Bybit v5 client for quotes and candles.
pub struct BybitClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl BybitClient {
    pub fn new(config: &AnalystConfig) -> Result<Self> {
        let base_url = if config.bybit_testnet {
            BYBIT_TESTNET_URL
        } else {
            BYBIT_MAINNET_URL
        };

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(BybitClient {
            client,
            base_url: base_url.to_string(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    /// Current quote for one trading pair.
    pub async fn get_ticker(&self, symbol: &str, category: &str) -> Result<Value> {
        let symbol = format_symbol(symbol);
        let category = validate_category(category)?;

        log::info!("Fetching quote for {} ({})", symbol, category);
        let data = self
            .get_json(
                "/v5/market/tickers",
                &[("category", category.to_string()), ("symbol", symbol.clone())],
            )
            .await?;

        let ticker = data
            .get("result")
            .and_then(|r| r.get("list"))
            .and_then(|l| l.as_array())
            .and_then(|l| l.first())
            .ok_or_else(|| anyhow!("No quote found for {} in category {}", symbol, category))?;

        Ok(json!({
            "symbol": ticker.get("symbol"),
            "category": category,
            "last_price": ticker.get("lastPrice"),
            "bid_price": ticker.get("bid1Price"),
            "ask_price": ticker.get("ask1Price"),
            "high_24h": ticker.get("highPrice24h"),
            "low_24h": ticker.get("lowPrice24h"),
            "volume_24h": ticker.get("volume24h"),
            "turnover_24h": ticker.get("turnover24h"),
            "price_change_24h_percent": ticker.get("price24hPcnt"),
            "prev_price_24h": ticker.get("prevPrice24h"),
            "timestamp": Utc::now().to_rfc3339(),
            "exchange": "Bybit",
        }))
    }

    /// Candles for the last `days` days at the given interval, oldest first.
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        days: i64,
        category: &str,
    ) -> Result<Value> {
        let symbol = format_symbol(symbol);
        let category = validate_category(category)?;
        let interval = validate_interval(interval)?;

        let end = Utc::now();
        let start = end - chrono::Duration::days(days);

        log::info!(
            "Fetching klines for {} interval {} over {} days",
            symbol,
            interval,
            days
        );
        let data = self
            .get_json(
                "/v5/market/kline",
                &[
                    ("category", category.to_string()),
                    ("symbol", symbol.clone()),
                    ("interval", interval.to_string()),
                    ("start", start.timestamp_millis().to_string()),
                    ("end", end.timestamp_millis().to_string()),
                    ("limit", MAX_KLINES_PER_REQUEST.to_string()),
                ],
            )
            .await?;

        let klines = data
            .get("result")
            .and_then(|r| r.get("list"))
            .and_then(|l| l.as_array())
            .cloned()
            .unwrap_or_default();

        if klines.is_empty() {
            return Err(anyhow!("No historical data found for {}", symbol));
        }

        let mut formatted = format_klines(&klines);
        formatted.sort_by_key(|k| k["timestamp"].as_i64().unwrap_or(0));

        Ok(json!({
            "symbol": symbol,
            "category": category,
            "interval": interval,
            "period_days": days,
            "data_count": formatted.len(),
            "klines": formatted,
            "exchange": "Bybit",
        }))
    }

    /// Available trading pairs in a category, most liquid listings first.
    pub async fn list_symbols(&self, category: &str, limit: usize) -> Result<Value> {
        let category = validate_category(category)?;

        let data = self
            .get_json("/v5/market/tickers", &[("category", category.to_string())])
            .await?;

        let tickers = data
            .get("result")
            .and_then(|r| r.get("list"))
            .and_then(|l| l.as_array())
            .cloned()
            .unwrap_or_default();

        if tickers.is_empty() {
            return Err(anyhow!("No trading pairs found for category {}", category));
        }

        let symbols: Vec<Value> = tickers
            .iter()
            .take(limit)
            .map(|t| {
                json!({
                    "symbol": t.get("symbol"),
                    "last_price": t.get("lastPrice"),
                    "volume_24h": t.get("volume24h"),
                    "price_change_24h_percent": t.get("price24hPcnt"),
                })
            })
            .collect();

        Ok(json!({
            "category": category,
            "total_available": tickers.len(),
            "returned_count": symbols.len(),
            "symbols": symbols,
            "exchange": "Bybit",
        }))
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut attempt = 0;
        loop {
            let result = self.client.get(&url).query(params).send().await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    if attempt + 1 >= self.max_retries {
                        return Err(anyhow!(
                            "Failed to connect to Bybit API after {} attempts: {}",
                            self.max_retries,
                            e
                        ));
                    }
                    log::warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(self.retry_delay * (attempt + 1)).await;
                    attempt += 1;
                    continue;
                }
            };

            // Back off on rate limits only; other statuses fail fast.
            if response.status() == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                let delay = self.retry_delay * 2u32.pow(attempt);
                log::warn!("Bybit API rate limited, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            if !response.status().is_success() {
                return Err(anyhow!(
                    "Bybit API request failed with status {}",
                    response.status()
                ));
            }

            let data: Value = response.json().await?;
            let ret_code = data.get("retCode").and_then(|c| c.as_i64()).unwrap_or(-1);
            if ret_code != 0 {
                let msg = data
                    .get("retMsg")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown error");
                return Err(anyhow!("Bybit API error: {}", msg));
            }

            return Ok(data);
        }
    }
}

// Bybit returns klines as [ts, open, high, low, close, volume, turnover]
// string arrays.
fn format_klines(klines: &[Value]) -> Vec<Value> {
    klines
        .iter()
        .filter_map(|kline| {
            let fields = kline.as_array()?;
            let timestamp: i64 = fields.first()?.as_str()?.parse().ok()?;
            let datetime = Utc
                .timestamp_millis_opt(timestamp)
                .single()
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default();
            Some(json!({
                "timestamp": timestamp,
                "datetime": datetime,
                "open_price": fields.get(1),
                "high_price": fields.get(2),
                "low_price": fields.get(3),
                "close_price": fields.get(4),
                "volume": fields.get(5),
                "turnover": fields.get(6),
            }))
        })
        .collect()
}
