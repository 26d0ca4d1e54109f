use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

use super::{sync_handler, ToolRegistry, ToolSpec};
use futures::future::BoxFuture;
use crate::market::BybitClient;
use crate::report;
use crate::sec::{self, SecClient};
use crate::trades::{NewTrade, PositionType, TradeStatus, TradeStore};

/// Shared collaborators handed to the tool handlers.
#[derive(Clone)]
pub struct ToolContext {
    pub sec: Arc<SecClient>,
    pub market: Arc<BybitClient>,
    pub trades: Arc<TradeStore>,
}

/// Wires the whole tool surface at startup. Domain failures come back as
/// `{"error": ...}` JSON; only malformed arguments and unknown tool
/// names fail the dispatch itself.
pub fn register_builtin_tools(registry: &mut ToolRegistry, ctx: ToolContext) {
    register_report_tools(registry);
    register_sec_tools(registry, &ctx);
    register_market_tools(registry, &ctx);
    register_trade_tools(registry, &ctx);
}

fn register_report_tools(registry: &mut ToolRegistry) {
    registry.register(ToolSpec::new(
        "extract_text_from_pdf",
        "Extract the full text of a downloaded report document",
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to the PDF or text file"}
            },
            "required": ["file_path"]
        }),
        sync_handler(|args| {
            let file_path = require_str(&args, "file_path")?;
            Ok(match report::extract_text(&file_path) {
                Ok(extracted) => serde_json::to_value(extracted)?,
                Err(e) => json!({"error": e.to_string(), "text": ""}),
            })
        }),
    ));

    registry.register(ToolSpec::new(
        "analyze_financial_report",
        "Analyze a financial report end to end and return structured data",
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to the downloaded report"}
            },
            "required": ["file_path"]
        }),
        sync_handler(|args| {
            let file_path = require_str(&args, "file_path")?;
            Ok(match report::analyze_report(&file_path) {
                Ok(analysis) => serde_json::to_value(analysis)?,
                Err(e) => json!({"error": e.to_string()}),
            })
        }),
    ));

    registry.register(ToolSpec::new(
        "extract_specific_section",
        "Locate one named section of a report and extract its facts",
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to the downloaded report"},
                "section_name": {
                    "type": "string",
                    "description": "Canonical section name (assets, liabilities, equity, revenue, income, cash_flow, balance_sheet, income_statement) or free text"
                }
            },
            "required": ["file_path", "section_name"]
        }),
        sync_handler(|args| {
            let file_path = require_str(&args, "file_path")?;
            let section_name = require_str(&args, "section_name")?;

            let text = match report::extract_text(&file_path) {
                Ok(extracted) => extracted.text,
                Err(e) => {
                    return Ok(json!({
                        "error": e.to_string(),
                        "section": section_name,
                        "content": "",
                    }))
                }
            };

            Ok(match report::locate_section(&text, &section_name) {
                Ok(Some(section)) => serde_json::to_value(section)?,
                Ok(None) => json!({
                    "error": format!("Section {} not found in the document", section_name),
                    "section": section_name,
                    "content": "",
                }),
                Err(e) => json!({
                    "error": e.to_string(),
                    "section": section_name,
                    "content": "",
                }),
            })
        }),
    ));

    registry.register(ToolSpec::new(
        "extract_related_keywords",
        "List search keywords related to a report section",
        json!({
            "type": "object",
            "properties": {
                "section_name": {"type": "string", "description": "Section name"}
            },
            "required": ["section_name"]
        }),
        sync_handler(|args| {
            let section_name = require_str(&args, "section_name")?;
            Ok(json!(report::related_keywords(&section_name)))
        }),
    ));

    registry.register(ToolSpec::new(
        "summarize_report",
        "Render a plain-text digest of an analysis result",
        json!({
            "type": "object",
            "properties": {
                "analysis": {"type": "object", "description": "Result of analyze_financial_report"}
            },
            "required": ["analysis"]
        }),
        sync_handler(|args| {
            let analysis_value = args
                .get("analysis")
                .cloned()
                .ok_or_else(|| anyhow!("Missing required argument: analysis"))?;

            if let Some(error) = analysis_value.get("error").and_then(|e| e.as_str()) {
                return Ok(json!({
                    "summary": format!("Ошибка анализа отчета: {}", error)
                }));
            }

            let analysis: report::ReportAnalysis = serde_json::from_value(analysis_value)?;
            Ok(json!({"summary": report::summarize_report(&analysis)}))
        }),
    ));
}

fn register_sec_tools(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let sec = ctx.sec.clone();
    registry.register(ToolSpec::new(
        "search_filings",
        "Search SEC filings for a ticker, optionally by form type and date range",
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock ticker, e.g. AAPL"},
                "form_type": {"type": "string", "description": "Form type, e.g. 10-K or 10-Q"},
                "start_date": {"type": "string", "description": "YYYY-MM-DD"},
                "end_date": {"type": "string", "description": "YYYY-MM-DD"},
                "limit": {"type": "integer", "description": "Maximum results, default 10"}
            },
            "required": ["ticker"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let sec = sec.clone();
            Box::pin(async move {
                let ticker = require_str(&args, "ticker")?;
                let form_type = optional_str(&args, "form_type");
                let start_date = optional_str(&args, "start_date");
                let end_date = optional_str(&args, "end_date");
                let limit = optional_u64(&args, "limit").unwrap_or(10) as usize;

                Ok(
                    match sec
                        .search_filings(
                            &ticker,
                            form_type.as_deref(),
                            start_date.as_deref(),
                            end_date.as_deref(),
                            limit,
                        )
                        .await
                    {
                        Ok(search) => {
                            let listing = sec::filing_list_summary(&search);
                            let mut value = serde_json::to_value(search)?;
                            value["listing"] = json!(listing);
                            value
                        }
                        Err(e) => json!({"error": e.to_string(), "ticker": ticker}),
                    },
                )
            })
        }),
    ));

    let sec = ctx.sec.clone();
    registry.register(ToolSpec::new(
        "search_filings_by_period",
        "Search SEC filings for a ticker within a year or quarter",
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock ticker"},
                "form_type": {"type": "string", "description": "Form type, e.g. 10-Q"},
                "year": {"type": "integer", "description": "Calendar year"},
                "quarter": {"type": "integer", "description": "Quarter 1-4"},
                "limit": {"type": "integer", "description": "Maximum results, default 10"}
            },
            "required": ["ticker"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let sec = sec.clone();
            Box::pin(async move {
                let ticker = require_str(&args, "ticker")?;
                let form_type = optional_str(&args, "form_type");
                let year = optional_i64(&args, "year").map(|y| y as i32);
                let quarter = optional_u64(&args, "quarter").map(|q| q as u32);
                let limit = optional_u64(&args, "limit").unwrap_or(10) as usize;

                let range = sec::period_date_range(year, quarter);
                let (start, end) = match &range {
                    Some((start, end)) => (Some(start.as_str()), Some(end.as_str())),
                    None => (None, None),
                };

                Ok(
                    match sec
                        .search_filings(&ticker, form_type.as_deref(), start, end, limit)
                        .await
                    {
                        Ok(search) => serde_json::to_value(search)?,
                        Err(e) => json!({"error": e.to_string(), "ticker": ticker}),
                    },
                )
            })
        }),
    ));

    let sec = ctx.sec.clone();
    registry.register(ToolSpec::new(
        "download_recent_filing_as_pdf",
        "Download the most recent filing of a form type as PDF",
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock ticker"},
                "form_type": {"type": "string", "description": "Form type, default 10-Q"}
            },
            "required": ["ticker"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let sec = sec.clone();
            Box::pin(async move {
                let ticker = require_str(&args, "ticker")?;
                let form_type =
                    optional_str(&args, "form_type").unwrap_or_else(|| "10-Q".to_string());

                Ok(
                    match sec.download_recent_filing_as_pdf(&ticker, &form_type).await {
                        Ok(path) => json!({
                            "file_path": path.to_string_lossy(),
                            "ticker": ticker,
                            "report_type": form_type,
                        }),
                        Err(e) => json!({"error": e.to_string(), "ticker": ticker}),
                    },
                )
            })
        }),
    ));

    let sec = ctx.sec.clone();
    registry.register(ToolSpec::new(
        "get_and_analyze_latest_report",
        "Download the latest 10-K or 10-Q for a ticker and analyze it in one step",
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Stock ticker"},
                "report_type": {"type": "string", "description": "10-K or 10-Q, default 10-Q"}
            },
            "required": ["ticker"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let sec = sec.clone();
            Box::pin(async move {
                let ticker = require_str(&args, "ticker")?;
                let requested =
                    optional_str(&args, "report_type").unwrap_or_else(|| "10-Q".to_string());
                let report_type = if requested == "10-K" || requested == "10-Q" {
                    requested
                } else {
                    "10-Q".to_string()
                };

                let path = match sec.download_recent_filing_as_pdf(&ticker, &report_type).await {
                    Ok(path) => path,
                    Err(e) => return Ok(json!({"error": e.to_string(), "analysis": {}})),
                };
                let file_path = path.to_string_lossy().to_string();

                Ok(match report::analyze_report(&file_path) {
                    Ok(analysis) => {
                        let summary = report::summarize_report(&analysis);
                        json!({
                            "result": format!(
                                "Successfully downloaded and analyzed {} report for {}",
                                report_type, ticker
                            ),
                            "ticker": ticker,
                            "report_type": report_type,
                            "file_path": file_path,
                            "company_name": analysis.company_name,
                            "report_type_detected": analysis.report_type.to_string(),
                            "period": analysis.period,
                            "metrics": analysis.metrics,
                            "recommendations": analysis.recommendations,
                            "summary": summary,
                        })
                    }
                    Err(e) => json!({
                        "error": e.to_string(),
                        "file_path": file_path,
                        "analysis": {},
                    }),
                })
            })
        }),
    ));
}

fn register_market_tools(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let market = ctx.market.clone();
    registry.register(ToolSpec::new(
        "get_crypto_price",
        "Current Bybit quote for a trading pair",
        json!({
            "type": "object",
            "properties": {
                "symbol": {"type": "string", "description": "Pair, e.g. BTCUSDT or btc/usdt"},
                "category": {"type": "string", "description": "spot, linear, inverse or option; default spot"}
            },
            "required": ["symbol"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let market = market.clone();
            Box::pin(async move {
                let symbol = require_str(&args, "symbol")?;
                let category =
                    optional_str(&args, "category").unwrap_or_else(|| "spot".to_string());

                Ok(match market.get_ticker(&symbol, &category).await {
                    Ok(quote) => quote,
                    Err(e) => json!({
                        "error": e.to_string(),
                        "symbol": symbol,
                        "category": category,
                    }),
                })
            })
        }),
    ));

    let market = ctx.market.clone();
    registry.register(ToolSpec::new(
        "get_crypto_history",
        "Historical Bybit candles for a trading pair",
        json!({
            "type": "object",
            "properties": {
                "symbol": {"type": "string", "description": "Pair, e.g. BTCUSDT"},
                "interval": {"type": "string", "description": "1, 5, 15, 60, 240, D, W or M"},
                "days": {"type": "integer", "description": "Days of history, default 7"},
                "category": {"type": "string", "description": "Instrument category, default spot"}
            },
            "required": ["symbol", "interval"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let market = market.clone();
            Box::pin(async move {
                let symbol = require_str(&args, "symbol")?;
                let interval = require_str(&args, "interval")?;
                let days = optional_i64(&args, "days").unwrap_or(7);
                let category =
                    optional_str(&args, "category").unwrap_or_else(|| "spot".to_string());

                Ok(
                    match market.get_klines(&symbol, &interval, days, &category).await {
                        Ok(history) => history,
                        Err(e) => json!({
                            "error": e.to_string(),
                            "symbol": symbol,
                            "interval": interval,
                            "category": category,
                        }),
                    },
                )
            })
        }),
    ));

    let market = ctx.market.clone();
    registry.register(ToolSpec::new(
        "get_crypto_symbols",
        "List available Bybit trading pairs in a category",
        json!({
            "type": "object",
            "properties": {
                "category": {"type": "string", "description": "Instrument category, default spot"},
                "limit": {"type": "integer", "description": "Maximum symbols, default 50"}
            }
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let market = market.clone();
            Box::pin(async move {
                let category =
                    optional_str(&args, "category").unwrap_or_else(|| "spot".to_string());
                let limit = optional_u64(&args, "limit").unwrap_or(50) as usize;

                Ok(match market.list_symbols(&category, limit).await {
                    Ok(symbols) => symbols,
                    Err(e) => json!({"error": e.to_string(), "category": category}),
                })
            })
        }),
    ));
}

fn register_trade_tools(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let trades = ctx.trades.clone();
    registry.register(ToolSpec::new(
        "add_trade",
        "Record a newly opened trade in the journal",
        json!({
            "type": "object",
            "properties": {
                "strategy": {"type": "string", "description": "Trading strategy name"},
                "trade_type": {"type": "string", "description": "Instrument class, e.g. Stocks"},
                "instrument": {"type": "string", "description": "Ticker or pair"},
                "position_type": {"type": "string", "description": "long or short"},
                "quantity": {"type": "number", "description": "Quantity opened"},
                "open_date": {"type": "string", "description": "YYYY-MM-DD"},
                "open_price": {"type": "number", "description": "Entry price"}
            },
            "required": ["strategy", "trade_type", "instrument", "position_type", "quantity", "open_date", "open_price"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let trades = trades.clone();
            Box::pin(async move {
                let position_type = require_str(&args, "position_type")?;
                let position_type = PositionType::from_str(&position_type.to_lowercase())
                    .map_err(|_| anyhow!("Invalid position type: use 'long' or 'short'"))?;

                let trade = NewTrade {
                    strategy: require_str(&args, "strategy")?,
                    trade_type: require_str(&args, "trade_type")?,
                    instrument: require_str(&args, "instrument")?,
                    position_type,
                    quantity: require_f64(&args, "quantity")?,
                    open_date: require_str(&args, "open_date")?,
                    open_price: require_f64(&args, "open_price")?,
                };

                Ok(match trades.add_trade(trade).await {
                    Ok(id) => json!({
                        "success": true,
                        "trade_id": id,
                        "message": format!("Trade #{} recorded", id),
                    }),
                    Err(e) => json!({"error": e.to_string()}),
                })
            })
        }),
    ));

    let trades = ctx.trades.clone();
    registry.register(ToolSpec::new(
        "close_trade",
        "Close an open trade and compute its profit or loss",
        json!({
            "type": "object",
            "properties": {
                "trade_id": {"type": "integer", "description": "Trade id"},
                "close_date": {"type": "string", "description": "YYYY-MM-DD"},
                "close_price": {"type": "number", "description": "Exit price"}
            },
            "required": ["trade_id", "close_date", "close_price"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let trades = trades.clone();
            Box::pin(async move {
                let trade_id = require_i64(&args, "trade_id")?;
                let close_date = require_str(&args, "close_date")?;
                let close_price = require_f64(&args, "close_price")?;

                Ok(
                    match trades.close_trade(trade_id, &close_date, close_price).await {
                        Ok(trade) => json!({"success": true, "trade": trade}),
                        Err(e) => json!({"error": e.to_string()}),
                    },
                )
            })
        }),
    ));

    let trades = ctx.trades.clone();
    registry.register(ToolSpec::new(
        "get_trade",
        "Fetch one trade by id",
        json!({
            "type": "object",
            "properties": {
                "trade_id": {"type": "integer", "description": "Trade id"}
            },
            "required": ["trade_id"]
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let trades = trades.clone();
            Box::pin(async move {
                let trade_id = require_i64(&args, "trade_id")?;
                Ok(match trades.get_trade(trade_id).await {
                    Ok(Some(trade)) => json!({"success": true, "trade": trade}),
                    Ok(None) => json!({"error": format!("Trade {} not found", trade_id)}),
                    Err(e) => json!({"error": e.to_string()}),
                })
            })
        }),
    ));

    let trades = ctx.trades.clone();
    registry.register(ToolSpec::new(
        "list_trades",
        "List journal trades with optional filters",
        json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "description": "open or closed"},
                "instrument": {"type": "string", "description": "Filter by instrument"},
                "strategy": {"type": "string", "description": "Filter by strategy"},
                "limit": {"type": "integer", "description": "Maximum trades returned"}
            }
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let trades = trades.clone();
            Box::pin(async move {
                let status = match optional_str(&args, "status") {
                    Some(s) => Some(
                        TradeStatus::from_str(&s.to_lowercase())
                            .map_err(|_| anyhow!("Invalid status: use 'open' or 'closed'"))?,
                    ),
                    None => None,
                };
                let instrument = optional_str(&args, "instrument");
                let strategy = optional_str(&args, "strategy");
                let limit = optional_i64(&args, "limit");

                Ok(
                    match trades
                        .list_trades(status, instrument.as_deref(), strategy.as_deref(), limit)
                        .await
                    {
                        Ok(list) => json!({
                            "success": true,
                            "trades_count": list.len(),
                            "trades": list,
                        }),
                        Err(e) => json!({"error": e.to_string()}),
                    },
                )
            })
        }),
    ));

    let trades = ctx.trades.clone();
    registry.register(ToolSpec::new(
        "get_trade_statistics",
        "Aggregate journal statistics: win rate, totals, extremes",
        json!({
            "type": "object",
            "properties": {
                "strategy": {"type": "string", "description": "Filter by strategy"}
            }
        }),
        Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
            let trades = trades.clone();
            Box::pin(async move {
                let strategy = optional_str(&args, "strategy");
                Ok(match trades.statistics(strategy.as_deref()).await {
                    Ok(stats) => json!({
                        "success": true,
                        "strategy": strategy.unwrap_or_else(|| "all".to_string()),
                        "statistics": stats,
                    }),
                    Err(e) => json!({"error": e.to_string()}),
                })
            })
        }),
    ));
}

fn require_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| anyhow!("Missing required argument: {}", key))
}

fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn require_f64(args: &Value, key: &str) -> Result<f64> {
    args.get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| anyhow!("Missing required argument: {}", key))
}

fn require_i64(args: &Value, key: &str) -> Result<i64> {
    args.get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing required argument: {}", key))
}

fn optional_i64(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(|v| v.as_i64())
}

fn optional_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AnalystConfig;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_config() -> AnalystConfig {
        AnalystConfig {
            sec_api_key: String::new(),
            database_url: "sqlite::memory:".to_string(),
            bybit_testnet: true,
            request_timeout: Duration::from_secs(5),
            max_retries: 1,
            retry_delay: Duration::from_millis(10),
            data_dir: PathBuf::from("downloaded_filings"),
        }
    }

    async fn test_registry() -> ToolRegistry {
        let config = test_config();
        let ctx = ToolContext {
            sec: Arc::new(SecClient::new(&config).unwrap()),
            market: Arc::new(BybitClient::new(&config).unwrap()),
            trades: Arc::new(TradeStore::connect(&config.database_url).await.unwrap()),
        };
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, ctx);
        registry
    }

    #[tokio::test]
    async fn registers_the_full_tool_surface() {
        let registry = test_registry().await;
        for name in [
            "extract_text_from_pdf",
            "analyze_financial_report",
            "extract_specific_section",
            "extract_related_keywords",
            "summarize_report",
            "search_filings",
            "get_crypto_price",
            "add_trade",
            "get_trade_statistics",
        ] {
            assert!(registry.get(name).is_some(), "missing tool {}", name);
        }
    }

    #[tokio::test]
    async fn analyze_on_missing_file_returns_error_object_only() {
        let registry = test_registry().await;
        let result = registry
            .dispatch(
                "analyze_financial_report",
                json!({"file_path": "/nonexistent/report.pdf"}),
            )
            .await
            .unwrap();

        assert!(result.get("error").is_some());
        assert!(result.get("metrics").is_none());
        assert!(result.get("sections_found").is_none());
    }

    #[tokio::test]
    async fn sec_tools_fail_cleanly_without_api_key() {
        let registry = test_registry().await;
        let result = registry
            .dispatch("search_filings", json!({"ticker": "AAPL"}))
            .await
            .unwrap();
        assert!(result["error"]
            .as_str()
            .unwrap()
            .contains("SEC_API_KEY is not configured"));
    }

    #[tokio::test]
    async fn related_keywords_round_trip_through_dispatch() {
        let registry = test_registry().await;
        let result = registry
            .dispatch("extract_related_keywords", json!({"section_name": "assets"}))
            .await
            .unwrap();
        let keywords: Vec<String> = serde_json::from_value(result).unwrap();
        assert!(keywords.contains(&"total assets".to_string()));
    }

    #[tokio::test]
    async fn trade_tools_cover_the_journal_lifecycle() {
        let registry = test_registry().await;

        let added = registry
            .dispatch(
                "add_trade",
                json!({
                    "strategy": "Momentum",
                    "trade_type": "Stocks",
                    "instrument": "AAPL",
                    "position_type": "long",
                    "quantity": 10.0,
                    "open_date": "2024-01-15",
                    "open_price": 100.0,
                }),
            )
            .await
            .unwrap();
        assert_eq!(added["success"], true);
        let id = added["trade_id"].as_i64().unwrap();

        let closed = registry
            .dispatch(
                "close_trade",
                json!({"trade_id": id, "close_date": "2024-02-15", "close_price": 110.0}),
            )
            .await
            .unwrap();
        assert_eq!(closed["trade"]["profit_amount"], 100.0);

        let stats = registry
            .dispatch("get_trade_statistics", json!({}))
            .await
            .unwrap();
        assert_eq!(stats["statistics"]["closed_trades"], 1);
    }
}
