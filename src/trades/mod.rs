use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Long,
    Short,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub strategy: String,
    pub trade_type: String,
    pub instrument: String,
    pub position_type: PositionType,
    pub quantity: f64,
    pub open_date: String,
    pub open_price: f64,
    pub close_date: Option<String>,
    pub close_price: Option<f64>,
    pub profit_percent: Option<f64>,
    pub profit_amount: Option<f64>,
    pub status: TradeStatus,
}

#[derive(Debug, Clone)]
pub struct NewTrade {
    pub strategy: String,
    pub trade_type: String,
    pub instrument: String,
    pub position_type: PositionType,
    pub quantity: f64,
    pub open_date: String,
    pub open_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub profitable_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub avg_profit: f64,
    pub avg_profit_percent: f64,
    pub max_profit: f64,
    pub max_loss: f64,
}

/// SQLite-backed trade journal.
pub struct TradeStore {
    pool: SqlitePool,
}

impl TradeStore {
    pub async fn connect(url: &str) -> Result<Self> {
        // A single connection keeps in-memory databases coherent too.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                strategy TEXT NOT NULL,
                trade_type TEXT NOT NULL,
                instrument TEXT NOT NULL,
                position_type TEXT NOT NULL,
                quantity REAL NOT NULL,
                open_date TEXT NOT NULL,
                open_price REAL NOT NULL,
                close_date TEXT,
                close_price REAL,
                profit_percent REAL,
                profit_amount REAL,
                status TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        log::info!("Trade journal ready at {}", url);
        Ok(TradeStore { pool })
    }

    pub async fn add_trade(&self, trade: NewTrade) -> Result<i64> {
        validate_date(&trade.open_date)?;

        let result = sqlx::query(
            "INSERT INTO trades (
                strategy, trade_type, instrument, position_type,
                quantity, open_date, open_price, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trade.strategy)
        .bind(&trade.trade_type)
        .bind(&trade.instrument)
        .bind(trade.position_type.to_string())
        .bind(trade.quantity)
        .bind(&trade.open_date)
        .bind(trade.open_price)
        .bind(TradeStatus::Open.to_string())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        log::info!("Trade #{} opened for {}", id, trade.instrument);
        Ok(id)
    }

    pub async fn get_trade(&self, id: i64) -> Result<Option<Trade>> {
        let row = sqlx::query("SELECT * FROM trades WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| trade_from_row(&r)).transpose()
    }

    /// Closes an open trade, computing profit long-vs-short aware.
    pub async fn close_trade(&self, id: i64, close_date: &str, close_price: f64) -> Result<Trade> {
        validate_date(close_date)?;

        let trade = self
            .get_trade(id)
            .await?
            .ok_or_else(|| anyhow!("Trade {} not found", id))?;

        if trade.status == TradeStatus::Closed {
            return Err(anyhow!("Trade {} is already closed", id));
        }

        let (profit_percent, profit_amount) = match trade.position_type {
            PositionType::Long => (
                (close_price - trade.open_price) / trade.open_price * 100.0,
                (close_price - trade.open_price) * trade.quantity,
            ),
            PositionType::Short => (
                (trade.open_price - close_price) / trade.open_price * 100.0,
                (trade.open_price - close_price) * trade.quantity,
            ),
        };

        sqlx::query(
            "UPDATE trades
             SET close_date = ?, close_price = ?, profit_percent = ?,
                 profit_amount = ?, status = ?
             WHERE id = ?",
        )
        .bind(close_date)
        .bind(close_price)
        .bind(profit_percent)
        .bind(profit_amount)
        .bind(TradeStatus::Closed.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;

        log::info!("Trade #{} closed with P/L {:.2}", id, profit_amount);
        self.get_trade(id)
            .await?
            .ok_or_else(|| anyhow!("Trade {} disappeared during close", id))
    }

    pub async fn list_trades(
        &self,
        status: Option<TradeStatus>,
        instrument: Option<&str>,
        strategy: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Trade>> {
        let mut sql = String::from("SELECT * FROM trades");
        let mut clauses = Vec::new();
        if status.is_some() {
            clauses.push("status = ?");
        }
        if instrument.is_some() {
            clauses.push("instrument = ?");
        }
        if strategy.is_some() {
            clauses.push("strategy = ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC");
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.to_string());
        }
        if let Some(instrument) = instrument {
            query = query.bind(instrument.to_string());
        }
        if let Some(strategy) = strategy {
            query = query.bind(strategy.to_string());
        }
        if let Some(limit) = limit {
            query = query.bind(limit);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(trade_from_row).collect()
    }

    pub async fn statistics(&self, strategy: Option<&str>) -> Result<TradeStatistics> {
        let trades = self.list_trades(None, None, strategy, None).await?;

        let closed: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.status == TradeStatus::Closed)
            .collect();
        let profits: Vec<f64> = closed.iter().filter_map(|t| t.profit_amount).collect();

        let profitable = profits.iter().filter(|p| **p > 0.0).count();
        let losing = profits.iter().filter(|p| **p < 0.0).count();
        let decided = profitable + losing;

        let total_profit: f64 = profits.iter().sum();
        let avg_profit = if profits.is_empty() {
            0.0
        } else {
            total_profit / profits.len() as f64
        };
        let avg_profit_percent = {
            let percents: Vec<f64> = closed.iter().filter_map(|t| t.profit_percent).collect();
            if percents.is_empty() {
                0.0
            } else {
                percents.iter().sum::<f64>() / percents.len() as f64
            }
        };

        Ok(TradeStatistics {
            total_trades: trades.len(),
            open_trades: trades.len() - closed.len(),
            closed_trades: closed.len(),
            profitable_trades: profitable,
            losing_trades: losing,
            win_rate: if decided > 0 {
                round2(profitable as f64 / decided as f64 * 100.0)
            } else {
                0.0
            },
            total_profit: round2(total_profit),
            avg_profit: round2(avg_profit),
            avg_profit_percent: round2(avg_profit_percent),
            max_profit: round2(profits.iter().cloned().fold(0.0, f64::max)),
            max_loss: round2(profits.iter().cloned().fold(0.0, f64::min)),
        })
    }
}

fn validate_date(date: &str) -> Result<()> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date format: {}. Use YYYY-MM-DD.", date))?;
    Ok(())
}

fn trade_from_row(row: &SqliteRow) -> Result<Trade> {
    let position_type: String = row.try_get("position_type")?;
    let status: String = row.try_get("status")?;

    Ok(Trade {
        id: row.try_get("id")?,
        strategy: row.try_get("strategy")?,
        trade_type: row.try_get("trade_type")?,
        instrument: row.try_get("instrument")?,
        position_type: PositionType::from_str(&position_type)
            .map_err(|_| anyhow!("Unknown position type: {}", position_type))?,
        quantity: row.try_get("quantity")?,
        open_date: row.try_get("open_date")?,
        open_price: row.try_get("open_price")?,
        close_date: row.try_get("close_date")?,
        close_price: row.try_get("close_price")?,
        profit_percent: row.try_get("profit_percent")?,
        profit_amount: row.try_get("profit_amount")?,
        status: TradeStatus::from_str(&status)
            .map_err(|_| anyhow!("Unknown trade status: {}", status))?,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> TradeStore {
        TradeStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store")
    }

    fn sample_trade() -> NewTrade {
        NewTrade {
            strategy: "Momentum".to_string(),
            trade_type: "Stocks".to_string(),
            instrument: "AAPL".to_string(),
            position_type: PositionType::Long,
            quantity: 10.0,
            open_date: "2024-01-15".to_string(),
            open_price: 100.0,
        }
    }

    #[tokio::test]
    async fn add_and_fetch_trade() {
        let store = memory_store().await;
        let id = store.add_trade(sample_trade()).await.unwrap();

        let trade = store.get_trade(id).await.unwrap().unwrap();
        assert_eq!(trade.instrument, "AAPL");
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.position_type, PositionType::Long);
        assert!(trade.close_price.is_none());
    }

    #[tokio::test]
    async fn closing_long_trade_computes_profit() {
        let store = memory_store().await;
        let id = store.add_trade(sample_trade()).await.unwrap();

        let closed = store.close_trade(id, "2024-02-15", 110.0).await.unwrap();
        assert_eq!(closed.status, TradeStatus::Closed);
        assert_eq!(closed.profit_amount, Some(100.0));
        assert_eq!(closed.profit_percent, Some(10.0));
    }

    #[tokio::test]
    async fn closing_short_trade_inverts_profit() {
        let store = memory_store().await;
        let mut trade = sample_trade();
        trade.position_type = PositionType::Short;
        let id = store.add_trade(trade).await.unwrap();

        let closed = store.close_trade(id, "2024-02-15", 90.0).await.unwrap();
        assert_eq!(closed.profit_amount, Some(100.0));
        assert_eq!(closed.profit_percent, Some(10.0));
    }

    #[tokio::test]
    async fn closing_twice_is_an_error() {
        let store = memory_store().await;
        let id = store.add_trade(sample_trade()).await.unwrap();
        store.close_trade(id, "2024-02-15", 110.0).await.unwrap();

        let err = store.close_trade(id, "2024-02-16", 120.0).await.unwrap_err();
        assert!(err.to_string().contains("already closed"));
    }

    #[tokio::test]
    async fn invalid_dates_are_rejected() {
        let store = memory_store().await;
        let mut trade = sample_trade();
        trade.open_date = "15.01.2024".to_string();
        assert!(store.add_trade(trade).await.is_err());
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let store = memory_store().await;
        let first = store.add_trade(sample_trade()).await.unwrap();
        store.add_trade(sample_trade()).await.unwrap();
        store.close_trade(first, "2024-02-15", 105.0).await.unwrap();

        let open = store
            .list_trades(Some(TradeStatus::Open), None, None, None)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);

        let all = store.list_trades(None, None, None, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn statistics_cover_win_rate_and_totals() {
        let store = memory_store().await;
        let win = store.add_trade(sample_trade()).await.unwrap();
        let loss = store.add_trade(sample_trade()).await.unwrap();
        store.add_trade(sample_trade()).await.unwrap();

        store.close_trade(win, "2024-02-15", 110.0).await.unwrap();
        store.close_trade(loss, "2024-02-15", 95.0).await.unwrap();

        let stats = store.statistics(None).await.unwrap();
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.open_trades, 1);
        assert_eq!(stats.closed_trades, 2);
        assert_eq!(stats.profitable_trades, 1);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.win_rate, 50.0);
        assert_eq!(stats.total_profit, 50.0);
        assert_eq!(stats.max_profit, 100.0);
        assert_eq!(stats.max_loss, -50.0);
    }
}
