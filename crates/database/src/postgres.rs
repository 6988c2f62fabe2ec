// In crates/database/src/postgres.rs

use analytics::Trade;
use app_config::types::DatabaseSettings;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveTime};
use core_types::{Bar, BarTime, IndicatorSnapshot, SignalKind, SymbolId};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::{
    BarStore, CheckpointStore, Error, IndicatorStore, Result, StoredCheckpoint, TradeStore,
};

/// A wrapper around the `sqlx` connection pool.
#[derive(Debug, Clone)]
pub struct Db(PgPool);

/// Establishes a connection pool to the PostgreSQL database and runs migrations.
pub async fn connect(settings: &DatabaseSettings) -> Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;

    Ok(Db(pool))
}

fn to_big(value: Decimal) -> Result<BigDecimal> {
    BigDecimal::from_str(&value.to_string()).map_err(|e| Error::Conversion(e.to_string()))
}

fn from_big(value: BigDecimal) -> Result<Decimal> {
    let text = value.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| Error::Conversion(format!("{text}: {e}")))
}

fn decimal_column(row: &PgRow, column: &str) -> Result<Decimal> {
    let value: BigDecimal = row.try_get(column).map_err(Error::OperationFailed)?;
    from_big(value)
}

fn optional_decimal_column(row: &PgRow, column: &str) -> Result<Option<Decimal>> {
    let value: Option<BigDecimal> = row.try_get(column).map_err(Error::OperationFailed)?;
    value.map(from_big).transpose()
}

fn bar_time_columns(row: &PgRow) -> Result<BarTime> {
    let date: NaiveDate = row.try_get("date").map_err(Error::OperationFailed)?;
    let time: NaiveTime = row.try_get("time").map_err(Error::OperationFailed)?;
    Ok(BarTime::new(date, time))
}

fn bar_from_row(row: &PgRow) -> Result<Bar> {
    let at = bar_time_columns(row)?;
    Ok(Bar {
        symbol: SymbolId(row.try_get("symbol_id").map_err(Error::OperationFailed)?),
        date: at.date,
        time: at.time,
        open: decimal_column(row, "open")?,
        high: decimal_column(row, "high")?,
        low: decimal_column(row, "low")?,
        close: decimal_column(row, "close")?,
        volume: decimal_column(row, "volume")?,
    })
}

fn parse_action(action: &str) -> Result<SignalKind> {
    match action {
        "BUY" => Ok(SignalKind::Buy),
        "SELL" => Ok(SignalKind::Sell),
        other => Err(Error::Conversion(format!("unknown trade action '{other}'"))),
    }
}

#[async_trait]
impl BarStore for Db {
    async fn symbols(&self) -> Result<Vec<SymbolId>> {
        let rows = sqlx::query("SELECT DISTINCT symbol_id FROM bars ORDER BY symbol_id")
            .fetch_all(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        rows.iter()
            .map(|row| {
                row.try_get::<i64, _>("symbol_id")
                    .map(SymbolId)
                    .map_err(Error::OperationFailed)
            })
            .collect()
    }

    async fn ingestion_mark(&self, symbol: SymbolId) -> Result<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) AS mark FROM bars WHERE symbol_id = $1")
            .bind(symbol.0)
            .fetch_one(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        row.try_get("mark").map_err(Error::OperationFailed)
    }

    async fn bars_after(
        &self,
        symbol: SymbolId,
        after: Option<BarTime>,
        through: i64,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        let rows = match after {
            Some(after) => {
                sqlx::query(
                    r#"
                    SELECT symbol_id, date, time, open, high, low, close, volume
                    FROM bars
                    WHERE symbol_id = $1 AND (date, time) > ($2, $3) AND seq <= $4
                    ORDER BY date ASC, time ASC
                    LIMIT $5
                    "#,
                )
                .bind(symbol.0)
                .bind(after.date)
                .bind(after.time)
                .bind(through)
                .bind(limit as i64)
                .fetch_all(&self.0)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT symbol_id, date, time, open, high, low, close, volume
                    FROM bars
                    WHERE symbol_id = $1 AND seq <= $2
                    ORDER BY date ASC, time ASC
                    LIMIT $3
                    "#,
                )
                .bind(symbol.0)
                .bind(through)
                .bind(limit as i64)
                .fetch_all(&self.0)
                .await
            }
        }
        .map_err(Error::OperationFailed)?;

        rows.iter().map(bar_from_row).collect()
    }

    async fn backfilled(
        &self,
        symbol: SymbolId,
        ingested_after: i64,
        through: i64,
        at_or_before: BarTime,
    ) -> Result<Vec<Bar>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol_id, date, time, open, high, low, close, volume
            FROM bars
            WHERE symbol_id = $1 AND seq > $2 AND seq <= $3 AND (date, time) <= ($4, $5)
            ORDER BY seq ASC
            "#,
        )
        .bind(symbol.0)
        .bind(ingested_after)
        .bind(through)
        .bind(at_or_before.date)
        .bind(at_or_before.time)
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        rows.iter().map(bar_from_row).collect()
    }
}

#[async_trait]
impl IndicatorStore for Db {
    async fn save_snapshot(&self, snapshot: &IndicatorSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indicators (symbol_id, date, time, ma_short, ma_long, rsi)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (symbol_id, date, time) DO UPDATE SET
                ma_short = EXCLUDED.ma_short,
                ma_long = EXCLUDED.ma_long,
                rsi = EXCLUDED.rsi
            "#,
        )
        .bind(snapshot.symbol.0)
        .bind(snapshot.as_of.date)
        .bind(snapshot.as_of.time)
        .bind(snapshot.ma_short.map(to_big).transpose()?)
        .bind(snapshot.ma_long.map(to_big).transpose()?)
        .bind(snapshot.rsi.map(to_big).transpose()?)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(())
    }

    async fn snapshot(&self, symbol: SymbolId, as_of: BarTime) -> Result<Option<IndicatorSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT date, time, ma_short, ma_long, rsi
            FROM indicators
            WHERE symbol_id = $1 AND date = $2 AND time = $3
            "#,
        )
        .bind(symbol.0)
        .bind(as_of.date)
        .bind(as_of.time)
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        row.map(|row| {
            Ok(IndicatorSnapshot {
                symbol,
                as_of: bar_time_columns(&row)?,
                ma_short: optional_decimal_column(&row, "ma_short")?,
                ma_long: optional_decimal_column(&row, "ma_long")?,
                rsi: optional_decimal_column(&row, "rsi")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl TradeStore for Db {
    async fn insert_trade(&self, trade: &Trade) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO trades (symbol_id, date, time, action, price, profit_loss)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (symbol_id, date, time, action) DO NOTHING
            "#,
        )
        .bind(trade.symbol.0)
        .bind(trade.at.date)
        .bind(trade.at.time)
        .bind(trade.kind.as_str())
        .bind(to_big(trade.price)?)
        .bind(trade.profit_loss.map(to_big).transpose()?)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(result.rows_affected() == 1)
    }

    async fn trades(&self, symbol: SymbolId) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            r#"
            SELECT date, time, action, price, profit_loss
            FROM trades
            WHERE symbol_id = $1
            ORDER BY date ASC, time ASC, id ASC
            "#,
        )
        .bind(symbol.0)
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        rows.iter()
            .map(|row| {
                let action: String = row.try_get("action").map_err(Error::OperationFailed)?;
                Ok(Trade {
                    symbol,
                    kind: parse_action(&action)?,
                    at: bar_time_columns(row)?,
                    price: decimal_column(row, "price")?,
                    profit_loss: optional_decimal_column(row, "profit_loss")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CheckpointStore for Db {
    async fn load_state(&self, symbol: SymbolId) -> Result<Option<StoredCheckpoint>> {
        let row = sqlx::query(
            "SELECT date, time, state_json, checksum FROM checkpoints WHERE symbol_id = $1",
        )
        .bind(symbol.0)
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        row.map(|row| {
            Ok(StoredCheckpoint {
                symbol,
                as_of: bar_time_columns(&row)?,
                payload: row.try_get("state_json").map_err(Error::OperationFailed)?,
                checksum: row.try_get("checksum").map_err(Error::OperationFailed)?,
            })
        })
        .transpose()
    }

    async fn save_state(&self, checkpoint: &StoredCheckpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (symbol_id, date, time, state_json, checksum, saved_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (symbol_id) DO UPDATE SET
                date = EXCLUDED.date,
                time = EXCLUDED.time,
                state_json = EXCLUDED.state_json,
                checksum = EXCLUDED.checksum,
                saved_at = EXCLUDED.saved_at
            "#,
        )
        .bind(checkpoint.symbol.0)
        .bind(checkpoint.as_of.date)
        .bind(checkpoint.as_of.time)
        .bind(&checkpoint.payload)
        .bind(&checkpoint.checksum)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(())
    }

    async fn delete_state(&self, symbol: SymbolId) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE symbol_id = $1")
            .bind(symbol.0)
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;
        tracing::debug!(symbol = %symbol, "Checkpoint deleted.");
        Ok(())
    }
}
