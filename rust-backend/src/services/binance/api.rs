// src/services/binance/api.rs
//
// Wire shapes for the public Binance spot REST endpoints.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::services::models::Candle;
use crate::utils::errors::ApiError;

pub const TICKER_24H_PATH: &str = "/api/v3/ticker/24hr";
pub const KLINES_PATH: &str = "/api/v3/klines";

/// One `/api/v3/klines` row:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume, trades, ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct BinanceKline {
    pub close_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

impl BinanceKline {
    pub fn from_row(row: &Value) -> Option<Self> {
        let cols = row.as_array()?;
        let text = |i: usize| -> Option<String> {
            match cols.get(i)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };
        Some(Self {
            close_time: cols.get(6)?.as_i64()?,
            open: text(1)?,
            high: text(2)?,
            low: text(3)?,
            close: text(4)?,
            volume: text(5)?,
        })
    }

    fn parse_f64(s: &str) -> Option<f64> {
        s.parse::<f64>().ok().filter(|x| x.is_finite())
    }

    /// `None` when a price column is not a finite number or the
    /// timestamp is out of range.
    pub fn to_candle(&self) -> Option<Candle> {
        Some(Candle {
            ts: DateTime::<Utc>::from_timestamp_millis(self.close_time)?,
            open: Self::parse_f64(&self.open)?,
            high: Self::parse_f64(&self.high)?,
            low: Self::parse_f64(&self.low)?,
            close: Self::parse_f64(&self.close)?,
            volume: Self::parse_f64(&self.volume)?,
        })
    }
}

/// Decode a klines payload into a strictly time-ordered series.
/// Bad rows are skipped; a non-array body is an error.
pub fn parse_klines(body: &Value) -> Result<Vec<Candle>, ApiError> {
    let rows = body
        .as_array()
        .ok_or_else(|| ApiError::Other("klines payload is not an array".into()))?;

    let mut candles: Vec<Candle> = rows
        .iter()
        .filter_map(BinanceKline::from_row)
        .filter_map(|k| k.to_candle())
        .collect();

    candles.sort_by_key(|c| c.ts);
    candles.dedup_by_key(|c| c.ts);
    Ok(candles)
}
