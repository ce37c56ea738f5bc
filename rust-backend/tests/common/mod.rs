// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tickerscope_backend::services::{
    models::Candle,
    scanner::{ScanCache, Scanner, ScannerOptions},
    scoring::ScoringConfig,
    source::MarketSource,
};
use tickerscope_backend::utils::errors::ApiError;

/// In-memory upstream that counts calls and can be told to fail or stall.
#[derive(Default)]
pub struct FakeSource {
    pub tickers: Mutex<Value>,
    pub ticker_calls: AtomicUsize,
    pub candle_calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay_ms: AtomicUsize,
    /// Symbols whose candle fetch errors.
    pub broken_candles: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_tickers(tickers: Value) -> Arc<Self> {
        Arc::new(Self { tickers: Mutex::new(tickers), ..Default::default() })
    }

    pub fn calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }

    pub fn set_delay(&self, ms: usize) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketSource for FakeSource {
    async fn fetch_tickers(&self) -> Result<Value, ApiError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Other("connection reset by peer: secret-internal-detail".into()));
        }
        Ok(self.tickers.lock().unwrap().clone())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        _interval: &str,
        limit: u16,
    ) -> Result<Vec<Candle>, ApiError> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_candles.lock().unwrap().iter().any(|s| s == symbol) {
            return Err(ApiError::Status(500));
        }
        // steadily rising closes, volume spike on the last bar
        Ok((0..limit as i64)
            .map(|i| {
                let close = 1.0 + i as f64 * 0.05;
                Candle {
                    ts: Utc.timestamp_opt(i * 3600, 0).unwrap(),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: if i == limit as i64 - 1 { 500.0 } else { 100.0 },
                }
            })
            .collect())
    }
}

pub fn ticker(symbol: &str, price: &str, pct: &str, vol: &str) -> Value {
    json!({
        "symbol": symbol,
        "lastPrice": price,
        "priceChangePercent": pct,
        "quoteVolume": vol,
        "priceChange": "0",
        "count": 100
    })
}

pub fn market() -> Value {
    json!([
        ticker("FOOUSDT", "2.0", "22", "60000000"),
        ticker("BARUSDT", "0.5", "12", "8000000"),
        ticker("BAZUSDT", "30", "6", "25000000"),
        ticker("DIPUSDT", "4", "-8", "90000000"),
        ticker("ETHBTC", "0.05", "30", "99000000"),
        { "symbol": "NOVOLUSDT", "lastPrice": "1", "priceChangePercent": "40" },
        ticker("JUNKUSDT", "abc", "10", "5000000"),
    ])
}

pub fn scanner_with(source: Arc<FakeSource>, ttl_secs: i64, timeout: Duration) -> Scanner {
    Scanner::new(
        source,
        Arc::new(ScanCache::new(chrono::Duration::seconds(ttl_secs), 16)),
        ScoringConfig::default(),
        ScannerOptions { request_timeout: timeout, candle_concurrency: 2 },
    )
}

pub fn scanner(source: Arc<FakeSource>) -> Scanner {
    scanner_with(source, 60, Duration::from_secs(2))
}
