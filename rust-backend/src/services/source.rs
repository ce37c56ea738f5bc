// src/services/source.rs

use async_trait::async_trait;
use serde_json::Value;

use crate::services::models::Candle;
use crate::utils::errors::ApiError;

/// Upstream market data. Thin seam so the scanner can run against fakes.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Raw 24h ticker payload, untouched; the pipeline validates it.
    async fn fetch_tickers(&self) -> Result<Value, ApiError>;

    /// Time-ordered candles, oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candle>, ApiError>;
}
