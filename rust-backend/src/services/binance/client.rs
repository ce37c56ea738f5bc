//! Production adapter that talks to Binance's public spot REST API.
//! Implements the `MarketSource` seam used by the scanner.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Instant;

use crate::services::binance::api::{parse_klines, KLINES_PATH, TICKER_24H_PATH};
use crate::services::models::Candle;
use crate::services::source::MarketSource;
use crate::utils::errors::ApiError;

#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent("tickerscope-backend")
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let started = Instant::now();
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            log::warn!("binance GET {path} → {status}");
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        log::debug!("binance GET {path} took {:?}", started.elapsed());
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketSource for BinanceClient {
    async fn fetch_tickers(&self) -> Result<Value, ApiError> {
        self.get_json(TICKER_24H_PATH, &[]).await
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candle>, ApiError> {
        let body = self
            .get_json(
                KLINES_PATH,
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        parse_klines(&body)
    }
}
