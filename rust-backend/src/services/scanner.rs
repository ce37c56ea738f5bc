//! Top-N scanner
//! ──────────────────────────────────────────────────────────────────────────
//! * One `QueryKind` ↔ one cache key ↔ one named `ScanProfile`
//! * Miss path: fetch tickers → rank → (optional) candle enrichment
//! * Every upstream call runs under `request_timeout`
//! * Failed recompute falls back to the stale entry when there is one
//! ──────────────────────────────────────────────────────────────────────────

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::increment_counter;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::settings::Settings,
    services::{
        cache::{Abandoned, FreshnessCache, Lookup},
        indicators::{self, TechnicalSnapshot},
        pipeline::{self, ScanProfile, ScoredTicker},
        scoring::ScoringConfig,
        source::MarketSource,
    },
    utils::errors::{ApiError, ScanError, Stage},
};

pub type ScanCache = FreshnessCache<Vec<ScoredTicker>, ScanError>;

// A recompute that died mid-run is treated like an unreachable source, so
// the stale fallback still applies.
impl Abandoned for ScanError {
    fn abandoned(key: &str) -> Self {
        ScanError::UpstreamUnavailable { key: key.to_string(), stage: Stage::Rank }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryKind {
    #[serde(rename = "gainers")]
    TopGainers,
    #[serde(rename = "volume")]
    VolumeLeaders,
    #[serde(rename = "breakouts")]
    Breakouts,
}

/// Candle history pulled per ranked symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandleSpec {
    pub interval: &'static str,
    pub limit: u16,
}

impl QueryKind {
    pub const ALL: [QueryKind; 3] = [QueryKind::TopGainers, QueryKind::VolumeLeaders, QueryKind::Breakouts];

    pub fn slug(self) -> &'static str {
        match self {
            QueryKind::TopGainers    => "gainers",
            QueryKind::VolumeLeaders => "volume",
            QueryKind::Breakouts     => "breakouts",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == s)
    }

    pub fn cache_key(self) -> String {
        format!("scan:{}", self.slug())
    }

    pub fn profile(self) -> ScanProfile {
        match self {
            QueryKind::TopGainers => ScanProfile {
                quote_suffix: "USDT",
                min_quote_volume: 1_000_000.0,
                min_change_percent: 0.0,
                min_price: None,
                max_price: None,
                top_n: 10,
            },
            QueryKind::VolumeLeaders => ScanProfile {
                quote_suffix: "USDT",
                min_quote_volume: 10_000_000.0,
                min_change_percent: f64::NEG_INFINITY,
                min_price: None,
                max_price: None,
                top_n: 10,
            },
            QueryKind::Breakouts => ScanProfile {
                quote_suffix: "USDT",
                min_quote_volume: 5_000_000.0,
                min_change_percent: 5.0,
                min_price: Some(0.00001),
                max_price: Some(100.0),
                top_n: 5,
            },
        }
    }

    pub fn candles(self) -> Option<CandleSpec> {
        match self {
            QueryKind::Breakouts => Some(CandleSpec { interval: "1h", limit: 48 }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub kind: QueryKind,
    pub results: Vec<ScoredTicker>,
    pub cached: bool,
    /// Served from an expired entry because the recompute failed.
    pub stale: bool,
    pub computed_at: DateTime<Utc>,
}

impl ScanResult {
    fn from_lookup(kind: QueryKind, l: Lookup<Vec<ScoredTicker>>, stale: bool) -> Self {
        Self {
            kind,
            results: l.payload.as_ref().clone(),
            cached: l.hit || stale,
            stale,
            computed_at: l.computed_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScannerOptions {
    pub request_timeout: Duration,
    pub candle_concurrency: usize,
}

impl From<&Settings> for ScannerOptions {
    fn from(s: &Settings) -> Self {
        Self {
            request_timeout: Duration::from_secs(s.request_timeout_secs),
            candle_concurrency: s.candle_concurrency,
        }
    }
}

/// Everything a recompute needs, owned so the job can outlive the caller.
#[derive(Clone)]
struct Job {
    source: Arc<dyn MarketSource>,
    scoring: Arc<ScoringConfig>,
    opts: ScannerOptions,
}

#[derive(Clone)]
pub struct Scanner {
    job: Job,
    cache: Arc<ScanCache>,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketSource>,
        cache: Arc<ScanCache>,
        scoring: ScoringConfig,
        opts: ScannerOptions,
    ) -> Self {
        Self {
            job: Job { source, scoring: Arc::new(scoring), opts },
            cache,
        }
    }

    pub fn cache(&self) -> Arc<ScanCache> {
        Arc::clone(&self.cache)
    }

    pub async fn query(&self, kind: QueryKind, now: DateTime<Utc>) -> Result<ScanResult, ScanError> {
        let key = kind.cache_key();
        let job = self.job.clone();
        let job_key = key.clone();

        match self.cache.get_or_compute(&key, now, move || job.run(kind, job_key)).await {
            Ok(lookup) => {
                if lookup.hit {
                    increment_counter!("scanner_cache_hits_total", "kind" => kind.slug());
                } else {
                    increment_counter!("scanner_cache_misses_total", "kind" => kind.slug());
                    log::info!("scanner: {key} recomputed ({} rows)", lookup.payload.len());
                }
                Ok(ScanResult::from_lookup(kind, lookup, false))
            }
            Err(e) => {
                increment_counter!(
                    "scanner_upstream_errors_total",
                    "kind" => kind.slug(),
                    "stage" => e.stage().to_string()
                );
                match self.cache.get(&key, now) {
                    Some(prev) => {
                        increment_counter!("scanner_stale_served_total", "kind" => kind.slug());
                        log::warn!("scanner: {e}; serving entry from {}", prev.computed_at);
                        Ok(ScanResult::from_lookup(kind, prev, true))
                    }
                    None => {
                        log::error!("scanner: {e}; nothing cached");
                        Err(e)
                    }
                }
            }
        }
    }
}

impl Job {
    async fn run(self, kind: QueryKind, key: String) -> Result<Vec<ScoredTicker>, ScanError> {
        let limit = self.opts.request_timeout;
        let raw = guarded(&key, Stage::FetchTickers, limit, self.source.fetch_tickers()).await?;

        let mut ranked = pipeline::rank(&raw, &kind.profile(), &self.scoring).map_err(|_| {
            log::warn!("scanner: {key} ticker payload is not an array");
            ScanError::MalformedInput { key: key.clone(), stage: Stage::Rank }
        })?;

        if let Some(spec) = kind.candles() {
            self.enrich(&key, &mut ranked, spec).await;
        }
        Ok(ranked)
    }

    /// Attach indicator snapshots. A failed symbol just goes without one.
    async fn enrich(&self, key: &str, ranked: &mut [ScoredTicker], spec: CandleSpec) {
        let symbols: Vec<String> = ranked.iter().map(|r| r.ticker.symbol.clone()).collect();
        let limit = self.opts.request_timeout;

        // `buffered` keeps input order, so rows line up with `ranked`
        let snapshots: Vec<Option<TechnicalSnapshot>> = stream::iter(symbols)
            .map(|symbol| {
                let source = Arc::clone(&self.source);
                let key = key.to_string();
                async move {
                    let fetch = source.fetch_candles(&symbol, spec.interval, spec.limit);
                    match guarded(&key, Stage::FetchCandles, limit, fetch).await {
                        Ok(candles) => Some(indicators::analyze(&candles)),
                        Err(e) => {
                            log::debug!("scanner: no technicals for {symbol}: {e}");
                            None
                        }
                    }
                }
            })
            .buffered(self.opts.candle_concurrency.max(1))
            .collect()
            .await;

        for (row, technicals) in ranked.iter_mut().zip(snapshots) {
            row.technicals = technicals;
        }
    }
}

/// Bounded wait around one upstream call, mapped into the query taxonomy.
async fn guarded<T>(
    key: &str,
    stage: Stage,
    limit: Duration,
    fut: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ScanError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(ApiError::Json(e))) => {
            log::warn!("scanner: {key} {stage} returned undecodable body: {e}");
            Err(ScanError::MalformedInput { key: key.to_string(), stage })
        }
        Ok(Err(e)) => {
            log::warn!("scanner: {key} {stage} failed: {e}");
            Err(ScanError::UpstreamUnavailable { key: key.to_string(), stage })
        }
        Err(_) => {
            log::warn!("scanner: {key} {stage} timed out after {limit:?}");
            Err(ScanError::Timeout { key: key.to_string(), stage, secs: limit.as_secs() })
        }
    }
}
