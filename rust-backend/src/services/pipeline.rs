// src/services/pipeline.rs
//
// Raw ticker array → validated snapshots → predicates → score → top-N.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::services::indicators::TechnicalSnapshot;
use crate::services::models::TickerSnapshot;
use crate::services::scoring::{self, Recommendation, ScoreBreakdown, ScoringConfig};

/// Filter thresholds for one kind of top-N query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProfile {
    pub quote_suffix: &'static str,
    pub min_quote_volume: f64,
    pub min_change_percent: f64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub top_n: usize,
}

impl ScanProfile {
    pub fn admits(&self, t: &TickerSnapshot) -> bool {
        t.quote_volume >= self.min_quote_volume
            && t.price_change_percent >= self.min_change_percent
            && self.min_price.map_or(true, |lo| t.last_price >= lo)
            && self.max_price.map_or(true, |hi| t.last_price <= hi)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredTicker {
    #[serde(flatten)]
    pub ticker: TickerSnapshot,
    pub score: ScoreBreakdown,
    pub recommendation: Recommendation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technicals: Option<TechnicalSnapshot>,
}

/// Why a single row was dropped. Logged, never returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotAnObject,
    MissingField(&'static str),
    BadSymbol,
    WrongQuote,
    BadNumber(&'static str),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotAnObject     => write!(f, "row is not an object"),
            RejectReason::MissingField(k) => write!(f, "missing field `{k}`"),
            RejectReason::BadSymbol       => write!(f, "symbol is not a string"),
            RejectReason::WrongQuote      => write!(f, "symbol has wrong quote currency"),
            RejectReason::BadNumber(k)    => write!(f, "field `{k}` is not a finite number"),
        }
    }
}

/// Raw payload was not a JSON array at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotACollection;

fn number(row: &Value, key: &'static str, required: bool) -> Result<f64, RejectReason> {
    let v = match row.get(key) {
        None | Some(Value::Null) if required => return Err(RejectReason::MissingField(key)),
        None | Some(Value::Null) => return Ok(0.0),
        Some(v) => v,
    };

    let parsed = match v {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    match parsed {
        Some(x) if x.is_finite() => Ok(x),
        _ => Err(RejectReason::BadNumber(key)),
    }
}

pub fn parse_ticker(row: &Value, quote_suffix: &str) -> Result<TickerSnapshot, RejectReason> {
    if !row.is_object() {
        return Err(RejectReason::NotAnObject);
    }

    let symbol = match row.get("symbol") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => return Err(RejectReason::MissingField("symbol")),
        Some(_) => return Err(RejectReason::BadSymbol),
    };
    if !symbol.ends_with(quote_suffix) || symbol.len() == quote_suffix.len() {
        return Err(RejectReason::WrongQuote);
    }

    Ok(TickerSnapshot {
        last_price: number(row, "lastPrice", true)?,
        price_change_percent: number(row, "priceChangePercent", true)?,
        quote_volume: number(row, "quoteVolume", true)?,
        price_change: number(row, "priceChange", false)?,
        trade_count: number(row, "count", false)?,
        symbol,
    })
}

/// Validate, filter, score and truncate. Only a non-array payload aborts.
pub fn rank(
    raw: &Value,
    profile: &ScanProfile,
    cfg: &ScoringConfig,
) -> Result<Vec<ScoredTicker>, NotACollection> {
    let rows = raw.as_array().ok_or(NotACollection)?;

    let mut rejected = 0usize;
    let mut scored: Vec<ScoredTicker> = rows
        .iter()
        .filter_map(|row| match parse_ticker(row, profile.quote_suffix) {
            Ok(t) => Some(t),
            Err(reason) => {
                rejected += 1;
                log::trace!("pipeline: dropped row ({reason})");
                None
            }
        })
        .filter(|t| profile.admits(t))
        .map(|ticker| {
            let score = scoring::score(&ticker, cfg);
            let recommendation = scoring::recommend(score.total, ticker.last_price);
            ScoredTicker { ticker, score, recommendation, technicals: None }
        })
        .collect();

    log::debug!(
        "pipeline: {} rows, {} rejected, {} admitted",
        rows.len(),
        rejected,
        scored.len()
    );

    sort_ranked(&mut scored);
    scored.truncate(profile.top_n);
    Ok(scored)
}

pub fn sort_ranked(rows: &mut [ScoredTicker]) {
    rows.sort_by(|a, b| scoring::rank_order((&a.score, &a.ticker), (&b.score, &b.ticker)));
}
