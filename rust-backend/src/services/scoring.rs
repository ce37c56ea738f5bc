//! Composite ticker score and the recommendation tier derived from it.
//!
//! Each factor has its own point budget and cap; the sum is clamped to
//! `MAX_SCORE`. Note that `price_gain` and `momentum` both read
//! `price_change_percent`, so a single move is rewarded twice.

use serde::Serialize;
use std::cmp::Ordering;

use crate::services::models::TickerSnapshot;

pub const MAX_SCORE: f64 = 100.0;

/// Point tables for every factor. `Default` holds the production values.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// `(exclusive lower bound on % change, points)`, highest bound first.
    pub gain_steps: Vec<(f64, f64)>,
    /// `(exclusive lower bound on quote volume, points)`, highest bound first.
    pub volume_steps: Vec<(f64, f64)>,
    pub momentum_cap: f64,
    /// `(low, high, points)` open price intervals, checked in order.
    pub price_bands: Vec<(f64, f64, f64)>,
    pub volatility_bonus: f64,
    /// Bonus applies only to moves strictly inside `(0, volatility_max_move)`.
    pub volatility_max_move: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            gain_steps: vec![(20.0, 30.0), (15.0, 25.0), (10.0, 20.0), (5.0, 15.0), (0.0, 10.0)],
            volume_steps: vec![
                (50_000_000.0, 25.0),
                (20_000_000.0, 20.0),
                (10_000_000.0, 15.0),
                (5_000_000.0, 10.0),
                (1_000_000.0, 5.0),
            ],
            momentum_cap: 20.0,
            price_bands: vec![(0.001, 10.0, 15.0), (0.0001, 50.0, 10.0), (0.00001, 100.0, 5.0)],
            volatility_bonus: 10.0,
            volatility_max_move: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub price_gain: f64,
    pub volume: f64,
    pub momentum: f64,
    pub accessibility: f64,
    pub volatility_bonus: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    StrongBuy,
    ModerateBuy,
    Watch,
    Avoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action: Action,
    pub confidence: Level,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub risk: Level,
    pub timeframe: Option<&'static str>,
}

struct Tier {
    min_score: f64,
    action: Action,
    confidence: Level,
    target_mult: f64,
    stop_mult: f64,
    risk: Level,
    timeframe: &'static str,
}

const TIERS: [Tier; 3] = [
    Tier { min_score: 80.0, action: Action::StrongBuy,   confidence: Level::High,   target_mult: 1.25, stop_mult: 0.85, risk: Level::High,   timeframe: "1-6h" },
    Tier { min_score: 60.0, action: Action::ModerateBuy, confidence: Level::Medium, target_mult: 1.15, stop_mult: 0.90, risk: Level::Medium, timeframe: "6-24h" },
    Tier { min_score: 40.0, action: Action::Watch,       confidence: Level::Low,    target_mult: 1.10, stop_mult: 0.95, risk: Level::Medium, timeframe: "1-3d" },
];

fn staircase(value: f64, steps: &[(f64, f64)]) -> f64 {
    steps
        .iter()
        .find(|(bound, _)| value > *bound)
        .map(|(_, pts)| *pts)
        .unwrap_or(0.0)
}

fn band(price: f64, bands: &[(f64, f64, f64)]) -> f64 {
    bands
        .iter()
        .find(|(lo, hi, _)| price > *lo && price < *hi)
        .map(|(_, _, pts)| *pts)
        .unwrap_or(0.0)
}

pub fn score(t: &TickerSnapshot, cfg: &ScoringConfig) -> ScoreBreakdown {
    let pct = t.price_change_percent;

    let price_gain = staircase(pct, &cfg.gain_steps);
    let volume = staircase(t.quote_volume, &cfg.volume_steps);
    let momentum = pct.max(0.0).min(cfg.momentum_cap);
    let accessibility = band(t.last_price, &cfg.price_bands);
    let volatility_bonus = if pct > 0.0 && pct < cfg.volatility_max_move {
        cfg.volatility_bonus
    } else {
        0.0
    };

    let sum = price_gain + volume + momentum + accessibility + volatility_bonus;
    ScoreBreakdown {
        price_gain,
        volume,
        momentum,
        accessibility,
        volatility_bonus,
        total: sum.clamp(0.0, MAX_SCORE),
    }
}

pub fn recommend(total: f64, last_price: f64) -> Recommendation {
    match TIERS.iter().find(|tier| total >= tier.min_score) {
        Some(tier) => Recommendation {
            action: tier.action,
            confidence: tier.confidence,
            target_price: Some(last_price * tier.target_mult),
            stop_loss: Some(last_price * tier.stop_mult),
            risk: tier.risk,
            timeframe: Some(tier.timeframe),
        },
        None => Recommendation {
            action: Action::Avoid,
            confidence: Level::Low,
            target_price: None,
            stop_loss: None,
            risk: Level::High,
            timeframe: None,
        },
    }
}

/// Ranking order: total desc, then % change desc, then symbol asc.
pub fn rank_order(
    a: (&ScoreBreakdown, &TickerSnapshot),
    b: (&ScoreBreakdown, &TickerSnapshot),
) -> Ordering {
    b.0.total
        .total_cmp(&a.0.total)
        .then_with(|| b.1.price_change_percent.total_cmp(&a.1.price_change_percent))
        .then_with(|| a.1.symbol.cmp(&b.1.symbol))
}
