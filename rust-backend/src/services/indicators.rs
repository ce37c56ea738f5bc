//! Technical indicators over close/volume series.
//!
//! Every function here is total: short or degenerate input returns a
//! neutral value instead of an error, so callers never branch on failure.

use serde::Serialize;
use statrs::statistics::{Data as StatsData, Distribution};

use crate::services::models::Candle;

pub const RSI_PERIOD: usize = 14;
const NEUTRAL_RSI: f64 = 50.0;
const TREND_WINDOW: usize = 5;
const TREND_BAND_PCT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

/// Indicator readout attached to a ranked ticker when candles were fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSnapshot {
    pub rsi: f64,
    pub volatility: f64,
    pub momentum: f64,
    pub volume_spike: f64,
    pub trend: Trend,
    pub candles: usize,
}

/// Relative strength index seeded from the first `period + 1` samples.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return NEUTRAL_RSI;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period.min(prices.len() - 1) {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }

    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Sample standard deviation of simple returns, in percent.
pub fn volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let sd = StatsData::new(returns).std_dev().unwrap_or(0.0) * 100.0;
    if sd.is_finite() { sd } else { 0.0 }
}

/// Percent change from the first to the last sample.
pub fn momentum(prices: &[f64]) -> f64 {
    match (prices.first(), prices.last()) {
        (Some(&first), Some(&last)) if prices.len() >= 2 && first != 0.0 => {
            (last - first) / first * 100.0
        }
        _ => 0.0,
    }
}

/// `current / avg`, or 1.0 (no spike) when there is no usable average.
pub fn volume_spike_ratio(current: f64, avg: Option<f64>) -> f64 {
    match avg {
        Some(a) if a != 0.0 && a.is_finite() => current / a,
        _ => 1.0,
    }
}

/// Mean of the last five samples against the five before them.
pub fn trend(prices: &[f64]) -> Trend {
    if prices.len() < TREND_WINDOW * 2 {
        return Trend::Neutral;
    }

    let n = prices.len();
    let recent = mean(&prices[n - TREND_WINDOW..]);
    let prior = mean(&prices[n - 2 * TREND_WINDOW..n - TREND_WINDOW]);
    if prior == 0.0 {
        return Trend::Neutral;
    }

    let change_pct = (recent - prior) / prior * 100.0;
    if change_pct > TREND_BAND_PCT {
        Trend::Bullish
    } else if change_pct < -TREND_BAND_PCT {
        Trend::Bearish
    } else {
        Trend::Neutral
    }
}

pub fn analyze(candles: &[Candle]) -> TechnicalSnapshot {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    // last candle against the average of everything before it
    let (current_vol, avg_vol) = match candles.split_last() {
        Some((last, prior)) if !prior.is_empty() => {
            let vols: Vec<f64> = prior.iter().map(|c| c.volume).collect();
            (last.volume, Some(mean(&vols)))
        }
        Some((last, _)) => (last.volume, None),
        None => (0.0, None),
    };

    TechnicalSnapshot {
        rsi: rsi(&closes, RSI_PERIOD),
        volatility: volatility(&closes),
        momentum: momentum(&closes),
        volume_spike: volume_spike_ratio(current_vol, avg_vol),
        trend: trend(&closes),
        candles: candles.len(),
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}
