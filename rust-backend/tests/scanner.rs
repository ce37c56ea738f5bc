// tests/scanner.rs
mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{market, scanner, scanner_with, FakeSource};
use tickerscope_backend::services::scanner::QueryKind;
use tickerscope_backend::services::scoring::Action;
use tickerscope_backend::utils::errors::{ScanError, Stage};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn symbols(r: &tickerscope_backend::services::scanner::ScanResult) -> Vec<&str> {
    r.results.iter().map(|r| r.ticker.symbol.as_str()).collect()
}

#[tokio::test]
async fn gainers_are_filtered_scored_and_ranked() {
    let src = FakeSource::with_tickers(market());
    let s = scanner(src.clone());

    let r = s.query(QueryKind::TopGainers, t0()).await.unwrap();
    assert_eq!(symbols(&r), ["FOOUSDT", "BARUSDT", "BAZUSDT"]);
    assert!(!r.cached && !r.stale);
    assert_eq!(r.computed_at, t0());

    let top = &r.results[0];
    assert_eq!(top.score.total, 100.0);
    assert_eq!(top.recommendation.action, Action::StrongBuy);
    assert!(top.technicals.is_none());
}

#[tokio::test]
async fn kinds_use_their_own_profiles_and_keys() {
    let src = FakeSource::with_tickers(market());
    let s = scanner(src.clone());

    let vol = s.query(QueryKind::VolumeLeaders, t0()).await.unwrap();
    assert_eq!(symbols(&vol), ["FOOUSDT", "BAZUSDT", "DIPUSDT"]);

    s.query(QueryKind::TopGainers, t0()).await.unwrap();
    assert_eq!(src.calls(), 2);
}

#[tokio::test]
async fn repeat_within_ttl_is_served_from_cache() {
    let src = FakeSource::with_tickers(market());
    let s = scanner(src.clone());

    let first = s.query(QueryKind::TopGainers, t0()).await.unwrap();
    let second = s
        .query(QueryKind::TopGainers, t0() + ChronoDuration::seconds(59))
        .await
        .unwrap();

    assert!(second.cached);
    assert_eq!(second.computed_at, first.computed_at);
    assert_eq!(second.results, first.results);
    assert_eq!(src.calls(), 1);
}

#[tokio::test]
async fn expiry_recomputes_once() {
    let src = FakeSource::with_tickers(market());
    let s = scanner(src.clone());
    s.query(QueryKind::TopGainers, t0()).await.unwrap();

    // market moves while the entry ages out
    *src.tickers.lock().unwrap() = json!([common::ticker("NEWUSDT", "1", "3", "2000000")]);

    let later = t0() + ChronoDuration::seconds(61);
    let r = s.query(QueryKind::TopGainers, later).await.unwrap();
    assert!(!r.cached);
    assert_eq!(r.computed_at, later);
    assert_eq!(symbols(&r), ["NEWUSDT"]);

    let again = s.query(QueryKind::TopGainers, later).await.unwrap();
    assert!(again.cached);
    assert_eq!(src.calls(), 2);
}

#[tokio::test]
async fn upstream_failure_serves_stale_entry() {
    let src = FakeSource::with_tickers(market());
    let s = scanner(src.clone());
    let fresh = s.query(QueryKind::TopGainers, t0()).await.unwrap();

    src.set_failing(true);
    let later = t0() + ChronoDuration::seconds(300);
    let r = s.query(QueryKind::TopGainers, later).await.unwrap();
    assert!(r.stale && r.cached);
    assert_eq!(r.computed_at, t0());
    assert_eq!(r.results, fresh.results);

    // recovery replaces the stale entry
    src.set_failing(false);
    let r = s.query(QueryKind::TopGainers, later).await.unwrap();
    assert!(!r.stale && !r.cached);
    assert_eq!(r.computed_at, later);
}

#[tokio::test]
async fn upstream_failure_without_entry_surfaces() {
    let src = FakeSource::with_tickers(market());
    src.set_failing(true);
    let s = scanner(src.clone());

    let err = s.query(QueryKind::TopGainers, t0()).await.unwrap_err();
    assert_eq!(
        err,
        ScanError::UpstreamUnavailable { key: "scan:gainers".into(), stage: Stage::FetchTickers }
    );
    // no upstream text leaks into the error
    assert!(!err.to_string().contains("secret-internal-detail"));
    assert!(s.cache().is_empty());
}

#[tokio::test]
async fn non_array_payload_is_malformed_input() {
    let src = FakeSource::with_tickers(json!({ "code": -1003, "msg": "Too many requests" }));
    let s = scanner(src.clone());

    let err = s.query(QueryKind::TopGainers, t0()).await.unwrap_err();
    assert!(matches!(err, ScanError::MalformedInput { stage: Stage::Rank, .. }));
    assert!(s.cache().is_empty());
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let src = FakeSource::with_tickers(market());
    src.set_delay(300);
    let s = scanner_with(src.clone(), 60, Duration::from_millis(20));

    let err = s.query(QueryKind::TopGainers, t0()).await.unwrap_err();
    assert!(matches!(err, ScanError::Timeout { stage: Stage::FetchTickers, .. }));
}

#[tokio::test]
async fn timeout_with_previous_entry_serves_stale() {
    let src = FakeSource::with_tickers(market());
    let s = scanner_with(src.clone(), 60, Duration::from_millis(20));
    let fresh = s.query(QueryKind::TopGainers, t0()).await.unwrap();

    src.set_delay(300);
    let later = t0() + ChronoDuration::seconds(90);
    let r = s.query(QueryKind::TopGainers, later).await.unwrap();
    assert!(r.stale && r.cached);
    assert_eq!(r.computed_at, t0());
    assert_eq!(r.results, fresh.results);
    assert_eq!(src.calls(), 2);
}

#[tokio::test]
async fn concurrent_queries_share_one_fetch() {
    let src = FakeSource::with_tickers(market());
    src.set_delay(50);
    let s = scanner(src.clone());

    let queries = (0..12).map(|_| s.query(QueryKind::TopGainers, t0()));
    let results = futures::future::join_all(queries).await;

    assert_eq!(src.calls(), 1);
    let first = results[0].as_ref().unwrap();
    for r in &results {
        assert_eq!(r.as_ref().unwrap().results, first.results);
    }
}

#[tokio::test]
async fn breakouts_attach_technicals() {
    let src = FakeSource::with_tickers(market());
    src.broken_candles.lock().unwrap().push("BARUSDT".into());
    let s = scanner(src.clone());

    let r = s.query(QueryKind::Breakouts, t0()).await.unwrap();
    assert_eq!(symbols(&r), ["FOOUSDT", "BARUSDT", "BAZUSDT"]);
    assert_eq!(src.candle_calls.load(Ordering::SeqCst), 3);

    let foo = r.results[0].technicals.as_ref().unwrap();
    assert_eq!(foo.candles, 48);
    assert_eq!(foo.rsi, 100.0);
    assert!((foo.volume_spike - 5.0).abs() < 1e-9);

    // a failed candle fetch only costs that row its technicals
    assert!(r.results[1].technicals.is_none());
    assert!(r.results[2].technicals.is_some());

    // cached breakouts keep the technicals without refetching candles
    let again = s.query(QueryKind::Breakouts, t0()).await.unwrap();
    assert!(again.cached);
    assert_eq!(src.candle_calls.load(Ordering::SeqCst), 3);
}
