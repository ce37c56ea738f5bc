use actix_web::{middleware::Logger, web, App, HttpServer};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;

use tickerscope_backend::{
    config::settings::Settings,
    middleware::metrics::Metrics,
    routes::{health::health_scope, scanner::scanner_scope},
    services::{
        binance::client::BinanceClient,
        scanner::{ScanCache, Scanner, ScannerOptions},
        scoring::ScoringConfig,
        source::MarketSource,
    },
};

fn init_logging() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    log::info!("Starting tickerscope backend…");

    let settings = Settings::new().map_err(|e| anyhow::anyhow!("failed to load settings: {e}"))?;
    let port = settings.server_port;

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let source: Arc<dyn MarketSource> = Arc::new(BinanceClient::new(&settings.upstream_base_url)?);
    let cache = Arc::new(ScanCache::new(settings.cache_ttl(), settings.cache_max_entries));
    let scanner = Scanner::new(
        source,
        Arc::clone(&cache),
        ScoringConfig::default(),
        ScannerOptions::from(&settings),
    );

    // --- cache eviction sweep ----------------------------------------------
    if settings.cache_sweep_secs > 0 {
        let cache = Arc::clone(&cache);
        let every = std::time::Duration::from_secs(settings.cache_sweep_secs);
        let max_age = settings.cache_ttl() * 10;
        tokio::spawn(async move {
            let mut iv = tokio::time::interval(every);
            loop {
                iv.tick().await;
                let removed = cache.sweep(chrono::Utc::now(), max_age);
                if removed > 0 {
                    log::info!("cache sweep: dropped {removed} entries");
                }
            }
        });
    }

    log::info!(
        "listening on :{port} (ttl {}s, upstream {})",
        settings.cache_ttl_secs,
        settings.upstream_base_url
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Metrics)
            .wrap(Logger::default())
            .app_data(web::Data::new(scanner.clone()))
            .app_data(web::Data::new(prometheus.clone()))

            //scope
            .service(scanner_scope())
            .service(health_scope())
    })
        .bind(("0.0.0.0", port))?
        .run()
        .await?;

    Ok(())
}
