use anyhow::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use signal_fusion_engine::core::{logging, Config, HealthChecker};
use signal_fusion_engine::distribution::{Executor, HttpExecutor};
use signal_fusion_engine::monitoring::LogAuditSink;
use signal_fusion_engine::sources::{
    HttpPriceFeed, HttpSourceAdapter, PriceFeed, SourceBreaker, SourceRegistry,
};
use signal_fusion_engine::trading::SignalPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    logging::init_logging(&config.monitoring.log_level);

    tracing::info!("Signal fusion engine starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "{} source(s), {} executor(s), {} symbol(s)",
        config.sources.len(),
        config.executors.len(),
        config.orchestrator.symbols.len()
    );

    let client = Client::builder()
        .timeout(Duration::from_millis(config.orchestrator.cycle_deadline_ms))
        .build()?;

    // Explicit startup tables: sources, executors, price feed
    let mut registry = SourceRegistry::new();
    for spec in &config.sources {
        registry.register(Arc::new(HttpSourceAdapter::from_spec(spec, client.clone())));
    }

    let executors: Vec<Arc<dyn Executor>> = config
        .executors
        .iter()
        .map(|spec| Arc::new(HttpExecutor::from_spec(spec, client.clone())) as Arc<dyn Executor>)
        .collect();

    let price_feed = Arc::new(HttpPriceFeed::new(&config.price_feed_url, client.clone()));
    let breaker = Arc::new(SourceBreaker::new());

    // Initialize health checker
    let health_checker = Arc::new(HealthChecker::new());
    health_checker.update_component("executors", !executors.is_empty()).await;

    // Start health check endpoint
    let health_clone = health_checker.clone();
    let health_port = config.monitoring.health_port;
    tokio::spawn(async move { start_health_server(health_clone, health_port).await });
    tracing::info!("Health endpoint running on port {}", health_port);

    // Start the signal pipeline
    let pipeline = Arc::new(SignalPipeline::new(
        &config,
        Arc::new(registry),
        breaker.clone(),
        price_feed.clone(),
        executors,
        Arc::new(LogAuditSink),
    ));
    pipeline.start();

    // Keep running, refreshing health from the breaker registry
    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;

        let symbol = &config.orchestrator.symbols[0];
        let feed_healthy = price_feed.last_price(symbol).await.is_ok();
        health_checker.update_component("price_feed", feed_healthy).await;
        health_checker
            .set_disabled_sources(breaker.disabled_sources())
            .await;

        let status = health_checker.get_status().await;
        tracing::info!(
            "Engine status: {} (uptime: {}s, disabled sources: {})",
            status.status,
            status.uptime_seconds,
            status.disabled_sources.len()
        );
    }
}

async fn start_health_server(health_checker: Arc<HealthChecker>, port: u16) {
    use warp::Filter;

    let health = warp::path("health")
        .and(warp::any().map(move || health_checker.clone()))
        .and_then(|checker: Arc<HealthChecker>| async move {
            let status = checker.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    warp::serve(health).run(([0, 0, 0, 0], port)).await;
}
