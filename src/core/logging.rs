use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` wins when set; otherwise the configured level applies to the
/// engine and warp's request noise is kept down.
pub fn init_logging(log_level: &str) {
    let default_filter = format!("{},warp=warn,hyper=warn", log_level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();

    tracing::info!("Logging initialized at level: {}", log_level);
}
