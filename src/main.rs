use ferrumcache::{Cache, CacheConfig, Sweeper};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("FerrumCache starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => match CacheConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config {}: {:#}", path, e);
                std::process::exit(1);
            }
        },
        None => CacheConfig::default(),
    };
    info!("Using {:?}", config);

    let cache = Arc::new(Cache::with_config(&config));
    let sweeper = Sweeper::from_config(Arc::clone(&cache), &config);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    sweeper.stop().await;

    match serde_json::to_string(&cache.stats()) {
        Ok(stats) => info!("Final stats: {}", stats),
        Err(e) => error!("Failed to encode stats: {}", e),
    }
}
