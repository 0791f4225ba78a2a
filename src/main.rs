use anyhow::{Context, Result};
use candlewatch::api::BinanceClient;
use candlewatch::config::Settings;
use candlewatch::control::ControlPlane;
use candlewatch::hub::session::SessionConfig;
use candlewatch::hub::{Hub, SubscriberServer};
use candlewatch::indicators::TechnicalIndicators;
use candlewatch::market::{CandleStore, FeedConfig, FeedConnector, MarketState};
use candlewatch::models::MAX_CANDLES;
use candlewatch::{AlertEngine, EvaluationCycle, PositionCalculator};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Live BTC/USDT price, candle and alert broadcaster
#[derive(Debug, Parser)]
#[command(name = "candlewatch", version)]
struct Cli {
    /// Path to a TOML settings file (default: ./candlewatch.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subscriber server address, overrides server.bind_addr
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        settings.server.bind_addr = bind;
    }
    setup_logging(&settings.logging.default_filter);

    tracing::info!("🚀 candlewatch starting");
    tracing::info!(
        symbol = %settings.feed.symbol,
        stream = %settings.feed.stream_base_url,
        bind = %settings.server.bind_addr,
        "Configuration loaded"
    );

    // Services, constructed once and shared by handle
    let hub = Hub::new(settings.server.queue_capacity);
    let market = MarketState::new();
    let candles = CandleStore::new(MAX_CANDLES);
    let alerts = Arc::new(AlertEngine::new(hub.clone()));
    let position = Arc::new(PositionCalculator::new());
    let control = ControlPlane::new(position.clone(), alerts.clone());

    control
        .apply_startup(&settings.startup)
        .context("invalid startup entry")?;

    let client = BinanceClient::new(&settings.feed.rest_base_url, &settings.feed.symbol);
    let stream_url = client.agg_trade_stream_url(&settings.feed.stream_base_url);
    let feed = FeedConnector::new(
        FeedConfig {
            stream_url,
            reconnect_delay: settings.feed.reconnect_delay(),
            history_limit: settings.feed.history_limit,
        },
        client,
        market.clone(),
        candles.clone(),
        hub.clone(),
    );

    tracing::info!("📥 Hydrating candle history...");
    for (tf, count) in feed.hydrate().await {
        tracing::info!("  {}: {} candles", tf, count);
    }

    let listener = SubscriberServer::bind(settings.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_addr))?;

    let cycle = EvaluationCycle::new(
        candles,
        market,
        Arc::new(TechnicalIndicators),
        alerts,
        position,
        hub.clone(),
        settings.evaluation.interval(),
    );
    let server = SubscriberServer::new(
        hub,
        SessionConfig {
            keepalive: settings.server.keepalive(),
            drain_grace: settings.server.shutdown_grace(),
        },
        settings.server.shutdown_grace(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let feed_task = tokio::spawn(feed.run(shutdown_rx.clone()));
    let cycle_task = tokio::spawn(cycle.run(shutdown_rx.clone()));
    let server_task = tokio::spawn(server.run(listener, shutdown_rx));

    tracing::info!("✅ Feed, evaluation cycle and subscriber server running");
    tracing::info!("Press Ctrl+C to stop...");

    shutdown_signal().await;
    tracing::info!("⚠️  Shutdown requested, stopping tasks...");
    shutdown_tx.send_replace(true);

    for (name, task) in [
        ("feed", feed_task),
        ("evaluation", cycle_task),
        ("server", server_task),
    ] {
        if let Err(e) = task.await {
            tracing::error!("{} task failed: {}", name, e);
        }
    }

    tracing::info!("👋 candlewatch stopped");
    Ok(())
}

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
