//! pricewatch - price change monitor
//!
//! Polls several price providers, keeps a short per-coin history and sends
//! an alert when a coin moves past the configured threshold.

mod config;

use clap::Parser;
use config::{AppConfig, ConfigError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pricewatch_alerts::{AlertSink, LogNotifier, TelegramNotifier};
use pricewatch_core::Provider;
use pricewatch_engine::{Monitor, MonitorError};
use pricewatch_feeds::{
    CoinGeckoAdapter, CoinMarketCapAdapter, CoinPaprikaAdapter, CryptoCompareAdapter,
    FetchOrchestrator, IdentifierRegistry, MessariAdapter, PriceAdapter,
};

/// pricewatch CLI
#[derive(Parser, Debug)]
#[command(name = "pricewatch")]
#[command(about = "Multi-provider crypto price change monitor", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "pricewatch.json")]
    config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Alert threshold as a fraction (0.05 = 5%)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Lookback window in samples
    #[arg(short, long)]
    window_size: Option<usize>,

    /// Seconds between cycles
    #[arg(short, long)]
    interval: Option<u64>,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

fn init_logging(level: &str) {
    let level = match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

fn load_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::load(&args.config)?;
    config.apply_env();

    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(window_size) = args.window_size {
        config.window_size = window_size;
    }
    if let Some(interval) = args.interval {
        config.poll_interval_seconds = interval;
    }

    config.validate()?;
    Ok(config)
}

/// One adapter per enabled provider, in configured order.
fn build_adapters(
    config: &AppConfig,
    registry: &Arc<IdentifierRegistry>,
    client: &reqwest::Client,
) -> Vec<Arc<dyn PriceAdapter>> {
    config
        .providers
        .iter()
        .map(|&provider| -> Arc<dyn PriceAdapter> {
            let registry = Arc::clone(registry);
            let client = client.clone();
            let api_key = config.api_key(provider);
            match provider {
                Provider::CoinGecko => Arc::new(CoinGeckoAdapter::new(client, registry, api_key)),
                Provider::CoinMarketCap => {
                    Arc::new(CoinMarketCapAdapter::new(client, registry, api_key))
                }
                Provider::CryptoCompare => {
                    Arc::new(CryptoCompareAdapter::new(client, registry, api_key))
                }
                Provider::Messari => Arc::new(
                    MessariAdapter::new(client, registry, api_key)
                        .with_deadline(config.adapter_timeout().mul_f64(0.75)),
                ),
                Provider::CoinPaprika => Arc::new(CoinPaprikaAdapter::new(client, registry)),
            }
        })
        .collect()
}

fn build_notifier(config: &AppConfig, client: &reqwest::Client) -> Arc<dyn AlertSink> {
    if config.telegram.is_complete() {
        info!(chat = config.telegram.chat_id_hint(), "Telegram alerts enabled");
        Arc::new(TelegramNotifier::new(config.telegram.clone(), client.clone()))
    } else {
        warn!("Telegram credentials not set, alerts will only be logged");
        Arc::new(LogNotifier)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = load_config(&args)?;
    info!(
        threshold = config.threshold,
        window_size = config.window_size,
        interval_secs = config.poll_interval_seconds,
        providers = config.providers.len(),
        "Configuration loaded"
    );

    let registry = Arc::new(
        IdentifierRegistry::load(&config.mapping_path, &config.providers)
            .map_err(ConfigError::from)?,
    );
    let coins = config
        .coins
        .clone()
        .unwrap_or_else(|| registry.coin_keys());
    info!(coins = coins.len(), "Coin universe resolved");

    let client = reqwest::Client::builder()
        .user_agent(concat!("pricewatch/", env!("CARGO_PKG_VERSION")))
        .timeout(config.adapter_timeout())
        .build()?;

    let orchestrator = FetchOrchestrator::new(
        build_adapters(&config, &registry, &client),
        config.adapter_timeout(),
    );
    let notifier = build_notifier(&config, &client);
    let monitor = Monitor::new(config.monitor_config(coins), orchestrator, notifier)?;

    if args.once {
        let report = monitor.run_cycle().await?;
        info!(
            polled = report.polled,
            priced = report.priced,
            alerts = report.alerts,
            delivered = report.delivered,
            failed = report.failed_notifications,
            "Single cycle complete"
        );
        return Ok(());
    }

    monitor.run(config.poll_interval(), shutdown_signal()).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level);

    info!("pricewatch v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args).await {
        error!(error = %e, "pricewatch stopped");
        std::process::exit(1);
    }
}
