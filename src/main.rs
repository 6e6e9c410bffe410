use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use stock_watcher::commands::run_command_poller;
use stock_watcher::config::{AppConfig, LoggingConfig};
use stock_watcher::fetch::HttpFetcher;
use stock_watcher::plugins::notifiers::{LogNotifier, TelegramNotifier};
use stock_watcher::plugins::sources::decryptor_from_config;
use stock_watcher::plugins::{Notifier, PluginManager};
use stock_watcher::scheduler::run_forever;
use stock_watcher::targets::TargetCatalog;
use stock_watcher::Watcher;

#[derive(Debug, Parser)]
#[command(name = "stock-watcher", version, about = "Watches shop listings for restocks")]
struct Args {
    /// Directory holding default.toml and optional overrides
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Run a single scan cycle and exit
    #[arg(long)]
    once: bool,
}

fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "stock-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = AppConfig::from_dir(&args.config_dir)
        .with_context(|| format!("loading configuration from {}", args.config_dir))?;
    let _guard = init_tracing(&config.logging);

    info!("Starting stock watcher...");

    let fetcher = HttpFetcher::new(&config.scraper)?;
    let decryptor = decryptor_from_config(&config.decryption)?;
    let plugins = PluginManager::with_default_sources(fetcher, decryptor).await;

    let telegram = match TelegramNotifier::new(&config.telegram) {
        Ok(telegram) => Some(Arc::new(telegram)),
        Err(_) => {
            warn!("telegram credentials missing, messages go to the log only");
            None
        }
    };
    let notifier: Arc<dyn Notifier> = match &telegram {
        Some(telegram) => telegram.clone(),
        None => Arc::new(LogNotifier::new()),
    };

    let watcher = Arc::new(Watcher::new(&config, plugins, notifier.clone()));
    watcher.load().await;
    let catalog = TargetCatalog::new(&config.storage);

    if args.once {
        let targets = catalog.load().await.context("loading targets")?;
        let report = watcher.run_cycle(targets).await;
        info!(?report, "single cycle finished");
        watcher.shutdown().await;
        return Ok(());
    }

    let poller = telegram
        .is_some()
        .then(|| tokio::spawn(run_command_poller(watcher.clone(), notifier.clone())));

    let interval = Duration::from_secs(config.scheduler.check_interval);
    tokio::select! {
        _ = run_forever(watcher.clone(), catalog, interval) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down...");
        }
    }

    if let Some(poller) = poller {
        poller.abort();
    }
    watcher.shutdown().await;

    Ok(())
}
