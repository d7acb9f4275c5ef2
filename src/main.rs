use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stock_watcher::config::load_product_urls;
use stock_watcher::notifiers::NotifierSet;
use stock_watcher::session::ChromeSessionFactory;
use stock_watcher::sinks::{ConsoleTable, CsvLog, ResultSink};
use stock_watcher::{
    AppConfig, AvailabilityResolver, ConfigOverrides, CycleAggregator, CycleScheduler, ResolverTimings,
    ScheduleConfig, SessionPolicy,
};

#[derive(Debug, Parser)]
#[command(name = "stock-watcher")]
#[command(about = "Polls product pages and reports per delivery code availability")]
struct Cli {
    /// Extra configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File with one product URL per line
    #[arg(long)]
    urls: Option<PathBuf>,

    /// Delivery codes to check, comma separated
    #[arg(long, value_delimiter = ',')]
    codes: Option<Vec<String>>,

    /// Number of cycles to run
    #[arg(long, conflicts_with = "forever")]
    cycles: Option<u32>,

    /// Keep cycling until interrupted
    #[arg(long)]
    forever: bool,

    /// Seconds to wait between cycles
    #[arg(long)]
    delay: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// CSV file results are appended to
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Products checked in parallel, each with its own tab
    #[arg(long)]
    concurrency: Option<usize>,

    /// Also write logs to daily rotated files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url_file: self.urls.clone(),
            delivery_codes: self.codes.clone(),
            max_cycles: self.cycles,
            forever: self.forever,
            inter_cycle_delay_secs: self.delay,
            headed: self.headed,
            result_log_path: self.log_path.clone(),
            max_concurrent_products: self.concurrency,
        }
    }
}

fn init_tracing(verbose: bool, log_dir: Option<&PathBuf>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_directive = if verbose { "stock_watcher=debug" } else { "stock_watcher=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // stdout belongs to the results table
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "stock-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to initialize logging")?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose, cli.log_dir.as_ref())?;

    info!("Starting Stock Watcher...");

    let config = AppConfig::load(cli.config.as_deref(), &cli.overrides()).context("invalid configuration")?;
    let products = load_product_urls(&config.monitor.url_file)
        .with_context(|| format!("failed to load product URLs from {}", config.monitor.url_file.display()))?;

    let factory = {
        let browser = config.browser.clone();
        let selectors = config.selectors.clone();
        tokio::task::spawn_blocking(move || ChromeSessionFactory::new(&browser, selectors)).await??
    };

    let notifier = NotifierSet::from_config(&config.notifications);
    info!(notifiers = ?notifier.names(), "Notifications configured");

    let resolver = AvailabilityResolver::new(ResolverTimings::from_config(&config.monitor), Arc::new(notifier));
    let aggregator = CycleAggregator::new(
        Arc::new(factory),
        Arc::new(resolver),
        SessionPolicy {
            retry_attempts: config.monitor.session_retry_attempts,
            retry_delay: config.monitor.session_retry_delay(),
            max_concurrent_products: config.monitor.max_concurrent_products,
        },
    );

    let mut scheduler = CycleScheduler::new(ScheduleConfig::from_app_config(&config, products), aggregator);
    if config.output.console {
        scheduler = scheduler.with_sink(Arc::new(ConsoleTable::stdout()) as Arc<dyn ResultSink>);
    }
    scheduler = scheduler.with_sink(Arc::new(CsvLog::new(config.output.result_log_path.clone())));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = scheduler.run(shutdown_rx).await?;

    if summary.persistence_failures > 0 {
        anyhow::bail!(
            "{} result row(s) could not be written to {}",
            summary.persistence_failures,
            config.output.result_log_path.display()
        );
    }

    Ok(())
}
