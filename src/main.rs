//! Hedge Engine - Main Entry Point
//!
//! Runs the hedge cycle against paper venues built from configuration.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use hedge_engine::config::{AppConfig, ExposureSourceConfig};
use hedge_engine::exchange::{DeltaFeedExposure, PaperVenue, VenueRegistry};
use hedge_engine::strategy::{HedgeEngine, HedgeVariant, TargetOutcome, TickOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Hedge Engine CLI
#[derive(Parser)]
#[command(name = "hedge-engine")]
#[command(version, about = "Keep tracked exposure hedged on designated markets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hedge cycle against the configured paper venues
    Run {
        /// Config file name, without extension
        #[arg(short, long, default_value = "hedge")]
        config: String,

        /// Stop after this many scheduler ticks
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Seconds between scheduler ticks
        #[arg(long, default_value = "1")]
        tick_secs: u64,
    },

    /// Load and validate the configuration, then exit
    Validate {
        /// Config file name, without extension
        #[arg(short, long, default_value = "hedge")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Commands::Run {
            config,
            ticks,
            tick_secs,
        } => run(&config, ticks, tick_secs).await,
        Commands::Validate { config } => {
            let config = load_config(&config)?;
            log_config(&config);
            info!("Configuration is valid");
            Ok(())
        }
    }
}

fn load_config(path: &str) -> Result<AppConfig> {
    let config = AppConfig::load(path)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Paper venues from the `paper` section.
fn build_venues(config: &AppConfig) -> VenueRegistry {
    let mut venues = VenueRegistry::new();
    for venue in &config.paper.venues {
        info!(
            venue = %venue.name,
            derivative = venue.derivative,
            quote_balance = %venue.quote_balance,
            "Registering paper venue"
        );
        venues.register(Arc::new(PaperVenue::from_config(venue)));
    }
    venues
}

fn build_variant(config: &AppConfig) -> HedgeVariant {
    match &config.exposure {
        ExposureSourceConfig::Standard => HedgeVariant::Standard,
        ExposureSourceConfig::ExternalPosition {
            deposit_balance,
            deltas,
        } => {
            info!(%deposit_balance, pairs = deltas.len(), "Using external position exposure");
            HedgeVariant::ExternalPosition(Arc::new(DeltaFeedExposure::from_static(
                *deposit_balance,
                deltas,
            )))
        }
    }
}

async fn run(path: &str, max_ticks: Option<u64>, tick_secs: u64) -> Result<()> {
    info!(
        "Hedge Engine v{} - paper trading",
        env!("CARGO_PKG_VERSION")
    );

    let config = load_config(path)?;
    log_config(&config);

    let venues = build_venues(&config);
    let mut engine = HedgeEngine::new(
        config.hedge.clone(),
        &config.markets,
        venues.clone(),
        build_variant(&config),
        info_span!("hedge", mode = ?config.hedge.mode),
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let status_interval = i64::try_from(config.hedge.status_report_interval_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX);
    let mut last_status = None;
    let mut started = false;
    let mut ticks = 0u64;
    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs.max(1)));

    while !shutdown.load(Ordering::SeqCst) {
        interval.tick().await;
        if max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        ticks += 1;

        if !venues.all_ready() {
            debug!("Venues not ready, skipping tick");
            continue;
        }

        let now = Utc::now();
        if !started {
            engine.start(now).await;
            started = true;
        }

        match engine.tick(now).await {
            TickOutcome::NotDue => {}
            TickOutcome::OrdersPending { active, cancelled } => {
                info!(active, cancelled, "Waiting for active orders");
            }
            TickOutcome::Evaluated(reports) => {
                for report in reports {
                    match report.outcome {
                        TargetOutcome::Placed(orders) => {
                            let failed = orders.iter().filter(|o| o.order_id.is_none()).count();
                            info!(pair = %report.target, placed = orders.len() - failed, failed, "Hedge orders placed");
                        }
                        TargetOutcome::Failed(reason) => {
                            warn!(pair = %report.target, %reason, "Hedge target failed");
                        }
                        TargetOutcome::NoHedge | TargetOutcome::NoCandidates => {}
                    }
                }
            }
        }

        let report_due = last_status.map_or(true, |last| now - last >= status_interval);
        if report_due {
            info!(status = %engine.status().to_json(), "Status");
            last_status = Some(now);
        }
    }

    info!(ticks, "Hedge Engine shutdown complete");
    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "hedge-engine.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("hedge_engine=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &AppConfig) {
    let hedge = &config.hedge;
    info!("Configuration:");
    info!("   Mode: {:?}", hedge.mode);
    info!("   Hedge Ratio: {}", hedge.hedge_ratio);
    info!("   Slippage: {}", hedge.slippage);
    info!("   Leverage: {}x ({})", hedge.leverage, hedge.position_mode);
    info!("   Min Trade Size: {}", hedge.min_trade_size);
    info!(
        "   Hedge Interval: {}s, Max Order Age: {}s",
        hedge.hedge_interval_secs, hedge.max_order_age_secs
    );
    for pair in config.markets.hedge_pairs() {
        info!("   Hedge: {}", pair);
    }
    for pair in config.markets.tracked_pairs() {
        info!("   Tracked: {}", pair);
    }
}
