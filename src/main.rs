use std::{error::Error, sync::Arc, time::Duration};

use clap::Parser;
use jiff::Timestamp;
use logscope::{
    api,
    cache::LogCache,
    cli::{Cli, CliCommands, DeviceRangeArgs, FollowArgs, SeriesArgs},
    config::LogscopeConfig,
    source::HttpSource,
    MergeOutcome,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, span, warn, Instrument, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing()?;

    let cfg = LogscopeConfig::load(&cli.config)?;
    let source = HttpSource::new(&cfg.remote)?;
    let cache = Arc::new(LogCache::new(Arc::new(source), cfg.diagnostics_capacity));
    tokio::spawn(report_diagnostics(cache.clone()).instrument(span!(Level::INFO, "Diagnostics")));

    match cli.command {
        CliCommands::Serve => serve(cfg, cache).await,
        CliCommands::Timeline(args) => {
            let (start, end) = load(&cache, &args).await?;
            print_json(&cache.timeline(&args.serial, start, end)?)
        }
        CliCommands::Readings(args) => {
            let (start, end) = load(&cache, &args).await?;
            print_json(&cache.distinct_readings(&args.serial, start, end))
        }
        CliCommands::Series(SeriesArgs {
            serial,
            readings,
            range,
        }) => {
            let args = DeviceRangeArgs { serial, range };
            let (start, end) = load(&cache, &args).await?;
            print_json(&cache.multi_reading_series(&args.serial, &readings, start, end))
        }
        CliCommands::Follow(args) => follow(&cache, args).await,
    }
}

fn init_tracing() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn load(cache: &LogCache, args: &DeviceRangeArgs) -> Result<(i64, i64), Box<dyn Error>> {
    let (start, end) = args.range.resolve(Timestamp::now());
    cache.reload(&args.serial, start, end).await?;
    Ok((start, end))
}

async fn serve(cfg: LogscopeConfig, cache: Arc<LogCache>) -> Result<(), Box<dyn Error>> {
    let now = Timestamp::now();
    let mut ranges = Vec::with_capacity(cfg.preload.len());
    for p in &cfg.preload {
        let start = now.checked_sub(p.since()?)?;
        ranges.push((p.serial_number.clone(), start.as_millisecond()));
    }

    for (serial, res) in cache.preload(&ranges, now.as_millisecond()).await {
        match res {
            Ok(outcome) => info!(serial = %serial, ?outcome, "preloaded"),
            Err(e) => warn!(serial = %serial, "preload failed: {e}"),
        }
    }

    api::serve(&cfg.listen, cache).await
}

async fn follow(cache: &LogCache, args: FollowArgs) -> Result<(), Box<dyn Error>> {
    let start = Timestamp::now().checked_sub(args.since)?.as_millisecond();
    let mut interval = tokio::time::interval(Duration::from_secs(args.every.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // failures are already on the diagnostics channel; retry next tick
                if let Ok(MergeOutcome::Merged(report)) =
                    cache.ensure_loaded_until_now(&args.serial, start).await
                {
                    if let Some(stats) = cache.stats(&args.serial) {
                        info!(
                            serial = %args.serial,
                            appended = report.appended,
                            events = stats.event_count,
                            bytes = stats.fetched_bytes,
                            "refreshed"
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Drain fetch failures into the log
async fn report_diagnostics(cache: Arc<LogCache>) {
    let mut rx = cache.diagnostics();
    drop(cache);

    loop {
        match rx.recv().await {
            Ok(diag) => match serde_json::to_string(&diag) {
                Ok(json) => error!("fetch failure {json}"),
                Err(e) => error!("fetch failure for {}: {e}", diag.serial_number),
            },
            Err(RecvError::Lagged(n)) => warn!("dropped {n} diagnostics"),
            Err(RecvError::Closed) => break,
        }
    }
}
