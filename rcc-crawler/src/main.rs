//! rcc-crawler - one crawl run for one station
//!
//! Scheduling stays outside: cron or an event trigger invokes the binary,
//! which reconciles the station once and exits non-zero when the run could
//! not catch up with the ledger.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rcc_common::config::{load_config, TomlConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rcc_crawler::config::{self as crawler_config, LedgerOverrides};
use rcc_crawler::http::HttpClient;
use rcc_crawler::sources::hitradio_oe3::{self, HitradioOe3Source, TwitterHttpApi};
use rcc_crawler::sources::kronehit::{self, KronehitHttpApi, KronehitSource};
use rcc_crawler::sources::OrfSource;
use rcc_crawler::{Crawler, HomeBaseConnector, TrackSource};

/// Command-line arguments for rcc-crawler
#[derive(Parser, Debug)]
#[command(name = "rcc-crawler")]
#[command(about = "Crawl radio now-playing data into the ledger")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "RCC_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger API host
    #[arg(long)]
    api_host: Option<String>,

    /// Ledger API key
    #[arg(long)]
    api_key: Option<String>,

    /// Ledger write authorization token
    #[arg(long)]
    api_authorization: Option<String>,

    /// Log filter directive, e.g. `info` or `rcc_crawler=debug`
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    source: SourceCommand,
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    /// Kronehit playlist search
    Kronehit,

    /// Hitradio Ö3 announcement feed
    #[command(name = "hitradio-oe3")]
    HitradioOe3 {
        /// Twitter app-only bearer token
        #[arg(long)]
        bearer_token: Option<String>,
    },

    /// ORF regional station snapshot
    Orf {
        /// Station key or id, e.g. `radio-oberösterreich`
        #[arg(long)]
        station: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let log_level = crawler_config::resolve_log_level(args.log_level.as_deref(), &toml_config);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting rcc-crawler {}", env!("CARGO_PKG_VERSION"));

    let overrides = LedgerOverrides {
        api_host: args.api_host.clone(),
        api_key: args.api_key.clone(),
        api_authorization: args.api_authorization.clone(),
    };
    let ledger_settings = crawler_config::resolve_ledger_settings(&overrides, &toml_config)
        .context("Failed to resolve ledger settings")?;
    let ledger = Arc::new(
        HomeBaseConnector::new(ledger_settings).context("Failed to create ledger client")?,
    );

    // The ledger station is always the one the source stamps on its records
    let (station_id, source) = build_source(&args.source, &toml_config)?;

    let mut crawler = Crawler::new(station_id, source, ledger)
        .await
        .context("Failed to initialize crawler")?;

    match crawler.run().await {
        Ok(report) => {
            info!(
                station_id = %station_id,
                persisted = report.persisted,
                high_water_mark = crawler.high_water_mark(),
                "Crawl run complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(station_id = %station_id, error = %e, "Crawl run failed");
            Err(e).context(format!("Crawl run for {} failed", station_id))
        }
    }
}

/// Build the source for the chosen subcommand together with its station id
fn build_source(
    command: &SourceCommand,
    toml_config: &TomlConfig,
) -> Result<(&'static str, Box<dyn TrackSource>)> {
    let timeout = crawler_config::request_timeout(toml_config);

    match command {
        SourceCommand::Kronehit => {
            let http =
                Arc::new(HttpClient::new(timeout).context("Failed to create HTTP client")?);
            let source: Box<dyn TrackSource> =
                Box::new(KronehitSource::new(Box::new(KronehitHttpApi::new(http))));
            Ok((kronehit::STATION_ID, source))
        }
        SourceCommand::HitradioOe3 { bearer_token } => {
            let token =
                crawler_config::resolve_twitter_bearer_token(bearer_token.as_deref(), toml_config)
                    .context("Failed to resolve Twitter credentials")?;
            let api = TwitterHttpApi::new(token, timeout)
                .context("Failed to create Twitter client")?;
            let source: Box<dyn TrackSource> = Box::new(HitradioOe3Source::new(Box::new(api)));
            Ok((hitradio_oe3::STATION_ID, source))
        }
        SourceCommand::Orf { station } => {
            let http =
                Arc::new(HttpClient::new(timeout).context("Failed to create HTTP client")?);
            let source = OrfSource::for_station(http, station)
                .with_context(|| format!("Unknown ORF station {}", station))?;
            let station_id = source.station_id();
            let source: Box<dyn TrackSource> = Box::new(source);
            Ok((station_id, source))
        }
    }
}
