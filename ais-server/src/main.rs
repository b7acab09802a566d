//! ais-kml: AIS ingestion daemon with a loopback KML snapshot server.
//!
//! Reads AIVDM/AIVDO sentences from stdin, writes the activity log to
//! stdout, and serves the current vessel positions as KML on
//! `127.0.0.1:<port>`. Exits when stdin reaches end of stream.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tokio::net::TcpListener;

use ais_core::config::{load_config, Config};
use ais_core::registry::VesselRegistry;

mod ingest;
mod server;
mod store;
mod supervise;

use ingest::{ActivityLog, IngestError, Ingestor};
use store::{StoreEnv, StoreError};

#[derive(Parser)]
#[command(name = "ais-kml", version, about = "AIS vessel tracker with a KML snapshot server")]
struct Cli {
    /// Port for the snapshot server on 127.0.0.1 [default: 8080]
    port: Option<u16>,

    /// Identity store directory [default: db_env]
    #[arg(long, env = "AIS_KML_STORE")]
    store: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum Fatal {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),
    #[error("ingestion thread failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Apply CLI overrides on top of the loaded config file.
fn resolve_config(cli: &Cli, file: ais_core::Result<Config>) -> Config {
    let mut config = file.unwrap_or_else(|e| {
        tracing::warn!("ignoring config file: {e}");
        Config::default()
    });
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(store) = &cli.store {
        config.store.path = store.display().to_string();
    }
    config
}

async fn run(cli: Cli) -> Result<(), Fatal> {
    let config = resolve_config(&cli, load_config());

    let env = StoreEnv::open(&config.store.path)?;
    let names = env.cache("names")?;
    let calls = env.cache("calls")?;
    tracing::info!("identity store: {}", env.path().display());

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Fatal::Bind { addr, source })?;
    tracing::info!("serving KML on http://{addr}/");

    let registry = Arc::new(VesselRegistry::new());
    supervise::spawn("listener", server::serve(listener, Arc::clone(&registry)));

    let mut ingestor = Ingestor::new(registry, names, calls);
    let (ingestor, result) = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut log = ActivityLog::new(std::io::stdout().lock());
        let result = ingestor.run(stdin.lock(), &mut log);
        (ingestor, result)
    })
    .await?;

    let stats = ingestor.stats();
    let cache_writes = ingestor.close();
    let closed = env.close();

    tracing::info!(
        lines = stats.lines,
        sentences = stats.sentences,
        reports = stats.reports,
        errors = stats.errors,
        cache_writes,
        "end of input"
    );

    result?;
    closed?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
