use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use gasdrift::dashboard::{router, AppState};
use gasdrift::{Engine, EngineConfig, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drift velocity dashboard", long_about = None)]
struct Args {
    /// Settings file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the settings file
    #[arg(short, long)]
    bind: Option<String>,

    /// Local gas directory, overrides the settings file
    #[arg(long)]
    gas_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let mut settings =
        Settings::load_or_default(args.config.as_deref()).context("loading settings")?;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    settings.gas_dir = match args.gas_dir {
        Some(dir) => dir,
        None => EngineConfig::gas_dir_or(settings.gas_dir),
    };

    let addr: SocketAddr = settings
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.bind))?;
    let engine = Engine::initialize(EngineConfig::default().with_gas_dir(&settings.gas_dir))?;
    let app = router(Arc::new(AppState::new(engine, settings)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Serving on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
