//! scriba-api - Transcription Studio Service
//!
//! HTTP service that ties uploaded or linked media to transcripts produced
//! by speech-to-text vendors with ordered fallback, exports subtitles, and
//! proxies narration synthesis.

use anyhow::Result;
use clap::Parser;
use scriba_api::{build_router, AppState};
use scriba_common::AppConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "scriba-api", version, about = "Scriba transcription service")]
struct Args {
    /// Path to the TOML config file (overrides SCRIBA_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting scriba-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    config.ensure_root_folder()?;
    info!("Root folder: {}", config.storage.root_folder.display());

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = scriba_common::db::init_database_pool(&db_path).await?;

    let configured: Vec<&str> = [
        ("assemblyai", config.providers.assemblyai_api_key.is_some()),
        ("openai", config.providers.openai_api_key.is_some()),
        ("deepgram", config.providers.deepgram_api_key.is_some()),
        ("elevenlabs", config.providers.elevenlabs_api_key.is_some()),
    ]
    .iter()
    .filter(|(_, present)| *present)
    .map(|(name, _)| *name)
    .collect();
    info!("Configured vendors: [{}]", configured.join(", "));
    if config.identity.is_none() {
        info!("No identity service configured - running in open mode");
    }

    let bind_addr = config.bind_addr();
    let state = AppState::new(pool, config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
