use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bookshelf::{AppState, Config, MongoStore, Server};

/// Book records over HTTP.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file. Environment variables `BOOKSHELF__*` override it.
    #[arg(short, long, env = "BOOKSHELF_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        addr = %config.server.addr,
        database = %config.store.database,
        uploads = %config.uploads.dir.display(),
        downloads = %config.downloads.dir.display(),
        "configuration loaded"
    );

    let store = MongoStore::connect(&config.store).await?;
    let state = AppState::new(Arc::new(store), &config)?;

    Server::bind(&config.server.addr)
        .await?
        .max_body_bytes(config.server.max_body_bytes)
        .serve(bookshelf::app(state))
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}
