mod error;
mod server;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guide_core::config::Config;
use server::AppState;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting guide HTTP server");

    let config = Config::from_env()?;
    info!(
        content_dir = %config.content_dir().display(),
        content_file = %config.content_file,
        llms_txt = config.llms_txt.enabled,
        "configuration loaded"
    );
    if !config.content_dir().is_dir() {
        warn!(
            content_dir = %config.content_dir().display(),
            "content directory does not exist, serving an empty corpus"
        );
    }

    let state = Arc::new(AppState::new(config)?);

    match state.update_service.update().await {
        Ok(result) => info!(
            fingerprint = %result.fingerprint,
            documents = result.document_count,
            "search index ready"
        ),
        Err(e) => warn!(error = %e, "initial index build failed, retrying on first search"),
    }

    let addr = std::env::var("GUIDES_LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!(listen_addr = %addr, "HTTP server ready");

    axum::serve(listener, server::router(state)).await?;
    info!("HTTP server shut down");
    Ok(())
}
