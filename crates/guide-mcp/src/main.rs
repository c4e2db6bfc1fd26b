mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guide_core::config::Config;
use guide_core::loader::GuideLoader;
use guide_core::search::SearchIndex;
use guide_core::update::UpdateService;
use server::GuideMcpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting guide MCP server");

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

    let index = Arc::new(SearchIndex::new()?);
    let update_service = Arc::new(UpdateService::new(GuideLoader::from_config(&config), index));

    info!("indexing published guides");
    match update_service.update().await {
        Ok(result) => info!(
            fingerprint = %result.fingerprint,
            documents = result.document_count,
            "indexing complete"
        ),
        Err(e) => warn!(error = %e, "initial index build failed, retrying on first search"),
    }

    let server = GuideMcpServer::new(&config, update_service);

    if let Ok(addr) = std::env::var("MCP_TCP_LISTEN_ADDR") {
        let listener = TcpListener::bind(&addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                tracing::info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                tracing::info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
