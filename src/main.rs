use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use scrape_index_mcp::{
    AppState,
    api::{routes::create_router, server::ScrapeServer},
    config::{Config, Transport},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // stdout carries the stdio protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(
        dir = %config.scrape_dir.display(),
        transport = ?config.transport,
        "Starting scrape server"
    );
    let transport = config.transport;
    let server_addr = config.server_addr;
    let server = ScrapeServer::new(AppState::new(config));

    match transport {
        Transport::Stdio => server.serve_stdio().await?,
        Transport::Http => {
            let app = create_router(server);
            let listener = TcpListener::bind(server_addr).await?;

            tracing::info!(%server_addr, "Listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    tokio::signal::ctrl_c().await.ok();
                })
                .await?;
        }
    }

    Ok(())
}
