//! edgefl_collector: receives round reports over HTTP and logs them.

use std::net::SocketAddr;

use edgefl_collector::{parse_port, router, state::AppState, DEFAULT_PORT};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|a| a == "-h" || a == "--help") {
        eprintln!("Usage: edgefl_collector [--port N|-p N]");
        return Ok(());
    }

    let port = match parse_port(std::env::args(), DEFAULT_PORT) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}\nUsage: edgefl_collector [--port N|-p N]");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("collector listening on http://{}/update", listener.local_addr()?);

    axum::serve(listener, router(AppState::default())).await?;
    Ok(())
}
