use std::net::SocketAddr;

use identify_lib::state::{load_config, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let state = AppState::open(load_config()?)?;
    let addr: SocketAddr = state.config.bind.parse()?;

    let app = identify_lib::http::router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("identify listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
