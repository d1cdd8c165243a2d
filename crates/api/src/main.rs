use anyhow::Context;

use gasline_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gasline_observability::init();

    let config = ApiConfig::from_env()?;
    let app = gasline_api::app::build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
