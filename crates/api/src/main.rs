use anyhow::Context;

use sourcing_infra::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sourcing_observability::init();

    let config = EngineConfig::from_env().context("invalid configuration")?;
    let app = sourcing_api::app::build_app(&config)
        .await
        .context("failed to wire services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        store = ?config.store,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
