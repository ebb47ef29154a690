use std::sync::Arc;

use anyhow::Context;

use garagebook_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    garagebook_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = garagebook_api::app::services::build_services(&config).await?;

    if config.seed_demo {
        let seeded = services
            .workshop
            .seed_demo_data()
            .await
            .context("seeding demo data")?;
        tracing::info!(seeded, "demo data check complete");
    }

    let app = garagebook_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
