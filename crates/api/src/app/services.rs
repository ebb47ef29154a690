use std::sync::Arc;

use anyhow::Context;

use garagebook_infra::{AppConfig, InMemoryStore, Workshop, open_store};
use garagebook_invoicing::UnimplementedSubmitter;

/// Everything the handlers share.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub workshop: Workshop,
}

impl AppServices {
    pub fn new(workshop: Workshop) -> Self {
        Self { workshop }
    }

    /// Services over a fresh in-memory store (tests and throwaway runs).
    pub fn in_memory() -> Self {
        Self::new(Workshop::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(UnimplementedSubmitter),
        ))
    }
}

/// Opens the configured store and wires the workshop service on top of it.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store = open_store(&config.database)
        .await
        .with_context(|| format!("opening store {:?}", config.database))?;

    tracing::info!(
        database = ?config.database,
        default_tax_pct = config.default_tax_pct,
        "services ready"
    );

    let workshop = Workshop::new(store, Arc::new(UnimplementedSubmitter))
        .with_default_rates(config.default_rates());
    Ok(AppServices::new(workshop))
}
