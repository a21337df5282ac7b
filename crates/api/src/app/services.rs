//! Store wiring: in-memory for dev/tests, Postgres when configured.

use std::sync::Arc;

use storefront_infra::store::{
    InMemoryInventoryLedger, InMemoryOrderStore, InventoryLedger, OrderStore, ProductCatalog,
};
use storefront_infra::OrderLifecycleManager;

#[cfg(feature = "postgres")]
use storefront_infra::store::{postgres, PostgresInventoryLedger, PostgresOrderStore};

use crate::config::ApiConfig;

pub type Lifecycle = OrderLifecycleManager<Arc<dyn OrderStore>, Arc<dyn InventoryLedger>>;

/// Shared handles injected into every handler.
pub struct AppServices {
    pub lifecycle: Lifecycle,
    pub catalog: Arc<dyn ProductCatalog>,
    pub latest_orders_default: usize,
}

impl AppServices {
    pub fn ledger(&self) -> &Arc<dyn InventoryLedger> {
        self.lifecycle.ledger()
    }
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    match config.database_url.as_deref() {
        Some(url) => build_persistent_services(config, url).await,
        None => Ok(build_in_memory_services(config)),
    }
}

fn build_in_memory_services(config: &ApiConfig) -> AppServices {
    let orders: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
    let ledger = Arc::new(InMemoryInventoryLedger::new());
    let catalog: Arc<dyn ProductCatalog> = ledger.clone();

    tracing::info!(policy = ?config.transition_policy, "using in-memory stores");
    assemble(config, orders, ledger, catalog)
}

#[cfg(feature = "postgres")]
async fn build_persistent_services(config: &ApiConfig, url: &str) -> anyhow::Result<AppServices> {
    use anyhow::Context;

    let pool = sqlx::PgPool::connect(url)
        .await
        .context("failed to connect to Postgres")?;
    postgres::migrate(&pool)
        .await
        .context("failed to apply schema")?;

    let orders: Arc<dyn OrderStore> = Arc::new(PostgresOrderStore::new(pool.clone()));
    let ledger = Arc::new(PostgresInventoryLedger::new(pool));
    let catalog: Arc<dyn ProductCatalog> = ledger.clone();

    tracing::info!(policy = ?config.transition_policy, "using Postgres stores");
    Ok(assemble(config, orders, ledger, catalog))
}

#[cfg(not(feature = "postgres"))]
async fn build_persistent_services(config: &ApiConfig, _url: &str) -> anyhow::Result<AppServices> {
    tracing::warn!(
        "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
    );
    Ok(build_in_memory_services(config))
}

fn assemble(
    config: &ApiConfig,
    orders: Arc<dyn OrderStore>,
    ledger: Arc<dyn InventoryLedger>,
    catalog: Arc<dyn ProductCatalog>,
) -> AppServices {
    AppServices {
        lifecycle: OrderLifecycleManager::with_policy(orders, ledger, config.transition_policy),
        catalog,
        latest_orders_default: config.latest_orders_default,
    }
}
