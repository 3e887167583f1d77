use std::sync::Arc;

use sqlx::PgPool;

use crate::admission::AdmissionController;
use crate::config::Config;
use crate::hub::HubHandle;
use crate::repository::postgres::PgRepositoryFactory;
use crate::repository::RepositoryFactory;
use crate::service::{MessagingService, ReceiptService};

/// Shared process state handed to every axum handler, analogous to the
/// teacher's own app-state struct: one clone-cheap `Arc` bundle rather than
/// threading the pool, hub, and config through every function signature.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: HubHandle,
    pub admission: Arc<AdmissionController>,
    pub messaging: Arc<MessagingService>,
    pub receipts: Arc<ReceiptService>,
    /// Kept alongside the repository factory so the `/health` probe can run
    /// a direct query without going through a service or transaction.
    pub pool: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool, hub: HubHandle, config: Config) -> Self {
        let config = Arc::new(config);
        let factory: Arc<dyn RepositoryFactory> = Arc::new(PgRepositoryFactory::new(pool.clone()));
        let admission = Arc::new(AdmissionController::new(
            config.max_connections,
            config.max_attempts_per_minute_per_address,
            config.stale_entry_age,
        ));
        let messaging = Arc::new(MessagingService::new(Arc::clone(&factory), hub.clone(), Arc::clone(&config)));
        let receipts = Arc::new(ReceiptService::new(factory, hub.clone()));

        Self {
            config,
            hub,
            admission,
            messaging,
            receipts,
            pool,
        }
    }
}
