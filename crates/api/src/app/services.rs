//! Service wiring: store backend, award service, notification outbox + worker.

use std::io;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use sourcing_infra::award::AwardService;
use sourcing_infra::notify::{
    InMemoryRecipientDirectory, LoggingTransport, NotificationFanout, NotificationTransport,
    Outbox, PgRecipientDirectory, RecipientDirectory,
};
use sourcing_infra::purchase_order::DraftOrderMaterializer;
use sourcing_infra::store::{AwardStore, InMemoryAwardStore, PgAwardStore, StoreError};
use sourcing_infra::workers::{NotificationWorker, WorkerHandle};
use sourcing_infra::{EngineConfig, StoreBackend};

const MAX_DB_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("DATABASE_URL is required for the postgres store")]
    MissingDatabaseUrl,

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migration(#[from] StoreError),

    #[error("failed to start notification worker: {0}")]
    Worker(#[from] io::Error),
}

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    awards: AwardService,
    // Held for the lifetime of the app; the worker exits once the outbox is
    // dropped with the award service.
    _notification_worker: WorkerHandle,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn AwardStore>,
        directory: Arc<dyn RecipientDirectory>,
        transport: Arc<dyn NotificationTransport>,
        config: &EngineConfig,
    ) -> io::Result<Self> {
        let outbox = Arc::new(Outbox::new());
        let worker = NotificationWorker::spawn(&outbox, transport, None)?;

        let fanout = NotificationFanout::new(directory, config.recipient_policy(), outbox);
        let materializer = Arc::new(DraftOrderMaterializer::new(config.po_number_prefix.clone()));
        let awards = AwardService::new(store, materializer).with_notifications(fanout);

        Ok(Self {
            awards,
            _notification_worker: worker,
        })
    }

    pub fn awards(&self) -> &AwardService {
        &self.awards
    }
}

/// Build services for the configured backend.
///
/// The in-memory backend starts empty and is meant for local development.
pub async fn build_services(config: &EngineConfig) -> Result<AppServices, BootstrapError> {
    let transport: Arc<dyn NotificationTransport> = Arc::new(LoggingTransport);

    let services = match config.store {
        StoreBackend::Memory => {
            info!("using in-memory award store");
            AppServices::new(
                Arc::new(InMemoryAwardStore::new()),
                InMemoryRecipientDirectory::arc(),
                transport,
                config,
            )?
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(BootstrapError::MissingDatabaseUrl)?;
            let pool = PgPoolOptions::new()
                .max_connections(MAX_DB_CONNECTIONS)
                .connect(url)
                .await?;
            let store = PgAwardStore::new(pool.clone());
            store.migrate().await?;
            info!("using postgres award store");
            AppServices::new(
                Arc::new(store),
                Arc::new(PgRecipientDirectory::new(pool)),
                transport,
                config,
            )?
        }
    };

    Ok(services)
}
