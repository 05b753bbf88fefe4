pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use reqwest::Client;
use sqlx::PgPool;

use crate::providers::AdapterRegistry;
use crate::services::{
    dispatch_service::DispatchService,
    limiter_service::{default_rate_limits, IntegrationLimiter},
    outbox_service::{OutboxStore, PgOutboxStore},
    webhook_service::{PgReplayStore, ReplayStore, WebhookGuard},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub outbox: Arc<dyn OutboxStore>,
    pub dispatcher: DispatchService,
    pub webhook_guard: WebhookGuard,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        // Every provider call carries this timeout so one slow upstream
        // cannot stall a batch.
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        let outbox: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(pool.clone()));
        let registry = Arc::new(AdapterRegistry::with_defaults(http_client, config));
        let limiter = IntegrationLimiter::new(default_rate_limits());
        let dispatcher = DispatchService::new(outbox.clone(), registry, limiter);

        let replay: Arc<dyn ReplayStore> = Arc::new(PgReplayStore::new(pool.clone()));
        let webhook_guard = WebhookGuard::new(replay);

        Self {
            pool,
            outbox,
            dispatcher,
            webhook_guard,
        }
    }
}
