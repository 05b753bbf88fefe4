use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use outbox_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::{auth, cors, rate_limit},
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    {
        let state = app_state.clone();
        let batch_size = config.dispatch_batch_size;
        let idle = Duration::from_millis(config.dispatch_interval_ms);
        tokio::spawn(async move {
            loop {
                match state.dispatcher.run_once(batch_size).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(idle).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Dispatch worker error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    {
        let state = app_state.clone();
        let retention_days = config.replay_retention_days;
        tokio::spawn(async move {
            loop {
                let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
                match state.webhook_guard.purge_expired(cutoff).await {
                    Ok(purged) if purged > 0 => {
                        info!("Purged {} expired webhook replay records", purged);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = ?e, "Replay purge error"),
                }
                tokio::time::sleep(Duration::from_secs(3_600)).await;
            }
        });
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let producer_api = Router::new()
        .route(
            "/api/outbox",
            get(routes::outbox::list).post(routes::outbox::enqueue),
        )
        .route("/api/outbox/:id", get(routes::outbox::get_item))
        .layer(axum::middleware::from_fn(auth::require_bearer_auth))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.integration_rps),
            rate_limit::rps_middleware,
        ));

    let admin_api = Router::new()
        .route("/api/outbox/dispatch", post(routes::outbox::dispatch))
        .route("/api/outbox/:id/retry", post(routes::outbox::retry))
        .layer(axum::middleware::from_fn(auth::require_admin))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.integration_rps),
            rate_limit::rps_middleware,
        ));

    let webhook_api = Router::new()
        .route(
            "/api/webhook/:provider",
            post(routes::webhook::handle_provider_webhook),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.public_rps),
            rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(admin_api)
        .merge(producer_api)
        .merge(webhook_api)
        .with_state(app_state)
        .layer(cors::permissive_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
