use std::sync::Arc;

use backend::config::Config;
use backend::socket_map::SocketMap;
use backend::state::AppState;
use backend::{identity, scheduler, supervisor, worker};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wa_baileys::MockClient;
use wa_cache::InMemoryCache;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    info!("connecting to database...");
    let pool = wa_store::db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    wa_store::db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");
    info!("migrations applied");

    let server_id = identity::derive_server_id(config.server_id.as_deref());
    wa_store::servers::register(
        &pool,
        &server_id,
        &config.server_url,
        &config.server_region,
        config.server_priority,
        config.server_max_capacity,
    )
    .await
    .expect("failed to register server row");
    info!(server_id = %server_id, "server registered");

    let cache: Arc<dyn wa_cache::Cache> = Arc::new(InMemoryCache::new());
    // The real WhatsApp wire protocol is a collaborator outside this
    // workspace; MockClient is the scriptable stand-in behind the
    // ProtocolClient seam (see DESIGN.md).
    let protocol: Arc<dyn wa_baileys::ProtocolClient> = Arc::new(MockClient::new());
    let sockets = SocketMap::new();

    let state = AppState::new(
        pool.clone(),
        cache.clone(),
        protocol.clone(),
        sockets.clone(),
        server_id.clone(),
        config.api_key.clone(),
    );

    let supervisor_ctx = supervisor::SupervisorCtx {
        pool: pool.clone(),
        cache: cache.clone(),
        protocol: protocol.clone(),
        server_id: server_id.clone(),
        sockets: sockets.clone(),
    };
    tokio::spawn(supervisor::run_forever(supervisor_ctx));
    tokio::spawn(supervisor::run_health_forever(pool.clone(), server_id.clone()));
    tokio::spawn(supervisor::run_reaper_forever(
        pool.clone(),
        backend::config::STALE_SERVER_SECS,
    ));
    tokio::spawn(scheduler::run_scheduler_forever(pool.clone()));
    tokio::spawn(scheduler::run_queueing_tick_forever(pool.clone()));
    tokio::spawn(worker::run_worker_pool(worker::WorkerCtx {
        pool: pool.clone(),
        cache: cache.clone(),
        sockets: sockets.clone(),
        http: reqwest::Client::new(),
    }));

    let router = backend::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %config.bind_addr, "backend listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(pool, server_id))
        .await
        .expect("server error");
    info!("backend shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C, then marks this server's row inactive so
/// the supervisor on other nodes reassigns its devices (spec.md §5).
async fn shutdown_signal(pool: sqlx::PgPool, server_id: String) {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }

    if let Err(err) = wa_store::servers::mark_inactive(&pool, &server_id).await {
        tracing::warn!(error = %err, "failed to mark server inactive during shutdown");
    }
}
