//! Chat Messaging Microservice
//!
//! Direct messaging between two users with:
//! - Durable message history in LumaDB
//! - Cached window of the 20 most recent messages per conversation
//! - Real-time delivery over WebSocket
//!
//! `chat-messaging flush-cache` deletes every cached conversation and exits.

mod api;
mod config;
mod hub;
mod telemetry;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Instant;

use brivas_chat_cache::{
    flush_namespace, CacheStore, ConversationService, LumaDbCacheStore, LumaDbMessageStore,
    LumaDbPool, LumaDbUserDirectory, MemoryCacheStore, MemoryMessageStore, MemoryUserDirectory,
    MessageStore, UserDirectory, KEY_NAMESPACE,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use config::{Backend, ChatConfig};
use hub::ConnectionHub;

pub const SERVICE_ID: &str = "chat-messaging";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversationService>,
    pub users: Arc<dyn UserDirectory>,
    pub hub: Arc<ConnectionHub>,
    pub started_at: Instant,
}

struct Backends {
    store: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    cache: Arc<dyn CacheStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ChatConfig::from_env()?;
    telemetry::init_tracing(SERVICE_ID, config.json_logs)?;

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => serve(&config).await,
        Some("flush-cache") => flush_cache(&config).await,
        Some(other) => anyhow::bail!("Unknown command {other:?}, expected `serve` or `flush-cache`"),
    }
}

fn lumadb_pool(config: &ChatConfig, needed: bool) -> anyhow::Result<Option<LumaDbPool>> {
    if needed {
        Ok(Some(LumaDbPool::new(&config.pool_config())?))
    } else {
        Ok(None)
    }
}

async fn connect_cache(
    config: &ChatConfig,
    pool: Option<LumaDbPool>,
) -> anyhow::Result<Arc<dyn CacheStore>> {
    let cache: Arc<dyn CacheStore> = match (config.cache_backend, pool) {
        (Backend::LumaDb, Some(pool)) => {
            let cache = LumaDbCacheStore::new(pool);
            // The service runs without a cache, so a broken table is not fatal
            if let Err(e) = cache.ensure_schema().await {
                warn!(error = %e, "Cache table unavailable");
            }
            Arc::new(cache)
        }
        _ => Arc::new(MemoryCacheStore::new()),
    };
    Ok(cache)
}

async fn connect_backends(config: &ChatConfig) -> anyhow::Result<Backends> {
    let pool = lumadb_pool(config, config.needs_lumadb())?;

    let (store, users): (Arc<dyn MessageStore>, Arc<dyn UserDirectory>) =
        match (config.store_backend, pool.clone()) {
            (Backend::LumaDb, Some(pool)) => {
                let store = LumaDbMessageStore::new(pool.clone());
                store.ensure_schema().await?;
                let users = LumaDbUserDirectory::new(pool);
                users.ensure_schema().await?;
                (Arc::new(store), Arc::new(users))
            }
            _ => {
                warn!("Using in-memory message store, history is lost on restart");
                (
                    Arc::new(MemoryMessageStore::new()),
                    Arc::new(MemoryUserDirectory::new()),
                )
            }
        };

    let cache = connect_cache(config, pool).await?;

    info!(
        store = ?config.store_backend,
        cache = ?config.cache_backend,
        "Backends ready"
    );
    Ok(Backends { store, users, cache })
}

async fn serve(config: &ChatConfig) -> anyhow::Result<()> {
    let backends = connect_backends(config).await?;
    let hub = Arc::new(ConnectionHub::new());
    let service = ConversationService::with_settings(
        backends.store,
        backends.cache,
        hub.clone(),
        config.cache_settings(),
    );

    let state = AppState {
        service: Arc::new(service),
        users: backends.users,
        hub,
        started_at: Instant::now(),
    };
    let app = api::create_router(state.clone());
    let admin = api::create_admin_router(state);

    let listener = TcpListener::bind(&config.http_bind).await?;
    let admin_listener = TcpListener::bind(&config.admin_bind).await?;
    info!(http = %config.http_bind, admin = %config.admin_bind, "Chat messaging listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let public = axum::serve(listener, app)
        .with_graceful_shutdown(stopped(shutdown_rx.clone()))
        .into_future();
    let admin = axum::serve(admin_listener, admin)
        .with_graceful_shutdown(stopped(shutdown_rx))
        .into_future();
    tokio::try_join!(public, admin)?;

    info!("Chat messaging stopped");
    Ok(())
}

/// Only the cache is touched; the durable store may be down during a flush.
async fn flush_cache(config: &ChatConfig) -> anyhow::Result<()> {
    if config.cache_backend == Backend::Memory {
        warn!("CACHE_BACKEND=memory: nothing outlives this process, flush is a no-op");
    }

    let pool = lumadb_pool(config, config.cache_backend == Backend::LumaDb)?;
    let cache = connect_cache(config, pool).await?;

    let deleted = flush_namespace(cache.as_ref(), KEY_NAMESPACE).await?;
    info!(deleted, namespace = KEY_NAMESPACE, "All chat keys cleared");
    Ok(())
}

async fn stopped(mut shutdown: watch::Receiver<bool>) {
    // A dropped sender also means shutdown
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
