//! Hint Quiz Back binary entrypoint wiring REST, WebSocket, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hint_quiz_back::{
    config::AppConfig,
    dao::{
        persons::PersonCatalog,
        room_store::{MemoryRoomStore, RoomStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let persons = Arc::new(PersonCatalog::new(config.persons().to_vec()));
    let app_state = AppState::new(config, persons);

    tokio::spawn(log_degraded_transitions(app_state.clone()));
    spawn_storage(app_state.clone())?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the backend named by `STORAGE_BACKEND`.
fn spawn_storage(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".into());

    match backend.trim().to_lowercase().as_str() {
        "" | "memory" => {
            let store = MemoryRoomStore::new();
            tokio::spawn(storage_supervisor::run(state, "memory", move || {
                let store = store.clone();
                async move { Ok::<Arc<dyn RoomStore>, StorageError>(Arc::new(store)) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" | "mongodb" => {
            use hint_quiz_back::dao::room_store::mongodb::{MongoConfig, MongoRoomStore};

            tokio::spawn(storage_supervisor::run(state, "mongo", || async {
                let config = MongoConfig::from_env().await?;
                let store: Arc<dyn RoomStore> = Arc::new(MongoRoomStore::connect(config).await?);
                Ok::<_, StorageError>(store)
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" | "couchdb" => {
            use hint_quiz_back::dao::room_store::couchdb::{CouchConfig, CouchRoomStore};

            tokio::spawn(storage_supervisor::run(state, "couch", || async {
                let config = CouchConfig::from_env()?;
                let store: Arc<dyn RoomStore> = Arc::new(CouchRoomStore::connect(config).await?);
                Ok::<_, StorageError>(store)
            }));
        }
        other => anyhow::bail!("unsupported STORAGE_BACKEND `{other}`"),
    }

    info!(backend = %backend, "storage supervisor started");
    Ok(())
}

/// Log every switch in or out of degraded mode.
async fn log_degraded_transitions(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        if *watcher.borrow_and_update() {
            warn!("running in degraded mode; rooms are not persisted");
        } else {
            info!("storage available; rooms are persisted");
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
