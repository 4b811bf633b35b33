//! Party queue backend entrypoint wiring REST, WebSocket rooms, storage and catalog layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use party_queue_back::{
    config::AppConfig,
    dao::{catalog::TrackCatalog, party_store::MemoryPartyStore},
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config, build_catalog());

    install_storage(&app_state).await?;
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

/// Select the party store from `PARTY_STORE` (`memory` by default, or `mongo`).
async fn install_storage(state: &SharedState) -> anyhow::Result<()> {
    let backend = env::var("PARTY_STORE").unwrap_or_else(|_| "memory".into());
    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            info!("using in-memory party store");
            state
                .install_party_store(Arc::new(MemoryPartyStore::new()))
                .await;
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            info!("using MongoDB party store; starting in degraded mode");
            tokio::spawn(run_mongo_supervisor(state.clone()));
        }
        other => bail!("unsupported PARTY_STORE backend `{other}`"),
    }
    Ok(())
}

#[cfg(feature = "mongo-store")]
async fn run_mongo_supervisor(state: SharedState) {
    use party_queue_back::{
        dao::{
            party_store::{
                PartyStore,
                mongodb::{MongoConfig, MongoPartyStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor::{self, SupervisorPolicy},
    };

    storage_supervisor::run(state, SupervisorPolicy::default(), || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoPartyStore::connect(config).await?;
        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn PartyStore>)
    })
    .await;
}

/// Build the catalog client when credentials are present; searches answer 503 otherwise.
fn build_catalog() -> Option<Arc<dyn TrackCatalog>> {
    #[cfg(feature = "spotify-catalog")]
    {
        use party_queue_back::dao::catalog::spotify::{SpotifyCatalog, SpotifyConfig};

        match SpotifyConfig::from_env() {
            Ok(config) => {
                info!("Spotify catalog configured");
                return Some(Arc::new(SpotifyCatalog::new(config)));
            }
            Err(err) => warn!(error = %err, "catalog search disabled"),
        }
    }

    None
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

        let Ok(mut term) = signal(SignalKind::terminate()) else {
            warn!("failed to install SIGTERM handler; listening for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
