//! Rostersync binary entrypoint wiring the action API, storage supervisor,
//! and documentation routes.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rostersync::{
    config::AppConfig,
    dao::{
        storage::StorageError,
        team_store::{
            TeamStore,
            couchdb::{CouchConfig, CouchTeamStore},
            memory::MemoryTeamStore,
        },
    },
    routes,
    services::{
        insights_service::{HttpInsightsGenerator, InsightsGenerator, StaticInsightsGenerator},
        storage_supervisor,
    },
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let insights: Arc<dyn InsightsGenerator> = match &config.insights_url {
        Some(url) => Arc::new(HttpInsightsGenerator::new(reqwest::Client::new(), url)),
        None => Arc::new(StaticInsightsGenerator),
    };

    let app_state = AppState::new(config, insights);

    tokio::spawn(run_storage_supervisor(app_state.clone()));
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

/// Supervise the storage connection: CouchDB when configured, otherwise an
/// in-memory store for local development.
async fn run_storage_supervisor(state: SharedState) {
    if env::var("COUCH_BASE_URL").is_ok() {
        storage_supervisor::run(state, || async {
            let config = CouchConfig::from_env()
                .map_err(|err| StorageError::unavailable("couch config".into(), err))?;
            let store = CouchTeamStore::connect(config)
                .await
                .map_err(|err| StorageError::unavailable("couch connect".into(), err))?;
            Ok(Arc::new(store) as Arc<dyn TeamStore>)
        })
        .await;
    } else {
        info!("COUCH_BASE_URL not set; using in-memory store");
        state
            .install_team_store(Arc::new(MemoryTeamStore::new()))
            .await;
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
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
