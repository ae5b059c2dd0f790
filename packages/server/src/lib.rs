#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for UFSA tender listings.
//!
//! Serves the cached tender snapshot over REST. A background
//! [`Scheduler`] keeps the snapshot fresh; handlers only ever read it
//! through a [`SnapshotReader`], so requests never wait on the portal.
//! Detail pages and documents are the exception: they are fetched live
//! through the shared [`UfsaClient`].
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `BIND_ADDR` | `127.0.0.1` | Address to bind |
//! | `PORT` | `8080` | Port to bind |
//!
//! The portal, cache and persistence crates read their own variables.

mod handlers;
pub mod query;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use tender_watch_cache::{
    OrchestratorConfig, RefreshOrchestrator, Scheduler, SnapshotReader, UpstreamSource,
};
use tender_watch_persistence::PersistenceError;
use tender_watch_scraper::{ScrapeError, UfsaClient, UpstreamConfig};

/// Errors that prevent the server from starting or keep it from running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The portal client could not be built.
    #[error("Upstream client error: {0}")]
    Upstream(#[from] ScrapeError),

    /// The persistence backend is misconfigured.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state.
pub struct AppState {
    /// Read-only view of the tender cache.
    pub reader: SnapshotReader,
    /// Portal client for live detail and document requests.
    pub client: Arc<UfsaClient>,
}

/// Address the HTTP server binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Reads `BIND_ADDR` and `PORT`, falling back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

/// Registers every route on an Actix app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index)).service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/status", web::get().to(handlers::status))
            .route("/concursos/abertos", web::get().to(handlers::open_tenders))
            .route(
                "/concursos/adjudicados",
                web::get().to(handlers::awarded_tenders),
            )
            .route(
                "/concursos/ajustes-directos",
                web::get().to(handlers::direct_adjustments),
            )
            .route("/concursos/provincias", web::get().to(handlers::provinces))
            .route("/concursos/tipos", web::get().to(handlers::tender_types))
            .route("/concursos/entidades", web::get().to(handlers::entities))
            .route("/concursos/export", web::get().to(handlers::export))
            .route(
                "/concursos/{type}/detalhes",
                web::get().to(handlers::details),
            )
            .route("/proxy-pdf", web::get().to(handlers::proxy_document))
            .route("/stats/dashboard", web::get().to(handlers::dashboard)),
    );
}

/// Serves `state` until the server is stopped.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
pub async fn serve(state: web::Data<AppState>, config: &ServerConfig) -> std::io::Result<()> {
    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

/// Starts the tender watch API server.
///
/// Builds the portal client and persistence gateway from the environment,
/// starts the refresh scheduler (which bootstraps from the persisted
/// snapshot and then fetches live data) and serves the API. This is a
/// regular async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if the client or persistence backend cannot be
/// built, or if the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), ServerError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let client = Arc::new(UfsaClient::new(UpstreamConfig::from_env())?);
    log::info!("Using portal at {}", client.config().base_url);

    let persistence = tender_watch_persistence::gateway_from_env()?;
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Arc::clone(&client) as Arc<dyn UpstreamSource>,
        persistence,
        OrchestratorConfig::from_env(),
    ));
    let reader = orchestrator.reader();
    let scheduler = Scheduler::start(orchestrator);

    let state = web::Data::new(AppState { reader, client });
    let result = serve(state, &ServerConfig::from_env()).await;

    scheduler.shutdown().await;
    result.map_err(ServerError::from)
}
