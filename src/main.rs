mod config;
mod db;
mod error;
mod filter;
mod memory;
mod models;
mod postgres;
mod repository;
mod routes;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    routing::get,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::{Config, StoreKind},
    memory::MemoryFilmRepository,
    models::Film,
    postgres::PostgresFilmRepository,
    repository::FilmRepository,
};

#[derive(Parser)]
#[command(name = "filmcat", about = "Read-only film catalog over HTTP")]
struct Cli {
    /// Env file holding the service configuration
    #[arg(long, default_value = config::DEFAULT_ENV_PATH)]
    envfile: PathBuf,
}

pub struct AppState {
    pub films: Arc<dyn FilmRepository>,
    pub shutdown: CancellationToken,
}

const PING: &str = "/ping";
const FILMS: &str = "/v1/films";
const FILMS_SLASH: &str = "/v1/films/";
const FILM: &str = "/v1/films/{film_id}";

/// Method and path of every registered route, logged at startup.
const ROUTES: [(&str, &str); 4] =
    [("GET", PING), ("GET", FILMS), ("GET", FILMS_SLASH), ("GET", FILM)];

pub fn app(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let request_id =
            req.headers().get("x-request-id").and_then(|v| v.to_str().ok()).unwrap_or("-");
        tracing::info_span!(
            "request",
            method = %req.method(),
            uri = %req.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route(PING, get(routes::ping))
        .route(FILMS, get(routes::list_films))
        .route(FILMS_SLASH, get(routes::list_films))
        .route(FILM, get(routes::get_film))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace)
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::new())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
                .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any)),
        )
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn FilmRepository>> {
    match config.store {
        StoreKind::Postgres => {
            let db = db::connect(&config.database).await?;
            Ok(Arc::new(PostgresFilmRepository::new(db)))
        },
        StoreKind::Memory => {
            let films: Vec<Film> = match &config.seed_path {
                Some(path) => {
                    let raw = tokio::fs::read(path)
                        .await
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_slice(&raw)
                        .with_context(|| format!("parsing {}", path.display()))?
                },
                None => Vec::new(),
            };
            let repo = MemoryFilmRepository::new(films);
            tracing::info!(films = repo.len(), "using in-memory film store");
            Ok(Arc::new(repo))
        },
    }
}

/// Cancels `shutdown` on SIGINT or SIGTERM.
fn watch_shutdown_signals(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                },
                Err(err) => {
                    tracing::error!(error = %err, "failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                },
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!(reason = "SIGINT", "server is shutting down"),
            _ = terminate => tracing::info!(reason = "SIGTERM", "server is shutting down"),
        }

        shutdown.cancel();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,filmcat=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let vars = config::load_env_map(&cli.envfile)?;
    let config = Config::from_vars(&vars)?;

    let shutdown = CancellationToken::new();
    watch_shutdown_signals(shutdown.clone());

    let films = open_store(&config).await?;
    let state = Arc::new(AppState { films, shutdown: shutdown.clone() });
    let app = app(state, config.request_timeout);
    for (method, route) in ROUTES {
        tracing::info!(%method, %route, "route registered");
    }

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    tracing::info!(addr = %config.addr, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    tracing::info!("server stopped");
    Ok(())
}
