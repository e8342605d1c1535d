// HTTP auth service: provider sign-in and session verification

use anyhow::Result;
use axum::{
    http::{header, Method},
    routing::any,
    Router,
};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::db::Database;

mod handlers;
pub mod identity;

static SERVER_HANDLE: OnceCell<RwLock<Option<oneshot::Sender<()>>>> = OnceCell::new();

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub telegram_bot_token: String,
    pub session_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: &AppConfig) -> Self {
        Self {
            db,
            telegram_bot_token: config.server.telegram_bot_token.clone(),
            session_ttl: chrono::Duration::days(config.server.session_ttl_days),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86400));

    Router::new()
        .route("/", any(handlers::auth))
        .fallback(handlers::auth)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Serve the auth routes on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn start_server(config: &AppConfig) -> Result<()> {
    let db_path = config.resolve_database_path();
    let db = Arc::new(Database::open(&db_path)?);

    if config.server.telegram_bot_token.is_empty() {
        tracing::warn!("Telegram bot token is not set, Telegram sign-in will be rejected");
    }

    let state = AppState::new(db, config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Auth server listening on {}", listener.local_addr()?);

    let (tx, rx) = oneshot::channel::<()>();

    SERVER_HANDLE
        .get_or_init(|| RwLock::new(None))
        .write()
        .replace(tx);

    let result = serve(listener, state, async {
        rx.await.ok();
    })
    .await;

    if let Some(lock) = SERVER_HANDLE.get() {
        lock.write().take();
    }

    result
}

pub async fn stop_server() -> Result<()> {
    if let Some(lock) = SERVER_HANDLE.get() {
        if let Some(tx) = lock.write().take() {
            let _ = tx.send(());
            tracing::info!("Auth server stopped");
        }
    }
    Ok(())
}
