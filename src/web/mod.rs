//! HTTP front end: routes, shared state and the server loop.

use std::num::NonZeroU16;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tower_http::services::ServeDir;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::{error, info};

use crate::constants::{
    IMAGE_UPLOAD_LIMIT_BYTES, PROFILE_PICS_DIR, PROFILE_PICS_URL, SESSION_IDLE_MINUTES,
};
use crate::sdapi::SdClient;
use crate::store::CharacterStore;

mod characters;
mod flash;
mod images;
mod manga;
mod prelude;
mod views;

use characters::{create_character_handler, delete_character_handler};
use manga::{api_generate_manga_handler, generate_manga_handler, refine_manga_handler};
use views::{create_character_form, root_handler};

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    store: Arc<CharacterStore>,
    sd: SdClient,
    profile_dir: PathBuf,
}

impl AppState {
    fn new(store: CharacterStore, sd: SdClient, static_dir: &Path) -> Self {
        Self {
            store: Arc::new(store),
            sd,
            profile_dir: static_dir.join(PROFILE_PICS_DIR),
        }
    }
}

fn create_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            SESSION_IDLE_MINUTES,
        )));
    let image_limit = DefaultBodyLimit::max(IMAGE_UPLOAD_LIMIT_BYTES);

    Router::new()
        .route("/", axum::routing::get(root_handler))
        .route(
            "/c_character",
            axum::routing::get(create_character_form).post(create_character_handler),
        )
        .route(
            "/generate_manga",
            axum::routing::post(generate_manga_handler).layer(image_limit),
        )
        .route(
            "/refine_manga",
            axum::routing::post(refine_manga_handler).layer(image_limit),
        )
        .route(
            "/delete_character",
            axum::routing::post(delete_character_handler),
        )
        .route(
            "/api/generate_manga",
            axum::routing::post(api_generate_manga_handler).layer(image_limit),
        )
        .route("/static/styles.css", axum::routing::get(styles_handler))
        .nest_service(PROFILE_PICS_URL, ServeDir::new(&state.profile_dir))
        .layer(session_layer)
        .with_state(state)
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Serves the application until interrupted.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    static_dir: &Path,
    store: CharacterStore,
    sd: SdClient,
) -> Result<(), anyhow::Error> {
    let state = AppState::new(store, sd, static_dir);
    tokio::fs::create_dir_all(&state.profile_dir).await?;
    info!(
        "Characters in {}, portraits in {}, image backend at {}",
        state.store.path().display(),
        state.profile_dir.display(),
        state.sd.base_url()
    );
    let app = create_router(state);

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}
