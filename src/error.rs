//! Error handling

use axum::response::IntoResponse;
use tracing::info;

use crate::sdapi::GenerationError;
use crate::store::StoreError;

/// Error definitions for the web application.
#[derive(Debug)]
pub enum MangakaError {
    /// When you didn't do the right thing
    BadRequest,
    /// When a requested resource is not found
    NotFound(String),
    /// When reading or writing the character file fails
    Store(StoreError),
    /// When the image backend fails
    Generation(GenerationError),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl std::fmt::Display for MangakaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MangakaError::BadRequest => write!(f, "Bad request"),
            MangakaError::NotFound(what) => write!(f, "Not found: {what}"),
            MangakaError::Store(err) => write!(f, "{err}"),
            MangakaError::Generation(err) => write!(f, "{err}"),
            MangakaError::InternalServerError(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for MangakaError {}

impl From<StoreError> for MangakaError {
    fn from(err: StoreError) -> Self {
        MangakaError::Store(err)
    }
}

impl From<GenerationError> for MangakaError {
    fn from(err: GenerationError) -> Self {
        MangakaError::Generation(err)
    }
}

impl From<std::io::Error> for MangakaError {
    fn from(err: std::io::Error) -> Self {
        MangakaError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for MangakaError {
    fn from(err: axum::http::Error) -> Self {
        MangakaError::InternalServerError(err.to_string())
    }
}

impl From<tower_sessions::session::Error> for MangakaError {
    fn from(err: tower_sessions::session::Error) -> Self {
        MangakaError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for MangakaError {
    fn into_response(self) -> axum::response::Response {
        match self {
            MangakaError::BadRequest => {
                info!("Bad request received");
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Bad Request"));
                *response.status_mut() = axum::http::StatusCode::BAD_REQUEST;
                response
            }
            MangakaError::NotFound(what) => {
                info!("404 {what}");
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Not Found"));
                *response.status_mut() = axum::http::StatusCode::NOT_FOUND;
                response
            }
            MangakaError::Store(err) => {
                tracing::error!("Storage error: {}", err);
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Storage error"));
                *response.status_mut() = axum::http::StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
            MangakaError::Generation(err) => {
                tracing::error!("Image generation error: {}", err);
                let mut response = axum::response::Response::new(axum::body::Body::from(
                    "Image generation failed",
                ));
                *response.status_mut() = axum::http::StatusCode::BAD_GATEWAY;
                response
            }
            MangakaError::InternalServerError(message) => {
                tracing::error!("Internal server error: {}", message);
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Internal server error"));
                *response.status_mut() = axum::http::StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}
