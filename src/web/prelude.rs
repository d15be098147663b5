pub(crate) use super::flash::{Flash, FlashMessage, set_flash, take_flash_message};
pub(crate) use crate::error::MangakaError;
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::extract::{Form, State};
pub(crate) use axum::response::{IntoResponse, Redirect, Response};
pub(crate) use serde::Deserialize;
pub(crate) use tower_sessions::Session;
pub(crate) use tracing::{debug, info, instrument, warn};
