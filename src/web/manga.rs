//! Manga panel generation and refinement.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use serde_json::json;

use super::prelude::*;
use super::views::MangaTemplate;
use crate::constants::{DEFAULT_CONTROL_STRENGTH, DEFAULT_DENOISING_STRENGTH};
use crate::prompt::compose_story_prompt;
use crate::sdapi::{
    GenerationError, ReferenceImage, decode_base64_image, normalize_image_to_png, png_data_uri,
};

/// ControlNet accepts weights up to 2.
const MAX_CONTROL_STRENGTH: f32 = 2.0;

#[derive(Deserialize)]
pub(crate) struct MangaForm {
    #[serde(default)]
    story_prompt: String,
    #[serde(default)]
    control_strength: String,
}

#[derive(Deserialize)]
pub(crate) struct RefineForm {
    #[serde(default)]
    image: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    denoising_strength: String,
}

#[derive(Deserialize)]
pub(crate) struct ApiMangaRequest {
    #[serde(default)]
    story_prompt: String,
    /// base64 or a data URI
    #[serde(default)]
    reference_image: Option<String>,
    #[serde(default)]
    control_strength: Option<f32>,
}

/// What a manga request boils down to, whichever way it was posted.
#[derive(Debug, Default)]
struct MangaInput {
    story_prompt: String,
    reference_image: Option<Vec<u8>>,
    control_strength: Option<f32>,
}

fn parse_strength(value: &str) -> Option<f32> {
    value.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

impl MangaInput {
    fn from_form(form: MangaForm) -> Self {
        Self {
            story_prompt: form.story_prompt,
            reference_image: None,
            control_strength: parse_strength(&form.control_strength),
        }
    }

    /// Reads the form fields. Errors cover truncated bodies and uploads over
    /// the route's body limit.
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut input = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            match field_name.as_str() {
                "story_prompt" => {
                    input.story_prompt = field.text().await?;
                }
                "control_strength" => {
                    let value = field.text().await?;
                    input.control_strength = parse_strength(&value);
                }
                "reference_image" => {
                    let bytes = field.bytes().await?;
                    // browsers send an empty part when no file was picked
                    if !bytes.is_empty() {
                        input.reference_image = Some(bytes.to_vec());
                    }
                }
                _ => {}
            }
        }
        Ok(input)
    }

    fn reference(&self) -> Result<Option<ReferenceImage>, GenerationError> {
        let Some(bytes) = self.reference_image.as_deref() else {
            return Ok(None);
        };
        Ok(Some(ReferenceImage {
            png: normalize_image_to_png(bytes)?,
            strength: self
                .control_strength
                .unwrap_or(DEFAULT_CONTROL_STRENGTH)
                .clamp(0.0, MAX_CONTROL_STRENGTH),
        }))
    }
}

/// Composes the story prompt and renders it. Returns the composed prompt too.
async fn render_panel(
    state: &AppState,
    story_prompt: &str,
    reference: Option<&ReferenceImage>,
) -> Result<(String, Vec<u8>), GenerationError> {
    let characters = state.store.list().await;
    let prompt = compose_story_prompt(story_prompt, &characters);
    debug!("Composed manga prompt: {}", prompt);
    let png = state.sd.txt2img(&prompt, reference).await?;
    Ok((prompt, png))
}

/// handles /generate_manga POST, urlencoded or multipart with a reference image
#[instrument(skip_all)]
pub(crate) async fn generate_manga_handler(
    State(state): State<AppState>,
    session: Session,
    request: Request,
) -> Result<Response, MangakaError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let input = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|_| MangakaError::BadRequest)?;
        match MangaInput::from_multipart(multipart).await {
            Ok(input) => input,
            Err(err) => {
                warn!(
                    "Couldn't read manga upload ({}): {}",
                    err.status(),
                    err.body_text()
                );
                set_flash(&session, Flash::MangaGenerationFailed(err.body_text())).await?;
                return Ok(Redirect::to("/").into_response());
            }
        }
    } else {
        let Form(form) = Form::<MangaForm>::from_request(request, &state)
            .await
            .map_err(|_| MangakaError::BadRequest)?;
        MangaInput::from_form(form)
    };

    let story_prompt = input.story_prompt.trim();
    if story_prompt.is_empty() {
        set_flash(&session, Flash::StoryRequired).await?;
        return Ok(Redirect::to("/").into_response());
    }

    let result = match input.reference() {
        Ok(reference) => render_panel(&state, story_prompt, reference.as_ref()).await,
        Err(err) => Err(err),
    };
    match result {
        Ok((prompt, png)) => Ok(MangaTemplate {
            manga_image: png_data_uri(&png),
            prompt,
            refined: false,
        }
        .into_response()),
        Err(err) => {
            warn!("Manga generation failed: {}", err);
            set_flash(&session, Flash::MangaGenerationFailed(err.to_string())).await?;
            Ok(Redirect::to("/").into_response())
        }
    }
}

/// handles /refine_manga POST, an img2img pass over a generated panel
#[instrument(skip_all, fields(denoising_strength = %form.denoising_strength))]
pub(crate) async fn refine_manga_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RefineForm>,
) -> Result<Response, MangakaError> {
    if form.image.trim().is_empty() {
        set_flash(&session, Flash::RefineImageRequired).await?;
        return Ok(Redirect::to("/").into_response());
    }
    let denoising_strength =
        parse_strength(&form.denoising_strength).unwrap_or(DEFAULT_DENOISING_STRENGTH);
    let prompt = form.prompt.trim();

    let result = match decode_base64_image(&form.image).and_then(|raw| normalize_image_to_png(&raw))
    {
        Ok(init_png) => state.sd.img2img(&init_png, prompt, denoising_strength).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(png) => Ok(MangaTemplate {
            manga_image: png_data_uri(&png),
            prompt: prompt.to_string(),
            refined: true,
        }
        .into_response()),
        Err(err) => {
            warn!("Manga refinement failed: {}", err);
            set_flash(&session, Flash::RefineFailed(err.to_string())).await?;
            Ok(Redirect::to("/").into_response())
        }
    }
}

/// handles /api/generate_manga POST, same as the form but JSON in and out
#[instrument(skip_all)]
pub(crate) async fn api_generate_manga_handler(
    State(state): State<AppState>,
    payload: Result<Json<ApiMangaRequest>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Rejected API request: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };
    let story_prompt = body.story_prompt.trim();
    if story_prompt.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": Flash::StoryRequired.message().text})),
        )
            .into_response();
    }

    let reference_image = match body.reference_image.as_deref().map(decode_base64_image) {
        Some(Ok(bytes)) => Some(bytes),
        Some(Err(err)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Invalid reference image: {err}")})),
            )
                .into_response();
        }
        None => None,
    };
    let input = MangaInput {
        story_prompt: story_prompt.to_string(),
        reference_image,
        control_strength: body.control_strength,
    };
    let reference = match input.reference() {
        Ok(reference) => reference,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Invalid reference image: {err}")})),
            )
                .into_response();
        }
    };

    match render_panel(&state, story_prompt, reference.as_ref()).await {
        Ok((prompt, png)) => (
            StatusCode::OK,
            Json(json!({"image": png_data_uri(&png), "prompt": prompt})),
        )
            .into_response(),
        Err(err) => {
            warn!("Manga generation failed: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": Flash::MangaGenerationFailed(err.to_string()).message().text
                })),
            )
                .into_response()
        }
    }
}
