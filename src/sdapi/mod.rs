//! Client for Stable Diffusion web UIs speaking the AUTOMATIC1111 `sdapi/v1` API.

use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use tracing::{debug, instrument};
use url::Url;

use crate::constants::{
    DEFAULT_CONTROLNET_MODEL, IMG2IMG_PATH, PNG_DATA_URI_PREFIX, TXT2IMG_PATH,
};

#[cfg(test)]
pub(crate) mod fake;
pub mod payload;

use payload::{ControlNetUnit, GenerationResponse, Img2ImgRequest, Txt2ImgRequest};

/// How much of an error body we keep around for messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Everything that can go wrong talking to the image backend.
#[derive(Debug)]
pub enum GenerationError {
    /// The configured base URL doesn't parse.
    InvalidUrl(url::ParseError),
    /// Connection, timeout or client setup failure.
    Request(reqwest::Error),
    /// The backend answered with a non-success status.
    Status(reqwest::StatusCode, String),
    /// The body wasn't the JSON we expected.
    Decode(serde_json::Error),
    /// The response had no usable entry in `images`.
    MissingImage,
    /// The image wasn't valid base64.
    Base64(base64::DecodeError),
    /// The decoded bytes aren't an image we can read.
    InvalidImage(String),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(err) => write!(f, "Invalid image backend URL: {err}"),
            Self::Request(err) => write!(f, "Image backend request failed: {err}"),
            Self::Status(status, body) if body.is_empty() => {
                write!(f, "Image backend returned {status}")
            }
            Self::Status(status, body) => write!(f, "Image backend returned {status}: {body}"),
            Self::Decode(err) => write!(f, "Image backend sent malformed JSON: {err}"),
            Self::MissingImage => write!(f, "Image backend response contained no image"),
            Self::Base64(err) => write!(f, "Image data is not valid base64: {err}"),
            Self::InvalidImage(reason) => write!(f, "Image data could not be read: {reason}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Request(err)
    }
}

impl From<url::ParseError> for GenerationError {
    fn from(err: url::ParseError) -> Self {
        GenerationError::InvalidUrl(err)
    }
}

/// A reference image for ControlNet conditioning.
#[derive(Clone, Debug)]
pub struct ReferenceImage {
    /// PNG bytes of the reference.
    pub png: Vec<u8>,
    /// Conditioning weight.
    pub strength: f32,
}

/// Handle to one image generation backend.
#[derive(Clone, Debug)]
pub struct SdClient {
    client: reqwest::Client,
    base_url: Url,
    controlnet_model: String,
}

impl SdClient {
    /// Builds a client for `base_url`. With no timeout, calls wait as long as
    /// the backend takes.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, GenerationError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            controlnet_model: DEFAULT_CONTROLNET_MODEL.to_string(),
        })
    }

    /// Uses `model` for reference-image conditioning.
    pub fn with_controlnet_model(mut self, model: &str) -> Self {
        self.controlnet_model = model.to_string();
        self
    }

    /// The backend base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Renders `prompt`, optionally conditioned on `reference`, returning PNG bytes.
    #[instrument(skip_all, fields(controlnet = reference.is_some()))]
    pub async fn txt2img(
        &self,
        prompt: &str,
        reference: Option<&ReferenceImage>,
    ) -> Result<Vec<u8>, GenerationError> {
        let mut request = Txt2ImgRequest::new(prompt);
        if let Some(reference) = reference {
            request = request.with_controlnet(ControlNetUnit::canny(
                encode_base64(&reference.png),
                &self.controlnet_model,
                reference.strength,
            ));
        }
        self.post(TXT2IMG_PATH, &request).await
    }

    /// Runs a refinement pass over `init_png`, returning PNG bytes.
    #[instrument(skip(self, init_png, prompt))]
    pub async fn img2img(
        &self,
        init_png: &[u8],
        prompt: &str,
        denoising_strength: f32,
    ) -> Result<Vec<u8>, GenerationError> {
        let request = Img2ImgRequest::new(encode_base64(init_png), prompt, denoising_strength);
        self.post(IMG2IMG_PATH, &request).await
    }

    async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Vec<u8>, GenerationError> {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);
        let resp = self.client.post(url).json(body).send().await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body: String = String::from_utf8_lossy(&bytes)
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(GenerationError::Status(status, body.trim().to_string()));
        }

        let parsed: GenerationResponse =
            serde_json::from_slice(&bytes).map_err(GenerationError::Decode)?;
        let first = parsed
            .images
            .into_iter()
            .next()
            .filter(|image| !image.trim().is_empty())
            .ok_or(GenerationError::MissingImage)?;

        let decoded = decode_base64_image(&first)?;
        normalize_image_to_png(&decoded)
    }
}

/// Standard base64 without a data URI prefix.
pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Wraps PNG bytes in a `data:image/png;base64,` URI.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("{PNG_DATA_URI_PREFIX}{}", encode_base64(png))
}

/// Decodes base64 image data, with or without a `data:...;base64,` prefix.
pub fn decode_base64_image(data: &str) -> Result<Vec<u8>, GenerationError> {
    let data = data.trim();
    let payload = match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, payload)| payload)
            .ok_or_else(|| GenerationError::InvalidImage("data URI is not base64".to_string()))?,
        None => data,
    };
    general_purpose::STANDARD
        .decode(payload)
        .map_err(GenerationError::Base64)
}

/// Ensures image bytes are a valid PNG, converting if possible.
pub fn normalize_image_to_png(bytes: &[u8]) -> Result<Vec<u8>, GenerationError> {
    if bytes.len() < 4 {
        debug!("Image is too short");
        return Err(GenerationError::InvalidImage("image is empty".to_string()));
    }

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| GenerationError::InvalidImage(err.to_string()))?;
    let format = reader.format();
    let image = reader
        .decode()
        .map_err(|err| GenerationError::InvalidImage(err.to_string()))?;

    if format == Some(image::ImageFormat::Png) {
        return Ok(bytes.to_vec());
    }

    let mut output = Cursor::new(Vec::new());
    image
        .write_to(&mut output, image::ImageFormat::Png)
        .map_err(|err| GenerationError::InvalidImage(err.to_string()))?;
    Ok(output.into_inner())
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeBackend, FakeReply, tiny_jpeg, tiny_png};
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = SdClient::new("http://localhost:7860/sd", None).expect("client");
        assert_eq!(client.base_url().as_str(), "http://localhost:7860/sd/");
        assert_eq!(
            client.base_url().join(TXT2IMG_PATH).expect("join").as_str(),
            "http://localhost:7860/sd/sdapi/v1/txt2img"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(matches!(
            SdClient::new("not a url", None),
            Err(GenerationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn data_uri_round_trip() {
        let png = tiny_png();
        let uri = png_data_uri(&png);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_base64_image(&uri).expect("decode"), png);
        assert!(decode_base64_image("data:image/png,rawbytes").is_err());
        assert!(matches!(
            decode_base64_image("***"),
            Err(GenerationError::Base64(_))
        ));
    }

    #[test]
    fn normalize_converts_jpeg_and_rejects_garbage() {
        let png = tiny_png();
        assert_eq!(normalize_image_to_png(&png).expect("png"), png);

        let converted = normalize_image_to_png(&tiny_jpeg()).expect("jpeg");
        assert_eq!(
            image::guess_format(&converted).expect("format"),
            image::ImageFormat::Png
        );

        assert!(normalize_image_to_png(&[]).is_err());
        assert!(normalize_image_to_png(b"This is not an image.").is_err());
    }

    #[tokio::test]
    async fn txt2img_returns_decoded_png() {
        let backend = FakeBackend::spawn(FakeReply::Image).await;
        let client = SdClient::new(&backend.url, None).expect("client");

        let png = client.txt2img("a quiet street", None).await.expect("txt2img");
        assert_eq!(png, tiny_png());

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "/sdapi/v1/txt2img");
        assert_eq!(requests[0].1["prompt"], "a quiet street");
        assert!(requests[0].1.get("alwayson_scripts").is_none());
    }

    #[tokio::test]
    async fn txt2img_forwards_reference_image() {
        let backend = FakeBackend::spawn(FakeReply::Image).await;
        let client = SdClient::new(&backend.url, None)
            .expect("client")
            .with_controlnet_model("my-canny");
        let reference = ReferenceImage {
            png: tiny_png(),
            strength: 0.8,
        };

        client
            .txt2img("a duel", Some(&reference))
            .await
            .expect("txt2img");

        let requests = backend.requests();
        let unit = &requests[0].1["alwayson_scripts"]["controlnet"]["args"][0];
        assert_eq!(unit["model"], "my-canny");
        assert_eq!(unit["input_image"], encode_base64(&tiny_png()).as_str());
    }

    #[tokio::test]
    async fn img2img_posts_init_image() {
        let backend = FakeBackend::spawn(FakeReply::Image).await;
        let client = SdClient::new(&backend.url, None).expect("client");

        client
            .img2img(&tiny_png(), "cleaner lines", 0.4)
            .await
            .expect("img2img");

        let requests = backend.requests();
        assert_eq!(requests[0].0, "/sdapi/v1/img2img");
        assert_eq!(requests[0].1["init_images"][0], encode_base64(&tiny_png()).as_str());
        assert_eq!(requests[0].1["prompt"], "cleaner lines");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let backend = FakeBackend::spawn(FakeReply::Status(500)).await;
        let client = SdClient::new(&backend.url, None).expect("client");
        let err = client.txt2img("x", None).await.expect_err("should fail");
        assert!(matches!(err, GenerationError::Status(status, _) if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn missing_images_field_is_reported() {
        let backend =
            FakeBackend::spawn(FakeReply::Json(serde_json::json!({"info": "nothing"}))).await;
        let client = SdClient::new(&backend.url, None).expect("client");
        let err = client.txt2img("x", None).await.expect_err("should fail");
        assert!(matches!(err, GenerationError::MissingImage));
    }

    #[tokio::test]
    async fn malformed_json_is_reported() {
        let backend = FakeBackend::spawn(FakeReply::Raw("<html>oops</html>")).await;
        let client = SdClient::new(&backend.url, None).expect("client");
        let err = client.txt2img("x", None).await.expect_err("should fail");
        assert!(matches!(err, GenerationError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_request_error() {
        let client = SdClient::new("http://127.0.0.1:1", None).expect("client");
        let err = client.txt2img("x", None).await.expect_err("should fail");
        assert!(matches!(err, GenerationError::Request(_)));
    }
}
