//! In-process stand-in for a Stable Diffusion backend.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use super::encode_base64;

/// What the fake backend answers every request with.
#[derive(Clone, Debug)]
pub(crate) enum FakeReply {
    /// `{"images": [<tiny png>]}`
    Image,
    /// An empty body with this status.
    Status(u16),
    /// This JSON with a 200.
    Json(Value),
    /// This text with a 200.
    Raw(&'static str),
}

#[derive(Clone)]
struct FakeState {
    reply: FakeReply,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

/// A running fake backend and the requests it has seen.
#[derive(Clone)]
pub(crate) struct FakeBackend {
    pub(crate) url: String,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeBackend {
    /// Binds an ephemeral port and serves `reply` on the sdapi endpoints.
    pub(crate) async fn spawn(reply: FakeReply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            reply,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/sdapi/v1/txt2img", axum::routing::post(handle))
            .route("/sdapi/v1/img2img", axum::routing::post(handle))
            .layer(DefaultBodyLimit::disable())
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}"),
            requests,
        }
    }

    /// Requests received so far as `(path, json body)`.
    pub(crate) fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

async fn handle(State(state): State<FakeState>, uri: Uri, Json(body): Json<Value>) -> Response {
    state
        .requests
        .lock()
        .expect("requests lock")
        .push((uri.path().to_string(), body));

    match state.reply {
        FakeReply::Image => Json(json!({
            "images": [encode_base64(&tiny_png())],
            "parameters": {},
            "info": "{}",
        }))
        .into_response(),
        FakeReply::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        FakeReply::Json(value) => Json(value).into_response(),
        FakeReply::Raw(text) => text.into_response(),
    }
}

/// A 2x2 PNG.
pub(crate) fn tiny_png() -> Vec<u8> {
    encode_tiny(image::ImageFormat::Png)
}

/// A 2x2 JPEG.
pub(crate) fn tiny_jpeg() -> Vec<u8> {
    encode_tiny(image::ImageFormat::Jpeg)
}

/// A `side` x `side` PNG of pseudo-random pixels, so it barely compresses.
pub(crate) fn noisy_png(side: u32) -> Vec<u8> {
    let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
    let image = image::RgbImage::from_fn(side, side, |_, _| {
        // splitmix64
        seed = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = seed;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        let [r, g, b, ..] = (z ^ (z >> 31)).to_le_bytes();
        image::Rgb([r, g, b])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode noisy image");
    out.into_inner()
}

fn encode_tiny(format: image::ImageFormat) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        2,
        2,
        image::Rgb([200, 40, 40]),
    ));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).expect("encode tiny image");
    out.into_inner()
}
