//! Shared constants for generation and storage
//!

/// Where the original app expected its Stable Diffusion web UI.
pub const DEFAULT_SD_URL: &str = "http://127.0.0.1:7870";

/// Text-to-image endpoint, relative to the backend base URL.
pub const TXT2IMG_PATH: &str = "sdapi/v1/txt2img";

/// Image-to-image endpoint, relative to the backend base URL.
pub const IMG2IMG_PATH: &str = "sdapi/v1/img2img";

/// Sampling steps for every generation call.
pub const SAMPLING_STEPS: u32 = 30;

/// Classifier-free guidance scale.
pub const CFG_SCALE: f32 = 7.5;

/// Output width in pixels.
pub const IMAGE_WIDTH: u32 = 512;

/// Output height in pixels.
pub const IMAGE_HEIGHT: u32 = 512;

/// Sampler name as the web UI knows it.
pub const SAMPLER_INDEX: &str = "Euler a";

/// How far img2img may drift from the input when refining.
pub const DEFAULT_DENOISING_STRENGTH: f32 = 0.5;

/// Preprocessor run over reference images before conditioning.
pub const CONTROLNET_MODULE: &str = "canny";

/// Default ControlNet model for edge-guided panels.
pub const DEFAULT_CONTROLNET_MODEL: &str = "control_v11p_sd15_canny";

/// How the reference image is fitted to the output size.
pub const CONTROLNET_RESIZE_MODE: &str = "Crop and Resize";

/// Preprocessor resolution.
pub const CONTROLNET_PROCESSOR_RES: u32 = 512;

/// Canny low threshold.
pub const CONTROLNET_THRESHOLD_A: u32 = 100;

/// Canny high threshold.
pub const CONTROLNET_THRESHOLD_B: u32 = 200;

/// Conditioning weight when the form doesn't give one.
pub const DEFAULT_CONTROL_STRENGTH: f32 = 1.0;

/// Subdirectory of the static dir holding portraits.
pub const PROFILE_PICS_DIR: &str = "profile_pics";

/// URL prefix portraits are served under.
pub const PROFILE_PICS_URL: &str = "/static/profile_pics";

/// Prefix for inline PNG images.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// How long an idle session (and its pending flash message) is kept.
pub const SESSION_IDLE_MINUTES: i64 = 60;

/// Request body cap for routes that accept reference or panel images.
pub const IMAGE_UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;
