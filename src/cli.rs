//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_CONTROLNET_MODEL, DEFAULT_SD_URL};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "MANGAKA_DEBUG")]
    /// Enable debug logging. Env: MANGAKA_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "5004", env = "MANGAKA_PORT")]
    /// http listener, defaults to `5004`.
    /// Env: MANGAKA_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "MANGAKA_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: MANGAKA_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(
        long,
        short,
        default_value = "characters.json",
        env = "MANGAKA_CHARACTERS_FILE"
    )]
    /// Path to the character store, eg `/data/characters.json`.
    /// Env: MANGAKA_CHARACTERS_FILE
    pub characters_file: PathBuf,

    #[clap(long, default_value = "static", env = "MANGAKA_STATIC_DIR")]
    /// Directory holding generated assets, portraits land in `<dir>/profile_pics`.
    /// Env: MANGAKA_STATIC_DIR
    pub static_dir: PathBuf,

    #[clap(long, default_value = DEFAULT_SD_URL, env = "MANGAKA_SD_URL")]
    /// Base URL of the Stable Diffusion web API.
    /// Env: MANGAKA_SD_URL
    pub sd_url: String,

    #[clap(long, env = "MANGAKA_SD_TIMEOUT_SECS")]
    /// Timeout for image generation calls. Unset means wait forever.
    /// Env: MANGAKA_SD_TIMEOUT_SECS
    pub sd_timeout_secs: Option<u64>,

    #[clap(
        long,
        default_value = DEFAULT_CONTROLNET_MODEL,
        env = "MANGAKA_CONTROLNET_MODEL"
    )]
    /// ControlNet model used when a reference image is supplied.
    /// Env: MANGAKA_CONTROLNET_MODEL
    pub controlnet_model: String,
}

impl CliOptions {
    /// Backend timeout as a [Duration], if one was configured.
    pub fn sd_timeout(&self) -> Option<Duration> {
        self.sd_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
