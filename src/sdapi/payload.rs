//! Request and response bodies for the `sdapi/v1` endpoints.

use serde::{Deserialize, Serialize};

use crate::constants::{
    CFG_SCALE, CONTROLNET_MODULE, CONTROLNET_PROCESSOR_RES, CONTROLNET_RESIZE_MODE,
    CONTROLNET_THRESHOLD_A, CONTROLNET_THRESHOLD_B, IMAGE_HEIGHT, IMAGE_WIDTH, SAMPLER_INDEX,
    SAMPLING_STEPS,
};

/// Body for `POST sdapi/v1/txt2img`.
#[derive(Clone, Debug, Serialize)]
pub struct Txt2ImgRequest<'a> {
    /// Positive prompt.
    pub prompt: &'a str,
    /// Sampling steps.
    pub steps: u32,
    /// Guidance scale.
    pub cfg_scale: f32,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Sampler name.
    pub sampler_index: &'a str,
    /// Extension scripts, only ControlNet is ever set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alwayson_scripts: Option<AlwaysOnScripts>,
}

impl<'a> Txt2ImgRequest<'a> {
    /// A request with the fixed sampling parameters and no conditioning.
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            steps: SAMPLING_STEPS,
            cfg_scale: CFG_SCALE,
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
            sampler_index: SAMPLER_INDEX,
            alwayson_scripts: None,
        }
    }

    /// Attaches a single ControlNet unit.
    pub fn with_controlnet(mut self, unit: ControlNetUnit) -> Self {
        self.alwayson_scripts = Some(AlwaysOnScripts {
            controlnet: ControlNetScript { args: vec![unit] },
        });
        self
    }
}

/// Body for `POST sdapi/v1/img2img`.
#[derive(Clone, Debug, Serialize)]
pub struct Img2ImgRequest<'a> {
    /// Base64 PNGs to start from, we only ever send one.
    pub init_images: Vec<String>,
    /// Positive prompt.
    pub prompt: &'a str,
    /// Sampling steps.
    pub steps: u32,
    /// Guidance scale.
    pub cfg_scale: f32,
    /// 0 keeps the input, 1 ignores it.
    pub denoising_strength: f32,
    /// Sampler name.
    pub sampler_index: &'a str,
}

impl<'a> Img2ImgRequest<'a> {
    /// A refinement pass over `init_image` (already base64 encoded).
    pub fn new(init_image: String, prompt: &'a str, denoising_strength: f32) -> Self {
        Self {
            init_images: vec![init_image],
            prompt,
            steps: SAMPLING_STEPS,
            cfg_scale: CFG_SCALE,
            denoising_strength: denoising_strength.clamp(0.0, 1.0),
            sampler_index: SAMPLER_INDEX,
        }
    }
}

/// `alwayson_scripts` object.
#[derive(Clone, Debug, Serialize)]
pub struct AlwaysOnScripts {
    /// ControlNet extension arguments.
    pub controlnet: ControlNetScript,
}

/// `alwayson_scripts.controlnet` object.
#[derive(Clone, Debug, Serialize)]
pub struct ControlNetScript {
    /// One entry per ControlNet unit.
    pub args: Vec<ControlNetUnit>,
}

/// A ControlNet unit, edge-detects the reference and conditions on the edges.
#[derive(Clone, Debug, Serialize)]
pub struct ControlNetUnit {
    /// Base64 PNG reference image.
    pub input_image: String,
    /// Preprocessor.
    pub module: String,
    /// ControlNet model name as installed on the backend.
    pub model: String,
    /// Conditioning strength.
    pub weight: f32,
    /// How the reference is fitted to the output size.
    pub resize_mode: String,
    /// Preprocessor resolution.
    pub processor_res: u32,
    /// Low edge threshold.
    pub threshold_a: u32,
    /// High edge threshold.
    pub threshold_b: u32,
}

impl ControlNetUnit {
    /// Canny-conditioned unit for `input_image`.
    pub fn canny(input_image: String, model: &str, weight: f32) -> Self {
        Self {
            input_image,
            module: CONTROLNET_MODULE.to_string(),
            model: model.to_string(),
            weight,
            resize_mode: CONTROLNET_RESIZE_MODE.to_string(),
            processor_res: CONTROLNET_PROCESSOR_RES,
            threshold_a: CONTROLNET_THRESHOLD_A,
            threshold_b: CONTROLNET_THRESHOLD_B,
        }
    }
}

/// What both endpoints return. Other fields (`parameters`, `info`) are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct GenerationResponse {
    #[serde(default)]
    pub(crate) images: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn txt2img_without_reference_omits_scripts() {
        let body = serde_json::to_value(Txt2ImgRequest::new("a cat")).expect("serialize");
        assert_eq!(
            body,
            json!({
                "prompt": "a cat",
                "steps": 30,
                "cfg_scale": 7.5,
                "width": 512,
                "height": 512,
                "sampler_index": "Euler a",
            })
        );
    }

    #[test]
    fn txt2img_with_reference_nests_controlnet_args() {
        let request = Txt2ImgRequest::new("a cat")
            .with_controlnet(ControlNetUnit::canny("AAAA".to_string(), "cn-model", 0.5));
        let body = serde_json::to_value(request).expect("serialize");
        let unit = &body["alwayson_scripts"]["controlnet"]["args"][0];
        assert_eq!(unit["input_image"], "AAAA");
        assert_eq!(unit["module"], "canny");
        assert_eq!(unit["model"], "cn-model");
        assert_eq!(unit["weight"], 0.5);
        assert_eq!(unit["threshold_a"], 100);
        assert_eq!(unit["threshold_b"], 200);
    }

    #[test]
    fn img2img_clamps_denoising() {
        let request = Img2ImgRequest::new("AAAA".to_string(), "sharper", 3.0);
        assert_eq!(request.denoising_strength, 1.0);
        let body = serde_json::to_value(request).expect("serialize");
        assert_eq!(body["init_images"], json!(["AAAA"]));
        assert_eq!(body["sampler_index"], "Euler a");
    }

    #[test]
    fn response_without_images_is_empty() {
        let parsed: GenerationResponse =
            serde_json::from_str(r#"{"info": "{}"}"#).expect("deserialize");
        assert!(parsed.images.is_empty());
    }
}
