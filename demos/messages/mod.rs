use kornia_riffuse::PromptEndpoint;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterpolationRequest {
    pub start: PromptEndpoint,
    pub end: PromptEndpoint,
    pub steps: usize,
    pub alpha_power: f64,
    pub inference_steps: u32,
    pub seed_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_image_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterpolationResponse {
    pub id: u64,
    pub prompt_a: String,
    pub prompt_b: String,
    pub alphas: Vec<f64>,
    pub duration: Duration,
    pub audio_seconds: f64,
    pub output_path: PathBuf,
}
