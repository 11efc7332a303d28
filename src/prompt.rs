use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default generation seed of a prompt endpoint.
pub const DEFAULT_SEED: u64 = 42;
/// Default denoising strength of a prompt endpoint.
pub const DEFAULT_DENOISING: f32 = 0.75;
/// Default classifier-free guidance scale.
pub const DEFAULT_GUIDANCE: f32 = 7.0;
/// Default number of denoising steps per model run.
pub const DEFAULT_INFERENCE_STEPS: u32 = 50;

/// Seed image id placed in every request, whatever image actually seeds the run.
pub const REQUEST_SEED_IMAGE_ID: &str = "og_beat";

/// One end of an interpolation: the prompt and the knobs that go with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptEndpoint {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_text: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_denoising")]
    pub denoising: f32,
    #[serde(default = "default_guidance")]
    pub guidance: f32,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_denoising() -> f32 {
    DEFAULT_DENOISING
}

fn default_guidance() -> f32 {
    DEFAULT_GUIDANCE
}

impl PromptEndpoint {
    /// Creates an endpoint with default seed, denoising and guidance.
    ///
    /// Nothing is checked here. A blank prompt is rejected by [`Self::validate`],
    /// which `InterpolationParams::validate` runs before any model call.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            negative_text: None,
            seed: DEFAULT_SEED,
            denoising: DEFAULT_DENOISING,
            guidance: DEFAULT_GUIDANCE,
        }
    }

    pub fn with_negative_text(mut self, negative_text: impl Into<String>) -> Self {
        self.negative_text = Some(negative_text.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_denoising(mut self, denoising: f32) -> Self {
        self.denoising = denoising;
        self
    }

    pub fn with_guidance(mut self, guidance: f32) -> Self {
        self.guidance = guidance;
        self
    }

    /// Returns true when the prompt text is empty after trimming.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Validates the endpoint, `endpoint` names it in the error ("a" or "b").
    pub fn validate(&self, endpoint: &'static str) -> Result<()> {
        if self.is_blank() {
            return Err(Error::MissingPrompt { endpoint });
        }
        if !(0.0..=1.0).contains(&self.denoising) {
            return Err(Error::InvalidPrompt {
                endpoint,
                reason: format!("denoising must be in [0, 1], got {}", self.denoising),
            });
        }
        if !self.guidance.is_finite() {
            return Err(Error::InvalidPrompt {
                endpoint,
                reason: format!("guidance must be finite, got {}", self.guidance),
            });
        }
        Ok(())
    }
}

/// Input of a single model run at one point of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationRequest {
    pub alpha: f64,
    pub num_inference_steps: u32,
    pub seed_image_id: String,
    pub start: PromptEndpoint,
    pub end: PromptEndpoint,
}

impl InterpolationRequest {
    pub fn new(
        alpha: f64,
        num_inference_steps: u32,
        start: PromptEndpoint,
        end: PromptEndpoint,
    ) -> Self {
        Self {
            alpha,
            num_inference_steps,
            seed_image_id: REQUEST_SEED_IMAGE_ID.to_string(),
            start,
            end,
        }
    }
}

/// Builds the download name of a run, e.g. `church_bells_jazz.wav`.
pub fn output_file_name(start: &str, end: &str, extension: &str) -> String {
    format!(
        "{}_{}.{extension}",
        start.replace(' ', "_"),
        end.replace(' ', "_")
    )
}
