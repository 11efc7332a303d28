use crate::{
    audio::{AudioBuffer, AudioFormat},
    config::{Device, InterpolatorConfig},
    prompt::InterpolationRequest,
    seed::{RgbImage, SeedImage},
};

/// Run-wide settings handed to the model with every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InferenceContext {
    pub checkpoint: String,
    pub device: Device,
    pub output_format: AudioFormat,
}

impl From<&InterpolatorConfig> for InferenceContext {
    fn from(config: &InterpolatorConfig) -> Self {
        Self {
            checkpoint: config.checkpoint.clone(),
            device: config.device,
            output_format: config.output_format,
        }
    }
}

/// Output of one model run: the generated spectrogram image and its audio.
pub struct InferenceResult {
    pub image: RgbImage,
    pub audio: AudioBuffer,
}

/// Trait for the diffusion pipeline that turns one interpolation request into
/// a spectrogram image and the audio reconstructed from it.
///
/// Implementations are expected to be deterministic for identical arguments,
/// results are memoized on that assumption.
pub trait InterpolationModel {
    /// The error type that can be returned during inference.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs inference for `request`, seeded by `seed_image`.
    fn run(
        &mut self,
        request: &InterpolationRequest,
        seed_image: &SeedImage,
        context: &InferenceContext,
    ) -> Result<InferenceResult, Self::Error>;
}
