//! Stand-in for the diffusion pipeline: renders a sine tone per request whose
//! pitch glides between two prompt-dependent frequencies as alpha grows.

use kornia_image::{Image, ImageSize, allocator::CpuAllocator};
use kornia_riffuse::{
    AudioCodec, HoundCodec, InferenceContext, InferenceResult, InterpolationModel,
    InterpolationRequest, PromptEndpoint, SeedImage,
};

const SAMPLE_RATE: u32 = 44100;
const CLIP_SECONDS: f64 = 5.0;

#[derive(Debug, thiserror::Error)]
#[error("tone model: {0}")]
pub struct ToneError(String);

#[derive(Default)]
pub struct ToneModel;

fn pitch(endpoint: &PromptEndpoint) -> f64 {
    let hash = endpoint
        .text
        .bytes()
        .fold(endpoint.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    110.0 * 2f64.powf((hash % 24) as f64 / 12.0)
}

impl InterpolationModel for ToneModel {
    type Error = ToneError;

    fn run(
        &mut self,
        request: &InterpolationRequest,
        _seed_image: &SeedImage,
        context: &InferenceContext,
    ) -> Result<InferenceResult, Self::Error> {
        let freq =
            pitch(&request.start) * (1.0 - request.alpha) + pitch(&request.end) * request.alpha;
        let frames = (CLIP_SECONDS * SAMPLE_RATE as f64) as usize;
        let samples = (0..frames)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE as f64;
                (0.3 * (2.0 * std::f64::consts::PI * freq * t).sin()) as f32
            })
            .collect();

        let segment = kornia_riffuse::AudioSegment::new(samples, SAMPLE_RATE, 1)
            .map_err(|e| ToneError(e.to_string()))?;
        let audio = HoundCodec
            .encode(&segment, context.output_format)
            .map_err(|e| ToneError(e.to_string()))?;

        let level = (request.alpha * 255.0) as u8;
        let image = Image::new(
            ImageSize {
                width: 8,
                height: 8,
            },
            vec![level; 8 * 8 * 3],
            CpuAllocator,
        )
        .map_err(|e| ToneError(e.to_string()))?;

        Ok(InferenceResult { image, audio })
    }
}
