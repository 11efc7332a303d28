//! Prompt-to-prompt audio interpolation over a spectrogram diffusion model.
//!
//! Given two prompt endpoints and a seed image, an [`Interpolator`] walks a
//! schedule of blend coefficients, asks an [`InterpolationModel`] for one clip
//! per coefficient and joins the clips into a single audio buffer. Model calls
//! are memoized in an [`InferenceCache`], so re-running a schedule with the
//! same inputs does not touch the model again.
//!
//! The model itself is a black box: implement [`InterpolationModel`] for your
//! pipeline and hand it to an [`Interpolator`], or to an
//! [`InterpolationEngine`] to run interpolations on a background thread.

mod audio;
mod cache;
mod config;
mod engine;
mod error;
mod interpolator;
mod model;
mod prompt;
mod schedule;
mod seed;

pub use audio::{AudioBuffer, AudioCodec, AudioFormat, AudioSegment, HoundCodec, concatenate};
pub use cache::{CacheKey, CacheStats, InferenceCache};
pub use config::{DEFAULT_CACHE_CAPACITY, DEFAULT_CHECKPOINT, Device, InterpolatorConfig};
pub use engine::{
    InterpolationEngine, InterpolationEngineResponse, InterpolationEngineResult,
    InterpolationEngineState, RunMetadata,
};
pub use error::{BoxedCause, Error, Result};
pub use interpolator::{
    InterpolationOutput, InterpolationParams, Interpolator, StepOutput, prepare_interpolation,
};
pub use model::{InferenceContext, InferenceResult, InterpolationModel};
pub use prompt::{
    DEFAULT_DENOISING, DEFAULT_GUIDANCE, DEFAULT_INFERENCE_STEPS, DEFAULT_SEED,
    InterpolationRequest, PromptEndpoint, REQUEST_SEED_IMAGE_ID, output_file_name,
};
pub use schedule::{
    DEFAULT_CURVE_EXPONENT, DEFAULT_STEP_COUNT, MAX_STEP_COUNT, MIN_STEP_COUNT, ScheduleConfig,
    format_alphas, generate,
};
pub use seed::{
    BUILTIN_SEED_IMAGES, CUSTOM_SEED_IMAGE, DEFAULT_SEED_IMAGE_DIR, RgbImage, SeedImage,
    SeedImageLoader, SeedSelection,
};
