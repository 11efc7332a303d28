//! Prompt-to-prompt interpolation runs.
//!
//! A run walks the coefficient schedule, asks the model for one clip per
//! coefficient (through the cache) and hard-joins the clips in schedule order.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    audio::{AudioBuffer, AudioCodec, HoundCodec},
    cache::{CacheKey, InferenceCache},
    config::InterpolatorConfig,
    error::{Error, Result},
    model::{InferenceContext, InferenceResult, InterpolationModel},
    prompt::{DEFAULT_INFERENCE_STEPS, InterpolationRequest, PromptEndpoint},
    schedule::{ScheduleConfig, format_alphas},
    seed::{SeedImageLoader, SeedSelection},
};

/// Everything that varies between two interpolation runs.
#[derive(Debug, Clone)]
pub struct InterpolationParams {
    pub schedule: ScheduleConfig,
    pub start: PromptEndpoint,
    pub end: PromptEndpoint,
    pub seed_image: SeedSelection,
    pub num_inference_steps: u32,
}

impl InterpolationParams {
    pub fn new(start: PromptEndpoint, end: PromptEndpoint) -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            start,
            end,
            seed_image: SeedSelection::default(),
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
        }
    }

    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_seed_image(mut self, seed_image: SeedSelection) -> Self {
        self.seed_image = seed_image;
        self
    }

    pub fn with_inference_steps(mut self, num_inference_steps: u32) -> Self {
        self.num_inference_steps = num_inference_steps;
        self
    }

    /// Checks everything that can be checked without touching the disk.
    pub fn validate(&self) -> Result<()> {
        self.start.validate("a")?;
        self.end.validate("b")?;
        self.schedule.validate()?;
        if self.num_inference_steps == 0 {
            return Err(Error::InvalidScheduleConfig(
                "inference steps must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The requests of a run, one per coefficient, in schedule order.
    pub fn requests(&self) -> Result<Vec<InterpolationRequest>> {
        self.validate()?;
        Ok(self
            .schedule
            .alphas()?
            .into_iter()
            .map(|alpha| {
                InterpolationRequest::new(
                    alpha,
                    self.num_inference_steps,
                    self.start.clone(),
                    self.end.clone(),
                )
            })
            .collect())
    }
}

/// Output of one schedule step.
pub struct StepOutput {
    pub index: usize,
    pub request: InterpolationRequest,
    pub result: Arc<InferenceResult>,
    pub cache_hit: bool,
    pub duration_seconds: f64,
}

/// Output of a finished run.
pub struct InterpolationOutput {
    pub steps: Vec<StepOutput>,
    /// The joined clip in the configured container format.
    pub audio: AudioBuffer,
    pub duration_seconds: f64,
}

impl InterpolationOutput {
    pub fn alphas(&self) -> Vec<f64> {
        self.steps.iter().map(|step| step.request.alpha).collect()
    }
}

/// Runs interpolations against a model, memoizing every model call.
pub struct Interpolator<M: InterpolationModel, C: AudioCodec = HoundCodec> {
    model: M,
    codec: C,
    cache: Arc<InferenceCache>,
    loader: SeedImageLoader,
    context: InferenceContext,
}

impl<M: InterpolationModel> Interpolator<M> {
    /// Creates an interpolator with its own cache and the WAV/MP3 codec.
    pub fn new(model: M, config: InterpolatorConfig) -> Self {
        Self {
            model,
            codec: HoundCodec,
            cache: Arc::new(InferenceCache::with_capacity(config.cache_capacity)),
            loader: SeedImageLoader::new(config.seed_image_dir.clone()),
            context: InferenceContext::from(&config),
        }
    }
}

impl<M: InterpolationModel, C: AudioCodec> Interpolator<M, C> {
    /// Swaps in a shared cache, e.g. one owned by the process.
    pub fn with_cache(mut self, cache: Arc<InferenceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_codec<C2: AudioCodec>(self, codec: C2) -> Interpolator<M, C2> {
        Interpolator {
            model: self.model,
            codec,
            cache: self.cache,
            loader: self.loader,
            context: self.context,
        }
    }

    pub fn cache(&self) -> &Arc<InferenceCache> {
        &self.cache
    }

    pub fn context(&self) -> &InferenceContext {
        &self.context
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Runs a full interpolation.
    pub fn run(&mut self, params: &InterpolationParams) -> Result<InterpolationOutput> {
        self.run_with_cancel(params, &AtomicBool::new(false))
    }

    /// Runs a full interpolation, giving up between steps once `cancel` is set.
    ///
    /// Nothing is returned for a cancelled or failed run, completed steps stay
    /// in the cache.
    pub fn run_with_cancel(
        &mut self,
        params: &InterpolationParams,
        cancel: &AtomicBool,
    ) -> Result<InterpolationOutput> {
        let requests = params.requests()?;
        let seed_image = self.loader.resolve(&params.seed_image)?;

        log::debug!(
            "Interpolating {:?} -> {:?} over alphas {} with seed image {}",
            params.start.text,
            params.end.text,
            format_alphas(&requests.iter().map(|r| r.alpha).collect::<Vec<_>>()),
            seed_image.name(),
        );

        let total = requests.len();
        let mut steps = Vec::with_capacity(total);
        let mut segments = Vec::with_capacity(total);

        for (index, request) in requests.into_iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                log::warn!("Interpolation cancelled at step {}/{}", index + 1, total);
                return Err(Error::Cancelled {
                    completed_steps: index,
                });
            }

            let key = CacheKey::new(&request, &seed_image, &self.context);
            let (result, cache_hit) = self
                .cache
                .get_or_try_insert_with(key, || {
                    self.model.run(&request, &seed_image, &self.context)
                })
                .map_err(|e| Error::InferenceStepFailed {
                    step_index: index,
                    cause: Box::new(e),
                })?;

            if result.audio.format() != self.context.output_format {
                return Err(Error::Audio(format!(
                    "step {index} returned {} audio in a {} run",
                    result.audio.format(),
                    self.context.output_format
                )));
            }
            let segment = self
                .codec
                .decode(result.audio.as_bytes(), result.audio.format())?;

            log::debug!(
                "({}/{}) alpha={:.2} {:.3}s{}",
                index + 1,
                total,
                request.alpha,
                segment.duration_seconds(),
                if cache_hit { " (cached)" } else { "" },
            );

            steps.push(StepOutput {
                index,
                duration_seconds: segment.duration_seconds(),
                request,
                result,
                cache_hit,
            });
            segments.push(segment);
        }

        if cancel.load(Ordering::Relaxed) {
            log::warn!("Interpolation cancelled before assembly");
            return Err(Error::Cancelled {
                completed_steps: total,
            });
        }

        let joined = self.codec.concatenate(segments)?;
        let duration_seconds = joined.duration_seconds();
        let audio = self.codec.encode(&joined, self.context.output_format)?;

        log::info!(
            "Interpolated {} step(s) into {:.3}s of {} audio",
            total,
            duration_seconds,
            audio.format()
        );

        Ok(InterpolationOutput {
            steps,
            audio,
            duration_seconds,
        })
    }
}

/// One-shot entry point: interpolates with a fresh interpolator and returns the clip.
pub fn prepare_interpolation<M: InterpolationModel>(
    model: M,
    config: InterpolatorConfig,
    params: &InterpolationParams,
) -> Result<AudioBuffer> {
    Interpolator::new(model, config)
        .run(params)
        .map(|output| output.audio)
}
