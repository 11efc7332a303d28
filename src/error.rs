use crate::audio::AudioFormat;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by an [`InterpolationModel`](crate::InterpolationModel).
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by schedule generation, orchestration and audio assembly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The step count or curve exponent is out of range.
    #[error("invalid schedule config: {0}")]
    InvalidScheduleConfig(String),

    /// A prompt endpoint has blank text.
    #[error("prompt {endpoint} is empty, enter both prompts to interpolate between them")]
    MissingPrompt { endpoint: &'static str },

    /// A prompt endpoint carries an out of range field.
    #[error("invalid prompt {endpoint}: {reason}")]
    InvalidPrompt {
        endpoint: &'static str,
        reason: String,
    },

    /// "custom" was selected but no image was supplied.
    #[error("custom seed image selected but no image was supplied")]
    MissingSeedImage,

    /// The named seed image is not part of the built-in asset set.
    #[error("seed image asset not found: {0}")]
    AssetNotFound(String),

    /// The inference engine failed at the given schedule step.
    #[error("inference failed at step {step_index}: {cause}")]
    InferenceStepFailed {
        step_index: usize,
        #[source]
        cause: BoxedCause,
    },

    /// The run was cancelled before every step completed.
    #[error("interpolation cancelled after {completed_steps} step(s)")]
    Cancelled { completed_steps: usize },

    /// Audio decode, encode or concatenation failure.
    #[error("audio: {0}")]
    Audio(String),

    /// The codec cannot handle the requested container format.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(AudioFormat),

    /// Seed image decoding failure.
    #[error("image: {0}")]
    Image(String),

    /// Invalid runtime configuration.
    #[error("config: {0}")]
    Config(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for Error {
    fn from(error: hound::Error) -> Self {
        Error::Audio(error.to_string())
    }
}
