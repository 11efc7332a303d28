use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    audio::AudioFormat,
    error::{Error, Result},
    seed::DEFAULT_SEED_IMAGE_DIR,
};

/// Model checkpoint used when none is configured.
pub const DEFAULT_CHECKPOINT: &str = "riffusion/riffusion-model-v1";

/// Number of inference results kept by the default cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Device the external engine runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
    Mps,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Mps => "mps",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda),
            "mps" => Ok(Device::Mps),
            other => Err(Error::Config(format!("unknown device: {other}"))),
        }
    }
}

/// Settings that stay fixed for the lifetime of an [`Interpolator`](crate::Interpolator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolatorConfig {
    pub checkpoint: String,
    pub device: Device,
    pub output_format: AudioFormat,
    pub seed_image_dir: PathBuf,
    pub cache_capacity: usize,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            checkpoint: DEFAULT_CHECKPOINT.to_string(),
            device: Device::default(),
            output_format: AudioFormat::default(),
            seed_image_dir: PathBuf::from(DEFAULT_SEED_IMAGE_DIR),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl InterpolatorConfig {
    pub fn with_checkpoint(mut self, checkpoint: impl Into<String>) -> Self {
        self.checkpoint = checkpoint.into();
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_output_format(mut self, output_format: AudioFormat) -> Self {
        self.output_format = output_format;
        self
    }

    pub fn with_seed_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.seed_image_dir = dir.into();
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_parse() {
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!(Device::Mps.to_string(), "mps");
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = InterpolatorConfig::default()
            .with_device(Device::Cuda)
            .with_output_format(AudioFormat::Mp3)
            .with_cache_capacity(8);
        assert_eq!(config.checkpoint, DEFAULT_CHECKPOINT);
        assert_eq!(config.device, Device::Cuda);
        assert_eq!(config.output_format, AudioFormat::Mp3);
        assert_eq!(config.cache_capacity, 8);
    }
}
