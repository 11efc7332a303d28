//! In-memory WAV decode/encode.

use std::io::Cursor;

use super::AudioSegment;
use crate::Result;

/// Decodes a WAV byte buffer, integer samples are scaled into [-1, 1].
pub(super) fn decode(bytes: &[u8]) -> Result<AudioSegment> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    AudioSegment::new(samples, spec.sample_rate, spec.channels)
}

/// Encodes a segment as 32-bit float WAV.
pub(super) fn encode(segment: &AudioSegment) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: segment.channels(),
        sample_rate: segment.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &s in segment.samples() {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}
