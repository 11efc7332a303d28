//! Audio segments, container formats and the codec seam.
//!
//! WAV is always available through `hound`. MP3 needs the `mp3` feature.

#[cfg(feature = "mp3")]
mod mp3;
mod wav;

use std::{
    fmt,
    fs::File,
    io::{self, Cursor},
    path::Path,
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Container format of an audio buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mp3",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "wav" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            other => Err(Error::Audio(format!("unknown audio format: {other}"))),
        }
    }
}

/// Encoded audio in a known container format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    format: AudioFormat,
    bytes: Vec<u8>,
}

impl AudioBuffer {
    pub fn new(format: AudioFormat, bytes: Vec<u8>) -> Self {
        Self { format, bytes }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A reader positioned at the start of the buffer.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.bytes.as_slice())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Writes the encoded clip to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        io::copy(&mut self.reader(), &mut file)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Decoded PCM audio: interleaved f32 samples in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(Error::Audio(format!(
                "invalid segment layout: {sample_rate} Hz, {channels} channel(s)"
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Error::Audio(format!(
                "{} samples do not divide into {channels} channel(s)",
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// A silent segment of the given length.
    pub fn silent(duration: Duration, sample_rate: u32, channels: u16) -> Result<Self> {
        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Appends `other` after `self`.
    ///
    /// A zero `crossfade` is a hard join. Otherwise the tail of `self` and the
    /// head of `other` overlap for that long with a linear blend, shortening the
    /// total by the overlap.
    pub fn append(&mut self, other: &AudioSegment, crossfade: Duration) -> Result<()> {
        if self.sample_rate != other.sample_rate || self.channels != other.channels {
            return Err(Error::Audio(format!(
                "cannot join {} Hz/{}ch with {} Hz/{}ch",
                self.sample_rate, self.channels, other.sample_rate, other.channels
            )));
        }

        let overlap = (crossfade.as_secs_f64() * self.sample_rate as f64).round() as usize;
        if overlap > self.frames() || overlap > other.frames() {
            return Err(Error::Audio(format!(
                "crossfade of {overlap} frames is longer than one of the segments"
            )));
        }

        let channels = self.channels as usize;
        let start = self.samples.len() - overlap * channels;
        for frame in 0..overlap {
            let fade_in = (frame + 1) as f32 / (overlap + 1) as f32;
            for ch in 0..channels {
                let i = frame * channels + ch;
                let tail = &mut self.samples[start + i];
                *tail = *tail * (1.0 - fade_in) + other.samples[i] * fade_in;
            }
        }
        self.samples
            .extend_from_slice(&other.samples[overlap * channels..]);
        Ok(())
    }
}

/// Joins segments in order with the given crossfade.
pub fn concatenate(
    segments: impl IntoIterator<Item = AudioSegment>,
    crossfade: Duration,
) -> Result<AudioSegment> {
    let mut segments = segments.into_iter();
    let mut joined = segments
        .next()
        .ok_or_else(|| Error::Audio("nothing to concatenate".to_string()))?;
    for segment in segments {
        joined.append(&segment, crossfade)?;
    }
    Ok(joined)
}

/// Decodes, encodes and joins audio for one container format family.
pub trait AudioCodec {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<AudioSegment>;

    fn encode(&self, segment: &AudioSegment, format: AudioFormat) -> Result<AudioBuffer>;

    /// Hard-joins segments in order, no blending at the boundaries.
    fn concatenate(&self, segments: Vec<AudioSegment>) -> Result<AudioSegment> {
        concatenate(segments, Duration::ZERO)
    }
}

/// Codec backed by `hound` for WAV, plus LAME/symphonia for MP3 with the `mp3` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoundCodec;

impl AudioCodec for HoundCodec {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<AudioSegment> {
        match format {
            AudioFormat::Wav => wav::decode(bytes),
            #[cfg(feature = "mp3")]
            AudioFormat::Mp3 => mp3::decode(bytes),
            #[cfg(not(feature = "mp3"))]
            AudioFormat::Mp3 => Err(Error::UnsupportedFormat(format)),
        }
    }

    fn encode(&self, segment: &AudioSegment, format: AudioFormat) -> Result<AudioBuffer> {
        let bytes = match format {
            AudioFormat::Wav => wav::encode(segment)?,
            #[cfg(feature = "mp3")]
            AudioFormat::Mp3 => mp3::encode(segment)?,
            #[cfg(not(feature = "mp3"))]
            AudioFormat::Mp3 => return Err(Error::UnsupportedFormat(format)),
        };
        Ok(AudioBuffer::new(format, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: f64, sample_rate: u32, value: f32) -> AudioSegment {
        let frames = (seconds * sample_rate as f64) as usize;
        AudioSegment::new(vec![value; frames], sample_rate, 1).unwrap()
    }

    #[test]
    fn test_concat_sums_durations() {
        let segments = vec![tone(0.5, 8000, 0.1), tone(1.25, 8000, 0.2), tone(2.0, 8000, 0.3)];
        let joined = concatenate(segments, Duration::ZERO).unwrap();
        assert!((joined.duration_seconds() - 3.75).abs() < 1e-9);
        assert_eq!(joined.samples()[0], 0.1);
        assert_eq!(joined.samples()[4000], 0.2);
        assert_eq!(*joined.samples().last().unwrap(), 0.3);
    }

    #[test]
    fn test_silent_duration() {
        let silence = AudioSegment::silent(Duration::from_millis(250), 16000, 2).unwrap();
        assert_eq!(silence.frames(), 4000);
        assert_eq!(silence.samples().len(), 8000);
        assert!((silence.duration_seconds() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_crossfade_overlaps() {
        let mut a = tone(1.0, 1000, 1.0);
        let b = tone(1.0, 1000, 0.0);
        a.append(&b, Duration::from_millis(100)).unwrap();
        assert_eq!(a.frames(), 1900);
        assert!(a.samples()[899] > 0.9);
        assert!(a.samples()[950] < 1.0 && a.samples()[950] > 0.0);
        assert_eq!(a.samples()[1000], 0.0);
    }

    #[test]
    fn test_crossfade_too_long() {
        let mut a = tone(0.1, 1000, 1.0);
        let b = tone(1.0, 1000, 0.0);
        assert!(matches!(
            a.append(&b, Duration::from_millis(500)),
            Err(Error::Audio(_))
        ));
    }

    #[test]
    fn test_layout_mismatch() {
        let mut a = tone(0.1, 8000, 0.0);
        let b = tone(0.1, 16000, 0.0);
        assert!(a.append(&b, Duration::ZERO).is_err());
        assert!(concatenate(Vec::new(), Duration::ZERO).is_err());
        assert!(AudioSegment::new(vec![0.0; 3], 8000, 2).is_err());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("wav".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert_eq!(".MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert!("flac".parse::<AudioFormat>().is_err());
        assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mp3");
    }

    #[test]
    fn test_codec_concat_round_trip() {
        let codec = HoundCodec;
        let buffers = [0.25, 0.5, 0.75]
            .iter()
            .map(|&secs| codec.encode(&tone(secs, 22050, 0.5), AudioFormat::Wav).unwrap())
            .collect::<Vec<_>>();

        let segments = buffers
            .iter()
            .map(|buffer| codec.decode(buffer.as_bytes(), buffer.format()).unwrap())
            .collect();
        let joined = codec.concatenate(segments).unwrap();
        let encoded = codec.encode(&joined, AudioFormat::Wav).unwrap();
        let decoded = codec.decode(encoded.as_bytes(), AudioFormat::Wav).unwrap();
        assert!((decoded.duration_seconds() - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_buffer_reads_from_start() {
        let buffer = HoundCodec
            .encode(&tone(0.1, 8000, 0.25), AudioFormat::Wav)
            .unwrap();
        let mut reader = buffer.reader();
        assert_eq!(reader.position(), 0);

        let mut bytes = Vec::new();
        io::Read::read_to_end(&mut reader, &mut bytes).unwrap();
        assert_eq!(bytes, buffer.as_bytes());
        assert!(bytes.starts_with(b"RIFF"));
    }

    #[test]
    fn test_buffer_save() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = AudioBuffer::new(AudioFormat::Wav, vec![1, 2, 3]);

        let path = dir.path().join("clip.wav");
        buffer.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);

        let missing = dir.path().join("no-such-dir").join("clip.wav");
        assert!(matches!(buffer.save(missing), Err(Error::Io(_))));
    }

    #[cfg(not(feature = "mp3"))]
    #[test]
    fn test_mp3_unsupported_without_feature() {
        let codec = HoundCodec;
        assert!(matches!(
            codec.encode(&tone(0.1, 8000, 0.0), AudioFormat::Mp3),
            Err(Error::UnsupportedFormat(AudioFormat::Mp3))
        ));
    }
}
