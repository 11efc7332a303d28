//! MP3 decode via symphonia and encode via libmp3lame.
//!
//! Requires the `mp3` feature and `libmp3lame` to be installed on the system.

use std::io::Cursor;

use mp3lame_encoder::{Builder, FlushNoGap, InterleavedPcm, Quality};

use super::AudioSegment;
use crate::{Error, Result};

pub(super) fn decode(bytes: &[u8]) -> Result<AudioSegment> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;
    use symphonia::default::{get_codecs, get_probe};

    let media_source =
        MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");
    let probed = get_probe()
        .format(
            &hint,
            media_source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Audio(format!("MP3 probe failed: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| Error::Audio("no default audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Audio(format!("failed to create MP3 decoder: {e}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(err) => return Err(Error::Audio(format!("failed reading MP3 packets: {err}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(SymphoniaError::IoError(_)) => break,
            Err(err) => return Err(Error::Audio(format!("failed decoding MP3 packet: {err}"))),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        if channels == 0 {
            channels = spec.channels.count() as u16;
        }
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    AudioSegment::new(samples, sample_rate, channels)
}

/// Encodes at 192 kbps. Mono input is duplicated into both stereo channels.
pub(super) fn encode(segment: &AudioSegment) -> Result<Vec<u8>> {
    let stereo: Vec<f32> = match segment.channels() {
        2 => segment.samples().to_vec(),
        1 => segment.samples().iter().flat_map(|&s| [s, s]).collect(),
        n => {
            return Err(Error::Audio(format!(
                "MP3 encoder supports mono or stereo input, got {n} channels"
            )));
        }
    };

    let mut encoder = Builder::new()
        .ok_or_else(|| Error::Audio("failed to create LAME encoder".into()))?
        .with_num_channels(2)
        .map_err(|e| Error::Audio(format!("LAME set_num_channels failed: {e:?}")))?
        .with_sample_rate(segment.sample_rate())
        .map_err(|e| Error::Audio(format!("LAME set_sample_rate failed: {e:?}")))?
        .with_brate(mp3lame_encoder::Bitrate::Kbps192)
        .map_err(|e| Error::Audio(format!("LAME set_brate failed: {e:?}")))?
        .with_quality(Quality::Best)
        .map_err(|e| Error::Audio(format!("LAME set_quality failed: {e:?}")))?
        .build()
        .map_err(|e| Error::Audio(format!("LAME build failed: {e:?}")))?;

    let mut buf = Vec::new();
    buf.reserve(mp3lame_encoder::max_required_buffer_size(stereo.len() / 2));

    let encoded_size = encoder
        .encode(InterleavedPcm(&stereo), buf.spare_capacity_mut())
        .map_err(|e| Error::Audio(format!("LAME encode failed: {e:?}")))?;
    // SAFETY: encode filled exactly `encoded_size` bytes into spare capacity.
    unsafe { buf.set_len(encoded_size) };

    let flush_size = encoder
        .flush::<FlushNoGap>(buf.spare_capacity_mut())
        .map_err(|e| Error::Audio(format!("LAME flush failed: {e:?}")))?;
    // SAFETY: flush filled exactly `flush_size` bytes into spare capacity.
    unsafe { buf.set_len(buf.len() + flush_size) };

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioCodec, AudioFormat, HoundCodec};

    // encoder delay plus end padding stays well under this
    const MAX_PADDING_SECONDS: f64 = 0.1;

    fn sine(seconds: f64, sample_rate: u32, channels: u16) -> AudioSegment {
        let frames = (seconds * sample_rate as f64) as usize;
        let samples = (0..frames)
            .flat_map(|i| {
                let t = i as f32 / sample_rate as f32;
                let value = 0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
                std::iter::repeat_n(value, channels as usize)
            })
            .collect();
        AudioSegment::new(samples, sample_rate, channels).unwrap()
    }

    #[test]
    fn test_mono_round_trip() {
        let bytes = encode(&sine(1.0, 44100, 1)).unwrap();
        assert!(bytes[0] == 0xFF || bytes.starts_with(b"ID3"));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.channels(), 2);
        assert_eq!(decoded.sample_rate(), 44100);
        let padding = decoded.duration_seconds() - 1.0;
        assert!(padding > -0.01 && padding < MAX_PADDING_SECONDS, "{padding}");
    }

    #[test]
    fn test_rejects_surround() {
        assert!(matches!(encode(&sine(0.1, 44100, 3)), Err(Error::Audio(_))));
    }

    #[test]
    fn test_codec_joins_mp3_steps() {
        let codec = HoundCodec;
        let buffers = [0.5, 1.0, 0.75]
            .iter()
            .map(|&secs| codec.encode(&sine(secs, 44100, 2), AudioFormat::Mp3).unwrap())
            .collect::<Vec<_>>();

        let segments = buffers
            .iter()
            .map(|buffer| codec.decode(buffer.as_bytes(), buffer.format()).unwrap())
            .collect::<Vec<_>>();
        let parts: f64 = segments.iter().map(AudioSegment::duration_seconds).sum();

        let joined = codec.concatenate(segments).unwrap();
        assert!((joined.duration_seconds() - parts).abs() < 1e-9);

        let encoded = codec.encode(&joined, AudioFormat::Mp3).unwrap();
        assert_eq!(encoded.format(), AudioFormat::Mp3);
        let decoded = codec.decode(encoded.as_bytes(), AudioFormat::Mp3).unwrap();
        let padding = decoded.duration_seconds() - parts;
        assert!(padding > -0.01 && padding < MAX_PADDING_SECONDS, "{padding}");
    }
}
