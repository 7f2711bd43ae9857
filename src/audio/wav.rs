//! Canonical 16-bit mono PCM WAV encoding
//!
//! Both length fields are known before the first sample is written, so the
//! container is produced in one forward pass with no backpatching.

use std::io::Cursor;
use std::time::Duration;

use super::AudioError;

/// Size of the RIFF/fmt/data header written by [`encode_wav`]
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Encode mono f32 samples as a 16-bit PCM WAV container.
///
/// Samples are clamped to [-1.0, 1.0] first. Fails with
/// [`AudioError::InvalidParameter`] for a zero sample rate or when the
/// header length fields would not fit in 32 bits.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    if sample_rate == 0 {
        return Err(AudioError::InvalidParameter(
            "sample rate must be positive".to_string(),
        ));
    }

    let block_align = CHANNELS * BYTES_PER_SAMPLE;
    let byte_rate = sample_rate.checked_mul(block_align as u32).ok_or_else(|| {
        AudioError::InvalidParameter(format!("sample rate {} is too large", sample_rate))
    })?;

    let data_len = samples
        .len()
        .checked_mul(BYTES_PER_SAMPLE as usize)
        .and_then(|len| u32::try_from(len).ok())
        .filter(|len| len.checked_add(WAV_HEADER_LEN as u32 - 8).is_some())
        .ok_or_else(|| {
            AudioError::InvalidParameter(format!(
                "{} samples do not fit in a WAV container",
                samples.len()
            ))
        })?;
    let riff_len = data_len + (WAV_HEADER_LEN as u32 - 8);

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt subchunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data subchunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }

    debug_assert_eq!(out.len(), WAV_HEADER_LEN + data_len as usize);
    Ok(out)
}

/// Convert one f32 sample to 16-bit PCM.
///
/// Negative values scale by 32768 and the rest by 32767, so -1.0 and 1.0 map
/// to `i16::MIN` and `i16::MAX`. The cast truncates toward zero; NaN becomes 0.
pub fn sample_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Header summary of a WAV container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Samples per channel
    pub sample_count: u32,
}

impl WavInfo {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_count as f64 / self.sample_rate as f64)
    }
}

/// Parse a container's header with hound.
pub fn inspect_wav(bytes: &[u8]) -> Result<WavInfo, AudioError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AudioError::InvalidContainer(e.to_string()))?;
    let spec = reader.spec();

    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        sample_count: reader.duration(),
    })
}
