//! WAV encoder — writes a SampleBuffer as canonical 16-bit PCM RIFF/WAVE.

use super::buffer::SampleBuffer;
use crate::error::EncodeError;

pub const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// Convert one float sample to 16-bit PCM.
///
/// Clamped to [-1, 1], negatives scaled by 32768 and non-negatives by
/// 32767, then truncated toward zero.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        // NaN lands here and casts to 0.
        (s * 32767.0) as i16
    }
}

/// Encode `buffer` to a WAV file, interleaving frame by frame.
pub fn encode(buffer: &SampleBuffer) -> Result<Vec<u8>, EncodeError> {
    let channels = u16::try_from(buffer.channel_count())
        .map_err(|_| EncodeError::TooManyChannels(buffer.channel_count()))?;
    let frames = buffer.frames();
    let sample_rate = buffer.sample_rate();

    let block_align = channels as u32 * (BITS_PER_SAMPLE as u32 / 8);
    let data_bytes = frames as u64 * block_align as u64;
    let too_large = || EncodeError::TooLarge { bytes: data_bytes };
    let data_size = u32::try_from(data_bytes).map_err(|_| too_large())?;
    let file_size = data_size.checked_add(36).ok_or_else(too_large)?;
    let byte_rate = sample_rate
        .checked_mul(block_align)
        .ok_or_else(too_large)?;
    // More than 32767 channels overflows the 16-bit block align.
    let block_align = u16::try_from(block_align)
        .map_err(|_| EncodeError::TooManyChannels(buffer.channel_count()))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for i in 0..frames {
        for ch in buffer.channels() {
            buf.extend_from_slice(&sample_to_i16(ch[i]).to_le_bytes());
        }
    }

    tracing::debug!(frames, channels, sample_rate, bytes = buf.len(), "encoded WAV");
    Ok(buf)
}
