//! Source decoding.
//!
//! The pipeline only needs planar float PCM; turning file bytes into that is
//! the job of an [`AudioDecoder`] supplied by the host. In the browser the
//! platform decoder is used and PCM is handed over directly. With the
//! `decoders` feature the crate ships WAV and MP3 decoders of its own.

use crate::dsp::buffer::SampleBuffer;
use crate::error::DecodeError;

/// Turns encoded file bytes into a [`SampleBuffer`].
pub trait AudioDecoder {
    /// `hint` is the file extension, if known (without the dot).
    fn decode(&self, bytes: &[u8], hint: Option<&str>) -> Result<SampleBuffer, DecodeError>;
}

/// Extension of `file_name` in lower case, if it has one.
pub fn extension_hint(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains(['/', '\\']) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(feature = "decoders")]
pub use builtin::{AutoDecoder, Mp3Decoder, WavDecoder};

#[cfg(feature = "decoders")]
mod builtin {
    use std::io::Cursor;

    use super::AudioDecoder;
    use crate::dsp::buffer::SampleBuffer;
    use crate::error::DecodeError;

    /// PCM and IEEE-float WAV files via `hound`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WavDecoder;

    impl AudioDecoder for WavDecoder {
        fn decode(&self, bytes: &[u8], _hint: Option<&str>) -> Result<SampleBuffer, DecodeError> {
            let reader = hound::WavReader::new(Cursor::new(bytes))
                .map_err(|e| DecodeError::Malformed(e.to_string()))?;
            let spec = reader.spec();
            let channels = spec.channels as usize;

            let samples: Vec<f32> = match spec.sample_format {
                hound::SampleFormat::Float => reader
                    .into_samples::<f32>()
                    .collect::<Result<_, _>>()
                    .map_err(|e| DecodeError::Malformed(e.to_string()))?,
                hound::SampleFormat::Int => {
                    let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                    reader
                        .into_samples::<i32>()
                        .map(|s| s.map(|v| v as f32 * scale))
                        .collect::<Result<_, _>>()
                        .map_err(|e| DecodeError::Malformed(e.to_string()))?
                }
            };

            if samples.is_empty() {
                return Err(DecodeError::Empty);
            }
            tracing::debug!(
                channels,
                sample_rate = spec.sample_rate,
                bits = spec.bits_per_sample,
                frames = samples.len() / channels.max(1),
                "decoded WAV"
            );
            Ok(SampleBuffer::from_interleaved(&samples, channels, spec.sample_rate)?)
        }
    }

    /// MPEG layer III via `minimp3`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Mp3Decoder;

    impl AudioDecoder for Mp3Decoder {
        fn decode(&self, bytes: &[u8], _hint: Option<&str>) -> Result<SampleBuffer, DecodeError> {
            let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
            let mut interleaved: Vec<f32> = Vec::new();
            let mut format: Option<(usize, u32)> = None;
            let mut skipped = 0usize;

            loop {
                match decoder.next_frame() {
                    Ok(frame) => {
                        let layout = (frame.channels, frame.sample_rate as u32);
                        match format {
                            None => format = Some(layout),
                            // Streams that switch layout mid-file are cut at the switch.
                            Some(f) if f != layout => {
                                tracing::warn!(?f, ?layout, "MP3 stream changed format, truncating");
                                break;
                            }
                            Some(_) => {}
                        }
                        interleaved.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
                    }
                    Err(minimp3::Error::Eof) => break,
                    Err(minimp3::Error::SkippedData) => skipped += 1,
                    Err(minimp3::Error::InsufficientData) => break,
                    Err(e) => return Err(DecodeError::Malformed(e.to_string())),
                }
            }

            if skipped > 0 {
                tracing::warn!(skipped, "skipped undecodable MP3 data");
            }
            let (channels, sample_rate) = format.ok_or(DecodeError::Unsupported(Some("mp3".into())))?;
            if interleaved.is_empty() {
                return Err(DecodeError::Empty);
            }
            tracing::debug!(channels, sample_rate, frames = interleaved.len() / channels, "decoded MP3");
            Ok(SampleBuffer::from_interleaved(&interleaved, channels, sample_rate)?)
        }
    }

    /// Picks [`WavDecoder`] or [`Mp3Decoder`] from the leading bytes, falling
    /// back to the extension hint.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct AutoDecoder;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Container {
        Wav,
        Mp3,
    }

    fn sniff(bytes: &[u8], hint: Option<&str>) -> Option<Container> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Some(Container::Wav);
        }
        if bytes.starts_with(b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0) {
            return Some(Container::Mp3);
        }
        match hint {
            Some("wav" | "wave") => Some(Container::Wav),
            Some("mp3") => Some(Container::Mp3),
            _ => None,
        }
    }

    impl AudioDecoder for AutoDecoder {
        fn decode(&self, bytes: &[u8], hint: Option<&str>) -> Result<SampleBuffer, DecodeError> {
            match sniff(bytes, hint) {
                Some(Container::Wav) => WavDecoder.decode(bytes, hint),
                Some(Container::Mp3) => Mp3Decoder.decode(bytes, hint),
                None => Err(DecodeError::Unsupported(hint.map(str::to_owned))),
            }
        }
    }

}
