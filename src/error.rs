use thiserror::Error;

/// Any failure that aborts a conversion. Every variant is terminal.
#[derive(Debug, Error)]
pub enum ReverbError {
    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),
    #[error("Invalid parameters: {0}")]
    Config(#[from] ConfigError),
    #[error("Rejected input: {0}")]
    Input(String),
}

/// Violations of the [`SampleBuffer`](crate::dsp::buffer::SampleBuffer) invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("buffer has no channels")]
    NoChannels,
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,
    #[error("channel {channel} has {found} frames, expected {expected}")]
    ChannelLength {
        channel: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported audio format{}", .0.as_deref().map(|h| format!(" ({h})")).unwrap_or_default())]
    Unsupported(Option<String>),
    #[error("malformed audio data: {0}")]
    Malformed(String),
    #[error("audio data contains no samples")]
    Empty,
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("buffer mismatch: {0}")]
    Mismatch(String),
    #[error("out of memory allocating {frames} frames")]
    OutOfMemory { frames: usize },
    #[error("convolution backend failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload of {bytes} bytes exceeds the RIFF size limit")]
    TooLarge { bytes: u64 },
    #[error("{0} channels cannot be stored in a WAV header")]
    TooManyChannels(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse parameters: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("`{name}` {reason}")]
    OutOfRange { name: &'static str, reason: String },
}

/// Try to allocate a zeroed vector, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed(frames: usize) -> Result<Vec<f32>, RenderError> {
    let mut v = Vec::new();
    v.try_reserve_exact(frames)
        .map_err(|_| RenderError::OutOfMemory { frames })?;
    v.resize(frames, 0.0);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_convert_into_reverb_error() {
        let e: ReverbError = DecodeError::Empty.into();
        assert!(matches!(e, ReverbError::Decode(DecodeError::Empty)));
        assert_eq!(e.to_string(), "Decoding failed: audio data contains no samples");

        let e: ReverbError = EncodeError::TooManyChannels(70000).into();
        assert!(e.to_string().contains("70000 channels"));
    }

    #[test]
    fn unsupported_mentions_hint() {
        let e = DecodeError::Unsupported(Some("ogg".into()));
        assert_eq!(e.to_string(), "unsupported audio format (ogg)");
        let e = DecodeError::Unsupported(None);
        assert_eq!(e.to_string(), "unsupported audio format");
    }

    #[test]
    fn try_zeroed_allocates_silence() {
        let v = try_zeroed(16).unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|&s| s == 0.0));
    }
}
