//! Hall impulse response — exponentially decaying filtered noise.
//!
//! Each channel is pre-delay silence followed by white noise under an
//! exponential envelope, softened by an air-absorption low-pass. The right
//! channel is offset by a few milliseconds to decorrelate the stereo image.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::buffer::{frame_count, SampleBuffer};
use super::filter::OnePoleLowpass;
use crate::error::{try_zeroed, RenderError};

/// Envelope exponent: `exp(-6.9)` is roughly -60 dB at the end of the tail.
const DECAY_EXPONENT: f32 = 6.9;
/// Air-absorption cutoff.
const AIR_CUTOFF_HZ: f64 = 9500.0;
const AIR_DRY: f32 = 0.4;
const AIR_WET: f32 = 0.6;
/// Offset of the second channel's tail.
const DECORRELATION_SECONDS: f64 = 0.006;
/// Peak of each IR channel after synthesis.
pub const IR_PEAK: f32 = 0.88;

/// A synthesized stereo impulse response, read-only once built.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    buffer: SampleBuffer,
    predelay_frames: usize,
}

impl ImpulseResponse {
    /// Wrap an externally supplied stereo response, e.g. a measured hall.
    pub fn from_buffer(buffer: SampleBuffer) -> Result<Self, RenderError> {
        if buffer.channel_count() != 2 {
            return Err(RenderError::Mismatch(format!(
                "impulse response must be stereo, got {} channels",
                buffer.channel_count()
            )));
        }
        let predelay_frames = (0..buffer.frames())
            .take_while(|&i| buffer.channels().iter().all(|ch| ch[i] == 0.0))
            .count();
        Ok(Self {
            buffer,
            predelay_frames,
        })
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        self.buffer.channel(index)
    }

    pub fn frames(&self) -> usize {
        self.buffer.frames()
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    /// Leading silent frames.
    pub fn predelay_frames(&self) -> usize {
        self.predelay_frames
    }

}

/// Frame counts `(pre-delay, total)` of an IR for the given settings.
pub fn ir_length(
    sample_rate: u32,
    decay_seconds: f64,
    predelay_ms: f64,
) -> Result<(usize, usize), RenderError> {
    let sr = sample_rate as f64;
    let pd = frame_count((sr * predelay_ms / 1000.0).floor()).ok_or_else(|| {
        RenderError::InvalidParameter {
            name: "predelay_ms",
            reason: format!("{predelay_ms} ms does not fit in memory at {sample_rate} Hz"),
        }
    })?;
    let total = frame_count((sr * decay_seconds).floor())
        .and_then(|tail| tail.checked_add(pd))
        .ok_or_else(|| RenderError::InvalidParameter {
            name: "decay_seconds",
            reason: format!("{decay_seconds} s does not fit in memory at {sample_rate} Hz"),
        })?;
    Ok((pd, total))
}

/// Build a stereo hall IR. `seed` makes the noise reproducible.
pub fn synthesize(
    sample_rate: u32,
    decay_seconds: f64,
    predelay_ms: f64,
    seed: Option<u64>,
) -> Result<ImpulseResponse, RenderError> {
    if sample_rate == 0 {
        return Err(RenderError::InvalidParameter {
            name: "sample_rate",
            reason: "must be greater than zero".into(),
        });
    }
    if !decay_seconds.is_finite() || decay_seconds < 0.0 {
        return Err(RenderError::InvalidParameter {
            name: "decay_seconds",
            reason: format!("{decay_seconds} is not a valid duration"),
        });
    }
    if !predelay_ms.is_finite() || predelay_ms < 0.0 {
        return Err(RenderError::InvalidParameter {
            name: "predelay_ms",
            reason: format!("{predelay_ms} is not a valid delay"),
        });
    }

    let (pd, total) = ir_length(sample_rate, decay_seconds, predelay_ms)?;
    let tail = total - pd;
    let shift = (sample_rate as f64 * DECORRELATION_SECONDS).floor() as usize;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut channels = Vec::with_capacity(2);
    for ch in 0..2 {
        let mut data = try_zeroed(total)?;
        let tail_data = &mut data[pd..];

        for (i, s) in tail_data.iter_mut().enumerate() {
            let envelope = (-DECAY_EXPONENT * i as f32 / tail as f32).exp();
            *s = rng.gen_range(-1.0f32..1.0) * envelope;
        }

        OnePoleLowpass::new(AIR_CUTOFF_HZ, sample_rate as f64)
            .process_blend(tail_data, AIR_DRY, AIR_WET);

        if ch == 1 {
            decorrelate(tail_data, shift);
        }

        normalize_channel(&mut data, IR_PEAK);
        channels.push(data);
    }

    tracing::debug!(
        sample_rate,
        predelay_frames = pd,
        frames = total,
        seeded = seed.is_some(),
        "synthesized hall impulse response"
    );

    Ok(ImpulseResponse {
        buffer: SampleBuffer::new(channels, sample_rate)?,
        predelay_frames: pd,
    })
}

/// Move the tail `shift` samples later, leaving silence at its start.
fn decorrelate(tail: &mut [f32], shift: usize) {
    let shift = shift.min(tail.len());
    tail.copy_within(..tail.len() - shift, shift);
    tail[..shift].fill(0.0);
}

fn normalize_channel(data: &mut [f32], peak_target: f32) {
    let peak = data.iter().fold(0.0f32, |p, s| p.max(s.abs()));
    if peak > 0.0 {
        for s in data.iter_mut() {
            *s = *s / peak * peak_target;
        }
    }
}
