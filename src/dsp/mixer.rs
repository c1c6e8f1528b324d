//! Mix graph — sums the dry path and the convolved wet path into a stereo bus.
//!
//! ```text
//! source ─┬─ × dry ───────────────────────────────┐
//!         └─ pre-delay ─ convolve(IR) ─ × wet ─────┴─ × master ─ bus
//! ```

use super::buffer::{frame_count, SampleBuffer};
use super::convolver::{convolve_with, normalization_scale, ConvolutionBackend};
use super::impulse::ImpulseResponse;
use crate::error::{try_zeroed, RenderError};
use crate::params::EffectParameters;
use crate::progress::{ProgressSink, Stage, RENDER_SPAN_PERCENT, RENDER_START_PERCENT};

/// Frames rendered for a source of `frames`: the source plus `tail_seconds`
/// of reverb tail, rounded up.
pub fn render_length(
    frames: usize,
    sample_rate: u32,
    tail_seconds: f64,
) -> Result<usize, RenderError> {
    // ceil((frames / sr + tail) * sr), with the integer part kept exact.
    frame_count((tail_seconds * sample_rate as f64).ceil())
        .and_then(|tail| frames.checked_add(tail))
        .ok_or_else(|| RenderError::InvalidParameter {
            name: "tail_seconds",
            reason: format!("{tail_seconds} s does not fit in memory at {sample_rate} Hz"),
        })
}

/// A copy of `buffer` with `frames` of silence inserted at the start.
pub fn delay(buffer: &SampleBuffer, frames: usize) -> Result<SampleBuffer, RenderError> {
    let mut channels = Vec::with_capacity(buffer.channel_count());
    for ch in buffer.channels() {
        let len = frames
            .checked_add(ch.len())
            .ok_or(RenderError::OutOfMemory { frames: usize::MAX })?;
        let mut delayed = try_zeroed(len)?;
        delayed[frames..].copy_from_slice(ch);
        channels.push(delayed);
    }
    Ok(SampleBuffer::new(channels, buffer.sample_rate())?)
}

/// The dry/wet/master summing stage.
pub struct MixGraph<'a> {
    params: &'a EffectParameters,
    backend: &'a dyn ConvolutionBackend,
}

impl<'a> MixGraph<'a> {
    pub fn new(params: &'a EffectParameters, backend: &'a dyn ConvolutionBackend) -> Self {
        Self { params, backend }
    }

    /// Render `source` through the graph. The result is stereo and
    /// [`render_length`] frames long.
    pub fn render(
        &self,
        source: SampleBuffer,
        ir: &ImpulseResponse,
        progress: &mut dyn ProgressSink,
    ) -> Result<SampleBuffer, RenderError> {
        let sample_rate = source.sample_rate();
        let source = source.to_stereo();
        let total = render_length(source.frames(), sample_rate, self.params.tail_seconds)?;
        let pd = self.params.predelay_frames(sample_rate);

        let ir_scale = if self.params.normalize_ir {
            normalization_scale(ir)
        } else {
            1.0
        };

        let delayed = delay(&source, pd)?;
        let channel_count = delayed.channel_count();
        let wet = convolve_with(delayed, ir, self.backend, |c| {
            let done = (c + 1) as f32 / channel_count as f32;
            progress.report(RENDER_START_PERCENT + RENDER_SPAN_PERCENT * done, Stage::Rendering);
        })?;

        let dry_gain = self.params.dry_gain;
        let wet_gain = self.params.wet_gain * ir_scale;
        let master = self.params.master_gain;

        let mut bus = Vec::with_capacity(2);
        for (dry, wet) in source.channels().iter().zip(wet.channels()) {
            let mut out = try_zeroed(total)?;
            for (o, &d) in out.iter_mut().zip(dry) {
                *o = d * dry_gain;
            }
            for (o, &w) in out.iter_mut().zip(wet) {
                *o += w * wet_gain;
            }
            for o in out.iter_mut() {
                *o *= master;
            }
            bus.push(out);
        }

        tracing::debug!(
            frames = total,
            source_frames = source.frames(),
            wet_frames = wet.frames(),
            ir_scale,
            backend = self.backend.name(),
            "mixed dry and wet paths"
        );

        Ok(SampleBuffer::new(bus, sample_rate)?)
    }
}
