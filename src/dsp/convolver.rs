//! Convolution engine — applies an impulse response to a signal.
//!
//! The backend is injected so hosts can swap in their own implementation.
//! [`FftConvolver`] is the default; [`DirectConvolver`] is the O(n·m)
//! reference used for validation and very short kernels.

use realfft::RealFftPlanner;

use super::buffer::SampleBuffer;
use super::impulse::ImpulseResponse;
use crate::error::{try_zeroed, RenderError};

/// Smallest FFT block used by [`FftConvolver`].
const MIN_FFT_SIZE: usize = 4096;

/// Equal-power IR calibration, as applied by browser convolvers.
const GAIN_CALIBRATION: f64 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
const MIN_POWER: f64 = 0.000125;

/// Full linear convolution of one channel: output length is
/// `signal.len() + kernel.len() - 1`, or empty if either input is empty.
pub trait ConvolutionBackend: Send + Sync {
    fn convolve(&self, signal: &[f32], kernel: &[f32]) -> Result<Vec<f32>, RenderError>;

    fn name(&self) -> &'static str;
}

/// Uniformly partitioned overlap-add convolution on real FFTs.
#[derive(Debug, Clone, Default)]
pub struct FftConvolver;

impl ConvolutionBackend for FftConvolver {
    fn convolve(&self, signal: &[f32], kernel: &[f32]) -> Result<Vec<f32>, RenderError> {
        if signal.is_empty() || kernel.is_empty() {
            return Ok(Vec::new());
        }
        let n = signal.len();
        let m = kernel.len();
        let fft_size = (2 * m.next_power_of_two()).max(MIN_FFT_SIZE);
        let block = fft_size - m + 1;

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);
        let backend_err = |e: realfft::FftError| RenderError::Backend(e.to_string());

        // Kernel spectrum, computed once.
        let mut input = fft.make_input_vec();
        let mut fwd_scratch = fft.make_scratch_vec();
        let mut kernel_spec = fft.make_output_vec();
        input[..m].copy_from_slice(kernel);
        fft.process_with_scratch(&mut input, &mut kernel_spec, &mut fwd_scratch)
            .map_err(backend_err)?;

        let mut spec = fft.make_output_vec();
        let mut time = ifft.make_output_vec();
        let mut inv_scratch = ifft.make_scratch_vec();
        let mut output = try_zeroed(n + m - 1)?;
        // realfft's inverse is unnormalized.
        let norm = 1.0 / fft_size as f32;
        let last = spec.len() - 1;

        for start in (0..n).step_by(block) {
            let end = (start + block).min(n);
            input.fill(0.0);
            input[..end - start].copy_from_slice(&signal[start..end]);
            fft.process_with_scratch(&mut input, &mut spec, &mut fwd_scratch)
                .map_err(backend_err)?;

            for (s, k) in spec.iter_mut().zip(&kernel_spec) {
                *s *= *k;
            }
            spec[0].im = 0.0;
            spec[last].im = 0.0;

            ifft.process_with_scratch(&mut spec, &mut time, &mut inv_scratch)
                .map_err(backend_err)?;

            let valid = end - start + m - 1;
            for (o, t) in output[start..start + valid].iter_mut().zip(&time[..valid]) {
                *o += t * norm;
            }
        }

        Ok(output)
    }

    fn name(&self) -> &'static str {
        "fft-overlap-add"
    }
}

/// Direct time-domain convolution.
#[derive(Debug, Clone, Default)]
pub struct DirectConvolver;

impl ConvolutionBackend for DirectConvolver {
    fn convolve(&self, signal: &[f32], kernel: &[f32]) -> Result<Vec<f32>, RenderError> {
        if signal.is_empty() || kernel.is_empty() {
            return Ok(Vec::new());
        }
        let mut output = try_zeroed(signal.len() + kernel.len() - 1)?;
        for (i, &x) in signal.iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            for (o, &h) in output[i..].iter_mut().zip(kernel) {
                *o += x * h;
            }
        }
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Convolve channel `c` of `signal` with channel `c` of `ir`.
pub fn convolve(
    signal: SampleBuffer,
    ir: &ImpulseResponse,
    backend: &dyn ConvolutionBackend,
) -> Result<SampleBuffer, RenderError> {
    convolve_with(signal, ir, backend, |_| {})
}

/// [`convolve`], calling `on_channel(index)` after each channel finishes.
pub fn convolve_with(
    signal: SampleBuffer,
    ir: &ImpulseResponse,
    backend: &dyn ConvolutionBackend,
    mut on_channel: impl FnMut(usize),
) -> Result<SampleBuffer, RenderError> {
    if signal.sample_rate() != ir.sample_rate() {
        return Err(RenderError::Mismatch(format!(
            "signal is {} Hz but impulse response is {} Hz",
            signal.sample_rate(),
            ir.sample_rate()
        )));
    }
    if signal.channel_count() != ir.buffer().channel_count() {
        return Err(RenderError::Mismatch(format!(
            "signal has {} channels but impulse response has {}",
            signal.channel_count(),
            ir.buffer().channel_count()
        )));
    }

    let sample_rate = signal.sample_rate();
    let mut wet = Vec::with_capacity(signal.channel_count());
    for (c, channel) in signal.into_channels().into_iter().enumerate() {
        wet.push(backend.convolve(&channel, ir.channel(c))?);
        on_channel(c);
    }
    Ok(SampleBuffer::new(wet, sample_rate)?)
}

/// Gain that brings `ir` to a calibrated equal-power level.
pub fn normalization_scale(ir: &ImpulseResponse) -> f32 {
    let buffer = ir.buffer();
    let count = (buffer.channel_count() * buffer.frames()) as f64;
    let energy: f64 = buffer
        .channels()
        .iter()
        .flat_map(|ch| ch.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let mut power = (energy / count).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }
    let scale = GAIN_CALIBRATION / power * GAIN_CALIBRATION_SAMPLE_RATE / buffer.sample_rate() as f64;
    scale as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::impulse::synthesize;

    fn assert_close(a: &[f32], b: &[f32], tol: f32) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() <= tol, "sample {i}: {x} vs {y}");
        }
    }

    #[test]
    fn direct_known_result() {
        let out = DirectConvolver.convolve(&[1.0, 2.0, 3.0, 4.0], &[0.5, 0.3, 0.1]).unwrap();
        assert_close(&out, &[0.5, 1.3, 2.2, 3.1, 1.5, 0.4], 1e-6);
    }

    #[test]
    fn fft_matches_direct_across_blocks() {
        // Signal longer than one FFT block so overlap-add is exercised.
        let signal: Vec<f32> = (0..10_000).map(|i| ((i * 37 % 101) as f32 / 50.0) - 1.0).collect();
        let kernel: Vec<f32> = (0..700).map(|i| (-(i as f32) / 100.0).exp() * if i % 3 == 0 { 1.0 } else { -0.5 }).collect();
        let fft = FftConvolver.convolve(&signal, &kernel).unwrap();
        let direct = DirectConvolver.convolve(&signal, &kernel).unwrap();
        assert_eq!(fft.len(), signal.len() + kernel.len() - 1);
        assert_close(&fft, &direct, 5e-3);
    }

    #[test]
    fn unit_impulse_is_identity() {
        let signal = [0.25, -0.5, 0.75];
        let out = FftConvolver.convolve(&signal, &[1.0]).unwrap();
        assert_close(&out, &signal, 1e-5);
    }

    #[test]
    fn empty_inputs_give_empty_output() {
        assert!(FftConvolver.convolve(&[], &[1.0]).unwrap().is_empty());
        assert!(DirectConvolver.convolve(&[1.0], &[]).unwrap().is_empty());
    }

    #[test]
    fn zero_signal_stays_silent() {
        let ir = synthesize(8000, 0.5, 22.0, Some(5)).unwrap();
        let silence = SampleBuffer::silent(2, 3000, 8000).unwrap();
        let out = convolve(silence, &ir, &FftConvolver).unwrap();
        assert_eq!(out.frames(), 3000 + ir.frames() - 1);
        assert!(out.channels().iter().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn channels_pair_up() {
        let ir_buf = SampleBuffer::new(vec![vec![1.0, 0.0], vec![0.0, 2.0]], 100).unwrap();
        let ir = ImpulseResponse::from_buffer(ir_buf).unwrap();
        let signal = SampleBuffer::new(vec![vec![1.0, 1.0], vec![1.0, -1.0]], 100).unwrap();
        let mut seen = Vec::new();
        let out = convolve_with(signal, &ir, &DirectConvolver, |c| seen.push(c)).unwrap();
        assert_eq!(out.channel(0), &[1.0, 1.0, 0.0]);
        assert_eq!(out.channel(1), &[0.0, 2.0, -2.0]);
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn rejects_mismatched_rates() {
        let ir = synthesize(44100, 0.1, 0.0, Some(1)).unwrap();
        let signal = SampleBuffer::silent(2, 10, 48000).unwrap();
        assert!(matches!(
            convolve(signal, &ir, &FftConvolver),
            Err(RenderError::Mismatch(_))
        ));
    }

    #[test]
    fn normalization_scale_follows_power() {
        let quiet = ImpulseResponse::from_buffer(
            SampleBuffer::new(vec![vec![0.1; 100], vec![0.1; 100]], 44100).unwrap(),
        )
        .unwrap();
        assert!((normalization_scale(&quiet) - 0.0125).abs() < 1e-6);

        let silent = ImpulseResponse::from_buffer(SampleBuffer::silent(2, 10, 22050).unwrap()).unwrap();
        assert!((normalization_scale(&silent) - 20.0).abs() < 1e-4);
    }
}
