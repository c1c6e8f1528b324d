//! One-pole low-pass — models high-frequency air absorption in the IR tail.

use std::f64::consts::PI;

/// A first-order IIR low-pass: `y[n] = a * y[n-1] + (1 - a) * x[n]`.
#[derive(Debug, Clone)]
pub struct OnePoleLowpass {
    a: f32,
    z1: f32,
}

impl OnePoleLowpass {
    /// Create a filter with its pole placed for `cutoff_hz` at `sample_rate`.
    pub fn new(cutoff_hz: f64, sample_rate: f64) -> Self {
        Self {
            a: Self::coefficient(cutoff_hz, sample_rate) as f32,
            z1: 0.0,
        }
    }

    /// Pole coefficient `exp(-2π·fc/sr)`.
    pub fn coefficient(cutoff_hz: f64, sample_rate: f64) -> f64 {
        (-2.0 * PI * cutoff_hz / sample_rate).exp()
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.z1 = self.a * self.z1 + (1.0 - self.a) * input;
        self.z1
    }

    /// Filter a block in place, blending `dry` of the input with `wet` of
    /// the filtered signal.
    pub fn process_blend(&mut self, block: &mut [f32], dry: f32, wet: f32) {
        for s in block.iter_mut() {
            let y = self.process(*s);
            *s = *s * dry + y * wet;
        }
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
    }
}
