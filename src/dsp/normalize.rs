//! Peak normalizer.

use super::buffer::SampleBuffer;

/// Convert decibels to a linear amplitude.
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Scale `buffer` so its largest absolute sample equals `target_db`.
///
/// Returns the applied gain, or `None` for a silent buffer, which is left
/// unchanged.
pub fn normalize(buffer: &mut SampleBuffer, target_db: f32) -> Option<f32> {
    let peak = buffer.peak();
    if peak <= 0.0 {
        return None;
    }
    let gain = db_to_linear(target_db) / peak;
    for s in buffer.samples_mut() {
        *s *= gain;
    }
    Some(gain)
}
