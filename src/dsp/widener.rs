//! Mid/side stereo widener.

use super::buffer::SampleBuffer;

/// Scale the side component of every frame by `factor`.
///
/// `1.0` leaves the signal unchanged, `> 1.0` widens, `< 1.0` narrows and
/// `0.0` collapses to mono. No clamping is done here. Buffers with fewer
/// than two channels are left untouched.
pub fn widen(buffer: &mut SampleBuffer, factor: f32) {
    let Some((left, right)) = buffer.stereo_mut() else {
        return;
    };
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        let mid = (*l + *r) * 0.5;
        let side = (*l - *r) * 0.5;
        *l = mid + factor * side;
        *r = mid - factor * side;
    }
}
