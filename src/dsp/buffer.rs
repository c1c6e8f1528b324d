//! SampleBuffer — planar f32 audio shared by every pipeline stage.

use std::f32::consts::FRAC_1_SQRT_2;

use crate::error::BufferError;

/// Planar multi-channel audio at a fixed sample rate.
///
/// All channels always have the same length and the sample rate is never
/// zero. Stages take a buffer by value and hand back a new one, or mutate
/// it in place through `&mut`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        let expected = channels.first().ok_or(BufferError::NoChannels)?.len();
        if let Some((channel, ch)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != expected)
        {
            return Err(BufferError::ChannelLength {
                channel,
                expected,
                found: ch.len(),
            });
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Build a buffer from frame-interleaved samples. A trailing partial
    /// frame is dropped.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, BufferError> {
        if channel_count == 0 {
            return Err(BufferError::NoChannels);
        }
        let frames = samples.len() / channel_count;
        let mut channels: Vec<Vec<f32>> = (0..channel_count)
            .map(|_| Vec::with_capacity(frames))
            .collect();
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::new(channels, sample_rate)
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, BufferError> {
        Self::new(vec![samples], sample_rate)
    }

    /// An all-zero buffer.
    pub fn silent(channel_count: usize, frames: usize, sample_rate: u32) -> Result<Self, BufferError> {
        Self::new(vec![vec![0.0; frames]; channel_count], sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Mutable access to one channel. The slice cannot change length, so the
    /// equal-length invariant holds.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Both stereo channels at once, or `None` for a mono buffer.
    pub fn stereo_mut(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        match self.channels.as_mut_slice() {
            [left, right, ..] => Some((left.as_mut_slice(), right.as_mut_slice())),
            _ => None,
        }
    }

    pub fn samples_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.channels.iter_mut().flat_map(|ch| ch.iter_mut())
    }

    /// Largest absolute sample value over all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Conform any channel layout to stereo.
    ///
    /// Mono is copied to both sides. Quad and 5.1 use the usual speaker
    /// down-mix; other layouts keep their first two channels.
    pub fn to_stereo(self) -> Self {
        let sample_rate = self.sample_rate;
        let mut ch = self.channels;
        let channels = match ch.len() {
            1 => {
                let mono = ch.remove(0);
                vec![mono.clone(), mono]
            }
            2 => ch,
            4 => {
                // L R SL SR
                let left = ch[0].iter().zip(&ch[2]).map(|(l, sl)| 0.5 * (l + sl)).collect();
                let right = ch[1].iter().zip(&ch[3]).map(|(r, sr)| 0.5 * (r + sr)).collect();
                vec![left, right]
            }
            6 => {
                // L R C LFE SL SR
                let left = (0..ch[0].len())
                    .map(|i| ch[0][i] + FRAC_1_SQRT_2 * (ch[2][i] + ch[4][i]))
                    .collect();
                let right = (0..ch[1].len())
                    .map(|i| ch[1][i] + FRAC_1_SQRT_2 * (ch[2][i] + ch[5][i]))
                    .collect();
                vec![left, right]
            }
            _ => {
                ch.truncate(2);
                ch
            }
        };
        Self {
            channels,
            sample_rate,
        }
    }
}

/// Convert a non-negative frame position computed in `f64` to `usize`,
/// or `None` when it does not fit.
pub(crate) fn frame_count(value: f64) -> Option<usize> {
    (value < usize::MAX as f64).then_some(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unequal_channels() {
        let err = SampleBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).unwrap_err();
        assert_eq!(
            err,
            BufferError::ChannelLength {
                channel: 1,
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn rejects_zero_rate_and_no_channels() {
        assert_eq!(SampleBuffer::mono(vec![0.0], 0).unwrap_err(), BufferError::ZeroSampleRate);
        assert_eq!(SampleBuffer::new(vec![], 48000).unwrap_err(), BufferError::NoChannels);
    }

    #[test]
    fn deinterleaves_frames() {
        let buf = SampleBuffer::from_interleaved(&[1.0, -1.0, 0.5, -0.5, 0.25], 2, 8000).unwrap();
        assert_eq!(buf.frames(), 2);
        assert_eq!(buf.channel(0), &[1.0, 0.5]);
        assert_eq!(buf.channel(1), &[-1.0, -0.5]);
    }

    #[test]
    fn mono_upmix_copies_both_sides() {
        let buf = SampleBuffer::mono(vec![0.1, 0.2, -0.3], 22050).unwrap().to_stereo();
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.channel(0), buf.channel(1));
        assert_eq!(buf.channel(0), &[0.1, 0.2, -0.3]);
    }

    #[test]
    fn quad_downmix_averages_surrounds() {
        let buf = SampleBuffer::new(
            vec![vec![1.0], vec![0.0], vec![0.5], vec![1.0]],
            44100,
        )
        .unwrap()
        .to_stereo();
        assert_eq!(buf.channel(0), &[0.75]);
        assert_eq!(buf.channel(1), &[0.5]);
    }

    #[test]
    fn five_one_drops_lfe() {
        let buf = SampleBuffer::new(
            vec![vec![0.0], vec![0.0], vec![1.0], vec![1.0], vec![0.0], vec![0.0]],
            48000,
        )
        .unwrap()
        .to_stereo();
        assert!((buf.channel(0)[0] - FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((buf.channel(1)[0] - FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn peak_spans_channels() {
        let buf = SampleBuffer::new(vec![vec![0.2, -0.1], vec![0.3, -0.7]], 44100).unwrap();
        assert_eq!(buf.peak(), 0.7);
        assert!((buf.duration_secs() - 2.0 / 44100.0).abs() < 1e-12);
    }
}
