//! Progress reporting for long conversions.
//!
//! Stages report synchronously at fixed checkpoints. Hosts that want a
//! smoother bar during rendering can interpolate with
//! [`estimated_render_percent`] on their own timer.

/// Major checkpoints of a conversion, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Reading,
    Decoding,
    BuildingChain,
    Rendering,
    Widening,
    Normalizing,
    Encoding,
    Done,
}

/// Progress reached when rendering starts.
pub const RENDER_START_PERCENT: f32 = 28.0;
/// Share of the bar covered by rendering.
pub const RENDER_SPAN_PERCENT: f32 = 58.0;

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Reading => "Reading file...",
            Stage::Decoding => "Decoding audio...",
            Stage::BuildingChain => "Building processing chain...",
            Stage::Rendering => "Rendering...",
            Stage::Widening => "Widening stereo...",
            Stage::Normalizing => "Optimizing levels...",
            Stage::Encoding => "Encoding WAV...",
            Stage::Done => "Done!",
        }
    }

    /// Percentage reported when the stage begins.
    pub fn percent(self) -> f32 {
        match self {
            Stage::Reading => 0.0,
            Stage::Decoding => 10.0,
            Stage::BuildingChain => 20.0,
            Stage::Rendering => RENDER_START_PERCENT,
            Stage::Widening => 89.0,
            Stage::Normalizing => 95.0,
            Stage::Encoding => 99.0,
            Stage::Done => 100.0,
        }
    }
}

/// Receives `(percent, stage)` updates.
pub trait ProgressSink {
    fn report(&mut self, percent: f32, stage: Stage);
}

impl<F: FnMut(f32, Stage)> ProgressSink for F {
    fn report(&mut self, percent: f32, stage: Stage) {
        self(percent, stage)
    }
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: f32, _stage: Stage) {}
}

/// Keeps reported percentages within 0–100 and never lets them go backwards.
pub struct Monotonic<'a> {
    inner: &'a mut dyn ProgressSink,
    last: f32,
}

impl<'a> Monotonic<'a> {
    pub fn new(inner: &'a mut dyn ProgressSink) -> Self {
        Self { inner, last: 0.0 }
    }

    pub fn stage(&mut self, stage: Stage) {
        self.report(stage.percent(), stage);
    }
}

impl ProgressSink for Monotonic<'_> {
    fn report(&mut self, percent: f32, stage: Stage) {
        let percent = if percent.is_nan() { self.last } else { percent.clamp(0.0, 100.0) };
        self.last = self.last.max(percent);
        self.inner.report(self.last, stage);
    }
}

/// Expected render time: 400 ms per second of audio, capped at 30 s.
pub fn render_estimate_ms(duration_secs: f64) -> f64 {
    (duration_secs * 400.0).min(30_000.0)
}

/// Render-stage percentage after `elapsed_ms`, saturating at 86%.
pub fn estimated_render_percent(elapsed_ms: f64, duration_secs: f64) -> f32 {
    let estimate = render_estimate_ms(duration_secs);
    let fraction = if estimate > 0.0 { (elapsed_ms / estimate).min(1.0) } else { 1.0 };
    RENDER_START_PERCENT + RENDER_SPAN_PERCENT * fraction.max(0.0) as f32
}
