//! Effect parameters for the hall reverb chain.
//!
//! `EffectParameters::default()` is the hall preset. JSON and JS objects
//! may override any subset of fields; missing keys keep their preset value.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// RT60-ish length of the synthesized reverb tail.
pub const HALL_DECAY_SECONDS: f64 = 2.8;
/// Silence before the reverb tail starts.
pub const HALL_PREDELAY_MS: f64 = 22.0;
pub const HALL_DRY_GAIN: f32 = 0.60;
pub const HALL_WET_GAIN: f32 = 0.58;
pub const HALL_MASTER_GAIN: f32 = 0.88;
pub const HALL_WIDEN_FACTOR: f32 = 1.25;
pub const HALL_TARGET_PEAK_DB: f32 = -0.5;
/// Extra render time after the source ends so the tail can ring out.
pub const HALL_TAIL_SECONDS: f64 = 4.0;

/// Longest pre-delay the wet path supports.
pub const MAX_PREDELAY_MS: f64 = 200.0;
/// Longest IR tail accepted from overrides.
pub const MAX_DECAY_SECONDS: f64 = 30.0;
/// Longest render tail accepted from overrides.
pub const MAX_TAIL_SECONDS: f64 = 60.0;

/// Immutable configuration of one conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectParameters {
    /// Length of the impulse-response tail in seconds.
    pub decay_seconds: f64,
    /// Pre-delay in milliseconds, applied both to the IR and the wet path.
    pub predelay_ms: f64,
    pub dry_gain: f32,
    pub wet_gain: f32,
    /// Applied to the dry + wet bus.
    pub master_gain: f32,
    /// Mid/side width factor (1.0 = unchanged).
    pub widen_factor: f32,
    /// Output peak level in dBFS.
    pub target_peak_db: f32,
    /// Silence appended to the render so the reverb decays fully.
    pub tail_seconds: f64,
    /// Scale the IR to unit equal-power gain before convolving.
    pub normalize_ir: bool,
    /// Seed for the IR noise. `None` draws from OS entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self::hall()
    }
}

impl EffectParameters {
    /// Medium hall: 2.8 s decay, 22 ms pre-delay, 58% wet, 1.25x width.
    pub fn hall() -> Self {
        Self {
            decay_seconds: HALL_DECAY_SECONDS,
            predelay_ms: HALL_PREDELAY_MS,
            dry_gain: HALL_DRY_GAIN,
            wet_gain: HALL_WET_GAIN,
            master_gain: HALL_MASTER_GAIN,
            widen_factor: HALL_WIDEN_FACTOR,
            target_peak_db: HALL_TARGET_PEAK_DB,
            tail_seconds: HALL_TAIL_SECONDS,
            normalize_ir: true,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse a (possibly sparse) JSON object and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json(&self) -> String {
        // Plain numbers and bools only, serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Pre-delay expressed in frames at `sample_rate`.
    pub fn predelay_frames(&self, sample_rate: u32) -> usize {
        (sample_rate as f64 * self.predelay_ms / 1000.0).floor() as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn out_of_range(name: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::OutOfRange {
                name,
                reason: reason.into(),
            }
        }

        if !self.decay_seconds.is_finite()
            || self.decay_seconds <= 0.0
            || self.decay_seconds > MAX_DECAY_SECONDS
        {
            return Err(out_of_range(
                "decaySeconds",
                format!("must be greater than 0 and at most {MAX_DECAY_SECONDS} s"),
            ));
        }
        if !(0.0..=MAX_PREDELAY_MS).contains(&self.predelay_ms) {
            return Err(out_of_range(
                "predelayMs",
                format!("must be between 0 and {MAX_PREDELAY_MS} ms"),
            ));
        }
        if !(0.0..=MAX_TAIL_SECONDS).contains(&self.tail_seconds) {
            return Err(out_of_range(
                "tailSeconds",
                format!("must be between 0 and {MAX_TAIL_SECONDS} s"),
            ));
        }
        for (name, gain) in [
            ("dryGain", self.dry_gain),
            ("wetGain", self.wet_gain),
            ("masterGain", self.master_gain),
        ] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(out_of_range(name, "must be a non-negative gain"));
            }
        }
        if !self.widen_factor.is_finite() {
            return Err(out_of_range("widenFactor", "must be finite"));
        }
        if !self.target_peak_db.is_finite() || self.target_peak_db > 0.0 {
            return Err(out_of_range("targetPeakDb", "must be at or below 0 dBFS"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hall_preset_values() {
        let p = EffectParameters::default();
        assert_eq!(p.decay_seconds, 2.8);
        assert_eq!(p.predelay_ms, 22.0);
        assert_eq!(p.dry_gain, 0.60);
        assert_eq!(p.wet_gain, 0.58);
        assert_eq!(p.master_gain, 0.88);
        assert_eq!(p.widen_factor, 1.25);
        assert_eq!(p.target_peak_db, -0.5);
        assert!(p.seed.is_none());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn sparse_json_keeps_defaults() {
        let p = EffectParameters::from_json(r#"{"wetGain": 0.3, "seed": 7}"#).unwrap();
        assert_eq!(p.wet_gain, 0.3);
        assert_eq!(p.seed, Some(7));
        assert_eq!(p.dry_gain, HALL_DRY_GAIN);
        assert_eq!(p.decay_seconds, HALL_DECAY_SECONDS);
    }

    #[test]
    fn json_survives_a_round_trip() {
        let p = EffectParameters::hall().with_seed(99);
        let back = EffectParameters::from_json(&p.to_json()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn rejects_out_of_range() {
        let err = EffectParameters::from_json(r#"{"predelayMs": 250}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "predelayMs", .. }));

        let err = EffectParameters::from_json(r#"{"decaySeconds": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "decaySeconds", .. }));

        let err = EffectParameters::from_json(r#"{"decaySeconds": 1e300}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "decaySeconds", .. }));

        let err = EffectParameters::from_json(r#"{"tailSeconds": 1e300}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "tailSeconds", .. }));

        let err = EffectParameters::from_json(r#"{"wetGain": -1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "wetGain", .. }));

        assert!(matches!(
            EffectParameters::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn predelay_in_frames() {
        let p = EffectParameters::hall();
        assert_eq!(p.predelay_frames(44100), 970);
        assert_eq!(p.predelay_frames(48000), 1056);
    }
}
