//! Frame decoding and smoothstep normalization.
//!
//! A frame is one serial line or one UDP datagram. It decodes to a raw sensor
//! count (nominally 0-1023 from a 10-bit ADC) which is mapped onto the output
//! range with a cubic smoothstep instead of a linear scale:
//!
//! ```text
//! t      = clamp(raw / raw_max, 0, 1)
//! sample = out_min + (out_max - out_min) * (3t² - 2t³)
//! ```
//!
//! Out-of-range counts saturate at the range endpoints.

use crate::config::NormalizationConfig;
use std::fmt;

/// One normalized reading.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Sample(f32);

impl Sample {
    pub fn new(value: f32) -> Self {
        Self(value)
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl From<Sample> for f32 {
    fn from(sample: Sample) -> Self {
        sample.0
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Decode a frame into a raw count.
///
/// Leading and trailing whitespace (including `\r\n`) is ignored. Anything that
/// is not a plain integer, including an empty frame, yields `None`.
pub fn parse_frame(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Cubic interpolation between `from` and `to`; `t` is clamped to `[0, 1]`.
pub fn smoothstep(from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let t = t * t * (3.0 - 2.0 * t);
    from + (to - from) * t
}

/// Maps raw sensor counts onto the configured output range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalizer {
    raw_max: f32,
    output_min: f32,
    output_max: f32,
}

impl Normalizer {
    pub fn new(raw_max: f32, output_min: f32, output_max: f32) -> Self {
        Self {
            raw_max,
            output_min,
            output_max,
        }
    }

    pub fn apply(&self, raw: i64) -> Sample {
        Sample(smoothstep(
            self.output_min,
            self.output_max,
            raw as f32 / self.raw_max,
        ))
    }

    /// Parse and normalize in one step; `None` for frames that should be skipped.
    pub fn decode(&self, frame: &str) -> Option<Sample> {
        parse_frame(frame).map(|raw| self.apply(raw))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from(&NormalizationConfig::default())
    }
}

impl From<&NormalizationConfig> for Normalizer {
    fn from(config: &NormalizationConfig) -> Self {
        Self::new(config.raw_max, config.output_min, config.output_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(v: i64) -> f32 {
        let t = (v as f32 / 1023.0).clamp(0.0, 1.0);
        24.0 * (3.0 * t * t - 2.0 * t * t * t)
    }

    #[test]
    fn test_full_raw_range_follows_smoothstep() {
        let normalizer = Normalizer::default();
        for v in 0..=1023 {
            let got = normalizer.apply(v).value();
            assert!(
                (got - reference(v)).abs() < 1e-4,
                "raw {} gave {} expected {}",
                v,
                got,
                reference(v)
            );
        }
    }

    #[test]
    fn test_endpoints_and_midpoint() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.apply(0).value(), 0.0);
        assert_eq!(normalizer.apply(1023).value(), 24.0);
        assert!((normalizer.apply(512).value() - 12.0).abs() < 0.05);
    }

    #[test]
    fn test_out_of_range_saturates() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.apply(-5).value(), 0.0);
        assert_eq!(normalizer.apply(i64::MIN).value(), 0.0);
        assert_eq!(normalizer.apply(1024).value(), 24.0);
        assert_eq!(normalizer.apply(50_000).value(), 24.0);
    }

    #[test]
    fn test_custom_output_range() {
        let normalizer = Normalizer::new(255.0, -1.0, 1.0);
        assert_eq!(normalizer.apply(0).value(), -1.0);
        assert_eq!(normalizer.apply(255).value(), 1.0);
        assert!(normalizer.apply(128).value().abs() < 0.02);
    }

    #[test]
    fn test_parse_frame_trims_and_rejects_garbage() {
        assert_eq!(parse_frame("512\n"), Some(512));
        assert_eq!(parse_frame("  17\r\n"), Some(17));
        assert_eq!(parse_frame("-3"), Some(-3));
        assert_eq!(parse_frame(""), None);
        assert_eq!(parse_frame("\n"), None);
        assert_eq!(parse_frame("abc"), None);
        assert_eq!(parse_frame("51"), Some(51));
        assert_eq!(parse_frame("5 12"), None);
        assert_eq!(parse_frame("12.5"), None);
    }

    #[test]
    fn test_decode_skips_malformed() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.decode("1023\n"), Some(Sample::new(24.0)));
        assert_eq!(normalizer.decode("ab"), None);
    }
}
