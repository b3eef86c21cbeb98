//! Per-fixture calibration records

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::transform::{self, CurveProfile};

/// Immutable calibration for one physical fixture.
///
/// Replaced as a whole, never mutated field by field. Controllers snapshot
/// the record at the start of every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureCalibration {
    /// Opaque identifier of the physical fixture
    pub target_id: String,
    /// Low visible level: lowest actual value that visibly lights the fixture
    pub llv: u8,
    /// Highest actual level that is still visibly dimmed
    pub hld: u8,
    /// Curve used between `llv` and `hld`
    #[serde(default)]
    pub profile: CurveProfile,
}

impl FixtureCalibration {
    /// Create a validated calibration
    pub fn new(target_id: impl Into<String>, llv: u8, hld: u8, profile: CurveProfile) -> Result<Self> {
        let calibration = Self {
            target_id: target_id.into(),
            llv,
            hld,
            profile,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    /// Full-range linear calibration (actual == virtual, modulo rounding)
    pub fn identity(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            llv: 0,
            hld: 255,
            profile: CurveProfile::Linear,
        }
    }

    /// Check `llv <= hld`
    pub fn validate(&self) -> Result<()> {
        if self.llv > self.hld {
            return Err(CoreError::InvalidCalibration {
                target: self.target_id.clone(),
                llv: self.llv,
                hld: self.hld,
            });
        }
        Ok(())
    }

    /// True when the fixture has no dimmable range (`llv == hld`)
    pub fn is_plateau(&self) -> bool {
        self.llv == self.hld
    }

    /// Virtual -> actual using this calibration
    pub fn to_actual(&self, virtual_brightness: u8) -> u8 {
        transform::virtual_to_actual(
            virtual_brightness.into(),
            self.llv.into(),
            self.hld.into(),
            self.profile,
        )
    }

    /// Actual -> virtual using this calibration
    pub fn to_virtual(&self, actual_brightness: u8) -> u8 {
        transform::actual_to_virtual(
            actual_brightness.into(),
            self.llv.into(),
            self.hld.into(),
            self.profile,
        )
    }
}

/// Parse a brightness level as typed by a user.
///
/// Accepts `"35%"` (percent of 255), plain numbers `0..=100` (also read as
/// percent) and numbers above 100 (raw levels, clamped to 255). Returns
/// `None` for anything else.
pub fn parse_level(input: &str) -> Option<u8> {
    let s = input.trim();
    if let Some(pct) = s.strip_suffix('%') {
        let pct: f64 = pct.trim().parse().ok()?;
        if !(0.0..=100.0).contains(&pct) {
            return None;
        }
        return Some(percent_to_level(pct));
    }

    let value: f64 = s.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value <= 100.0 {
        Some(percent_to_level(value))
    } else {
        Some(value.min(255.0).round() as u8)
    }
}

fn percent_to_level(pct: f64) -> u8 {
    (255.0 * pct / 100.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_inverted_range() {
        let err = FixtureCalibration::new("light.hall", 200, 100, CurveProfile::Linear).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidCalibration { llv: 200, hld: 100, .. }
        ));

        assert!(FixtureCalibration::new("light.hall", 100, 100, CurveProfile::Linear).is_ok());
    }

    #[test]
    fn test_calibrated_transforms() {
        let cal = FixtureCalibration::new("light.desk", 10, 210, CurveProfile::Linear).unwrap();
        assert_eq!(cal.to_actual(0), 0);
        assert_eq!(cal.to_actual(255), 210);
        assert_eq!(cal.to_virtual(210), 255);
        assert_eq!(cal.to_virtual(0), 0);
        assert!(!cal.is_plateau());
    }

    #[test]
    fn test_record_format() {
        let json = r#"{"target_id":"light.mba_s1_2","llv":12,"hld":190,"profile":"linear"}"#;
        let cal: FixtureCalibration = serde_json::from_str(json).unwrap();
        assert_eq!(cal.llv, 12);
        assert_eq!(cal.hld, 190);
        assert_eq!(cal.profile, CurveProfile::Linear);

        // profile defaults to linear
        let cal: FixtureCalibration =
            serde_json::from_str(r#"{"target_id":"x","llv":0,"hld":255}"#).unwrap();
        assert_eq!(cal.profile, CurveProfile::Linear);

        // out of range level is rejected by the u8 field
        let bad: std::result::Result<FixtureCalibration, _> =
            serde_json::from_str(r#"{"target_id":"x","llv":0,"hld":300}"#);
        assert!(bad.is_err());

        let bad: std::result::Result<FixtureCalibration, _> =
            serde_json::from_str(r#"{"target_id":"x","llv":0,"hld":255,"profile":"cubic"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("35%"), Some(89));
        assert_eq!(parse_level(" 100 % "), Some(255));
        assert_eq!(parse_level("0%"), Some(0));
        assert_eq!(parse_level("50"), Some(128));
        assert_eq!(parse_level("204"), Some(204));
        assert_eq!(parse_level("300"), Some(255));
        assert_eq!(parse_level("120%"), None);
        assert_eq!(parse_level("-4"), None);
        assert_eq!(parse_level("bright"), None);
    }
}
