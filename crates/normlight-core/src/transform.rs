//! Brightness transform engine
//!
//! Maps between the *virtual* brightness domain (0-255, uniform across all
//! fixtures) and a fixture's *actual* brightness attribute (0-255, native to
//! the device).
//!
//! Virtual `0` is always actual `0`. Virtual `1..=255` is spread linearly over
//! the fixture's visible range `[llv, hld]`:
//!
//! ```text
//! actual  = llv + round((v - 1) / 254 * (hld - llv))
//! virtual = round((a - llv) / (hld - llv) * 254) + 1
//! ```
//!
//! Both directions clamp inputs and outputs to `[0, 255]` and use
//! round-half-up integer arithmetic, so a round trip stays within ±1 whenever
//! `hld - llv >= 127`.
//!
//! ## Example
//!
//! ```rust
//! use normlight_core::transform::{actual_to_virtual, virtual_to_actual};
//! use normlight_core::CurveProfile;
//!
//! assert_eq!(virtual_to_actual(255, 10, 210, CurveProfile::Linear), 210);
//! assert_eq!(actual_to_virtual(210, 10, 210, CurveProfile::Linear), 255);
//! assert_eq!(virtual_to_actual(0, 10, 210, CurveProfile::Linear), 0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Number of virtual steps above zero, minus one.
const VIRTUAL_SPAN: i64 = 254;

/// Named curve used to map between the virtual and actual domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CurveProfile {
    /// Straight line between `llv` and `hld`
    #[default]
    Linear,
}

impl CurveProfile {
    /// Returns the configuration name of the profile
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveProfile::Linear => "linear",
        }
    }
}

impl FromStr for CurveProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(CurveProfile::Linear),
            _ => Err(CoreError::UnsupportedProfile(s.to_string())),
        }
    }
}

impl TryFrom<String> for CurveProfile {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurveProfile> for String {
    fn from(profile: CurveProfile) -> Self {
        profile.as_str().to_string()
    }
}

impl fmt::Display for CurveProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn clamp_level(x: i64) -> i64 {
    x.clamp(0, 255)
}

/// Integer division rounding half up. `den` must be positive.
fn div_round(num: i64, den: i64) -> i64 {
    (2 * num + den).div_euclid(2 * den)
}

/// Normalizes raw bounds; `hld < llv` collapses onto the `llv` plateau.
fn bounds(llv: i64, hld: i64) -> (i64, i64) {
    let llv = clamp_level(llv);
    let hld = clamp_level(hld).max(llv);
    (llv, hld)
}

/// Converts a virtual brightness into the fixture's actual brightness.
///
/// When `hld == llv` the fixture cannot discriminate visible levels and every
/// nonzero `v` maps onto the `llv` plateau.
pub fn virtual_to_actual(v: i64, llv: i64, hld: i64, profile: CurveProfile) -> u8 {
    let v = clamp_level(v);
    if v == 0 {
        return 0;
    }
    let (llv, hld) = bounds(llv, hld);
    let span = hld - llv;
    if span == 0 {
        return llv as u8;
    }

    let actual = match profile {
        CurveProfile::Linear => llv + div_round((v - 1) * span, VIRTUAL_SPAN),
    };
    actual.clamp(llv, hld) as u8
}

/// Converts a fixture's actual brightness back into the virtual domain.
///
/// Anything at or below `llv` (but above zero) is the lowest lit step `1`,
/// anything at or above `hld` is full `255`.
pub fn actual_to_virtual(a: i64, llv: i64, hld: i64, profile: CurveProfile) -> u8 {
    let a = clamp_level(a);
    if a == 0 {
        return 0;
    }
    let (llv, hld) = bounds(llv, hld);
    if a <= llv {
        return 1;
    }
    if a >= hld {
        return 255;
    }

    let span = hld - llv;
    let virt = match profile {
        CurveProfile::Linear => div_round((a - llv) * VIRTUAL_SPAN, span) + 1,
    };
    virt.clamp(1, 255) as u8
}
