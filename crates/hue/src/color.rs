//! ARGB color handling for the companion app's color wheel, mapped onto the
//! v1 api's hue/sat fields.

use serde::{Deserialize, Serialize};

/// Lowest color temperature the bridge accepts (≈6500 K).
pub const MIRED_MIN: u16 = 153;

/// Highest color temperature the bridge accepts (2000 K).
pub const MIRED_MAX: u16 = 500;

/// A packed 0xAARRGGBB color as produced by the companion app's color wheel.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Argb(pub u32);

impl Argb {
    pub const WHITE: Self = Self(0xFFFF_FFFF);

    #[must_use]
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[must_use]
    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[must_use]
    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Parse `RRGGBB` or `AARRGGBB`, with or without a leading `#`. Six-digit
    /// colors get an opaque alpha.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        let parsed = u32::from_str_radix(digits, 16).ok()?;
        match digits.len() {
            6 => Some(Self(0xFF00_0000 | parsed)),
            8 => Some(Self(parsed)),
            _ => None,
        }
    }

    /// Unset colors serialize as 0; the alpha channel makes any real color
    /// non-zero even for pure black.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Map to the v1 api's hue (0–65535) and sat (0–254) pair via HSV.
    ///
    /// Value (the V of HSV) is intentionally discarded: brightness travels
    /// separately as `bri`.
    #[must_use]
    pub fn to_hue_sat(self) -> (u16, u8) {
        let r = f64::from(self.red()) / 255.0;
        let g = f64::from(self.green()) / 255.0;
        let b = f64::from(self.blue()) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue_deg = if delta <= f64::EPSILON {
            0.0
        } else if (max - r).abs() <= f64::EPSILON {
            60.0 * (((g - b) / delta).rem_euclid(6.0))
        } else if (max - g).abs() <= f64::EPSILON {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };

        let sat = if max <= f64::EPSILON {
            0.0
        } else {
            delta / max
        };

        let hue = (hue_deg / 360.0 * 65535.0).round().clamp(0.0, 65535.0) as u16;
        let sat = (sat * 254.0).round().clamp(0.0, 254.0) as u8;
        (hue, sat)
    }
}

/// Clamp a color temperature into the range the bridge accepts.
#[must_use]
pub fn clamp_mired(mired: u16) -> u16 {
    mired.clamp(MIRED_MIN, MIRED_MAX)
}
