//! Conversions between the bridge's 0–254 brightness scale and the 0–100
//! percent scale the rest of the application works in.

/// Decode a raw bridge brightness into percent, truncating.
#[must_use]
pub fn bri_to_percent(raw: u8) -> u8 {
    let percent = u32::from(raw) * 100 / 254;
    percent.min(100) as u8
}

/// Encode a percentage as a raw bridge brightness.
///
/// Never returns 0: the v1 api treats `bri` as a dim level for a light that
/// is on, so "0%" is expressed by `on=false` instead.
#[must_use]
pub fn percent_to_bri(percent: u8) -> u8 {
    let raw = (u32::from(percent.min(100)) * 254 + 50) / 100;
    raw.clamp(1, 254) as u8
}
