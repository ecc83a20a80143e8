pub mod api;
pub mod color;
pub mod scale;

/// Brightness value the bridge substitutes when a light omits `bri`.
pub const DEFAULT_BRI_RAW: u8 = 254;

/// Wire error emitted for an unknown or unauthorized username.
pub const ERR_UNAUTHORIZED_USER: u32 = 1;

/// Wire error emitted by `POST /api` until the physical link button is pressed.
pub const ERR_LINK_BUTTON_NOT_PRESSED: u32 = 101;
