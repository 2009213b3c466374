//! Pressure unit conversions.
//! Gas tables carry pressure in Torr, the public API speaks Bar.

/// One Torr expressed in Bar.
pub const TORR_TO_BAR: f64 = 0.0013332237;

pub fn torr_to_bar(torr: f64) -> f64 {
    torr * TORR_TO_BAR
}

pub fn bar_to_torr(bar: f64) -> f64 {
    bar / TORR_TO_BAR
}
