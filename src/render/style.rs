use crate::regime::Regime;

/// Fill color and opacity ramp for one regime label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeStyle {
    pub rgb: (u8, u8, u8),
    pub base_alpha: f64,
    pub alpha_gain: f64,
    pub legend: &'static str,
}

pub const GREEN: (u8, u8, u8) = (0, 128, 0);
pub const RED: (u8, u8, u8) = (255, 0, 0);
pub const GRAY: (u8, u8, u8) = (128, 128, 128);

pub const ALPHA_MIN: f64 = 0.05;
pub const ALPHA_MAX: f64 = 0.95;

const POSITIVE: RegimeStyle = RegimeStyle { rgb: GREEN, base_alpha: 0.30, alpha_gain: 0.60, legend: "Positive Drift" };
const NEGATIVE: RegimeStyle = RegimeStyle { rgb: RED, base_alpha: 0.30, alpha_gain: 0.60, legend: "Negative Drift" };
const UNCERTAIN: RegimeStyle = RegimeStyle { rgb: GRAY, base_alpha: 0.10, alpha_gain: 0.25, legend: "High Uncertainty" };
/// Used for any code outside {+1, -1, 0}
const FALLBACK: RegimeStyle = RegimeStyle { rgb: GRAY, base_alpha: 0.12, alpha_gain: 0.30, legend: "Unknown" };

/// Legend order.
pub const LEGEND: [Regime; 3] = [Regime::Positive, Regime::Negative, Regime::Uncertain];

pub fn style_for_code(code: i8) -> RegimeStyle {
    match Regime::from_code(code) {
        Some(Regime::Positive) => POSITIVE,
        Some(Regime::Negative) => NEGATIVE,
        Some(Regime::Uncertain) => UNCERTAIN,
        None => FALLBACK,
    }
}

pub fn style_for(regime: Regime) -> RegimeStyle {
    style_for_code(regime.code())
}

impl RegimeStyle {
    /// Opacity for a segment whose normalized uncertainty is `unc`.
    pub fn alpha(&self, unc: f64) -> f64 {
        (self.base_alpha + self.alpha_gain * unc).clamp(ALPHA_MIN, ALPHA_MAX)
    }
}
