use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The shape of a fade ramp, evaluated over a normalized progress `x ∈ [0, 1]`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize, Display)]
pub enum FadeCurve {
    #[default]
    #[display(fmt = "Linear")]
    Linear,
    #[display(fmt = "Logarithmic")]
    Logarithmic,
    #[display(fmt = "S-curve")]
    SCurve,
}

impl FadeCurve {
    /// Evaluates the curve at progress `x`, clamped to `[0, 1]` first.
    pub fn evaluate(self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => x,
            // log(1 + 9x) / log(10), so evaluate(0) == 0 and evaluate(1) == 1.
            FadeCurve::Logarithmic => (1.0 + 9.0 * x).ln() / 10.0_f64.ln(),
            FadeCurve::SCurve => 0.5 - 0.5 * (std::f64::consts::PI * x).cos(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_zero_and_one_for_all_curves() {
        for curve in [FadeCurve::Linear, FadeCurve::Logarithmic, FadeCurve::SCurve] {
            assert!((curve.evaluate(0.0) - 0.0).abs() < 1e-9, "{curve:?} at 0");
            assert!((curve.evaluate(1.0) - 1.0).abs() < 1e-9, "{curve:?} at 1");
        }
    }

    #[test]
    fn linear_fade_midpoint_is_half() {
        assert!((FadeCurve::Linear.evaluate(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn s_curve_is_symmetric_about_half() {
        // s-curve at 0.5 must equal 0.5, matching the fade-law scenario in the spec.
        assert!((FadeCurve::SCurve.evaluate(0.5) - 0.5).abs() < 1e-6);
    }
}
