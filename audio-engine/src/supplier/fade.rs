//! Fade-gain computation (§4.3 step 5).
//!
//! Grounded on the teacher's `fade_util.rs` reasoning about a `BlockLocation` within
//! a clip (is this sample inside the fade-in region, the fade-out region, or neither)
//! — generalized here from the teacher's fixed short equal-power fade to the three
//! curves this spec exposes (linear, logarithmic, s-curve), driven by
//! [`engine_api::FadeCurve::evaluate`].

use engine_api::FadeCurve;

/// Computes the combined fade-in × fade-out gain at offset `t` seconds from the
/// start of the segment's timeline occupancy, given the segment's total `duration`
/// in seconds. Gains multiply, never sum (§4.3 step 5).
pub fn fade_gain(
    t: f64,
    duration: f64,
    fade_in_duration: f64,
    fade_in_curve: FadeCurve,
    fade_out_duration: f64,
    fade_out_curve: FadeCurve,
) -> f64 {
    let fade_in_gain = if fade_in_duration > 0.0 && t < fade_in_duration {
        fade_in_curve.evaluate(t / fade_in_duration)
    } else {
        1.0
    };
    let fade_out_gain = if fade_out_duration > 0.0 && t > duration - fade_out_duration {
        let x = 1.0 - (duration - t) / fade_out_duration;
        1.0 - fade_out_curve.evaluate(x)
    } else {
        1.0
    };
    fade_in_gain * fade_out_gain
}
