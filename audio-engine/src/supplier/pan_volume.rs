//! Volume and pan application (§4.3 step 6), grounded on the teacher's
//! `amplifier.rs` per-sample gain multiply, generalized to constant-power stereo pan.
//!
//! §9 open question (iii): for more than two channels, pan affects only channels
//! `{0, 1}`; the rest pass through untouched.

use engine_api::constant_power_pan;

/// Applies `volume` and `pan` to one interleaved frame in place.
///
/// A mono frame has nothing to pan between, so pan is a no-op when `frame.len() ==
/// 1`; only volume applies. This keeps a mono, centered-pan segment a true identity
/// gain stage, which the lossless-passthrough property (§8) depends on.
pub fn apply_volume_and_pan(frame: &mut [f32], volume: f64, pan: f64) {
    let apply_pan = frame.len() >= 2;
    let (gain_l, gain_r) = if apply_pan {
        constant_power_pan(pan)
    } else {
        (1.0, 1.0)
    };
    for (channel, sample) in frame.iter_mut().enumerate() {
        let pan_gain = match channel {
            0 => gain_l,
            1 => gain_r,
            _ => 1.0,
        };
        *sample = (*sample as f64 * volume * pan_gain) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_pan_halves_both_channels_by_equal_power() {
        let mut frame = [1.0f32, 1.0];
        apply_volume_and_pan(&mut frame, 1.0, 0.0);
        assert!((frame[0] - frame[1]).abs() < 1e-6);
        assert!(frame[0] > 0.6 && frame[0] < 0.8);
    }

    #[test]
    fn hard_right_silences_left() {
        let mut frame = [1.0f32, 1.0];
        apply_volume_and_pan(&mut frame, 1.0, 1.0);
        assert!(frame[0].abs() < 1e-6);
        assert!((frame[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn channels_beyond_stereo_pass_through_pan() {
        let mut frame = [1.0f32, 1.0, 0.5, 0.25];
        apply_volume_and_pan(&mut frame, 1.0, -1.0);
        assert!((frame[2] - 0.5).abs() < 1e-6);
        assert!((frame[3] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn volume_scales_all_channels() {
        let mut frame = [1.0f32, 1.0, 1.0];
        apply_volume_and_pan(&mut frame, 0.5, 0.0);
        assert!((frame[2] - 0.5).abs() < 1e-6);
    }
}
