//! Loop and playback-rate arithmetic (§4.3 step 2, §9 open question (ii)).
//!
//! Generalized from the teacher's `Looper<S>` modulo-cycle algorithm (`rt/supplier`),
//! which repeats a fixed source length forever under host transport control, to this
//! spec's richer model: a segment loops a bounded number of `repetitions`, or fills a
//! `target_duration` of timeline, or both (repetitions then caps the fill).

use engine_api::{AudioSegmentSettings, Repetitions};

/// The combined rate at which source time elapses per second of timeline time.
/// `> 1.0` means the source is consumed faster than real time (speeds up, shortens
/// timeline occupancy); `< 1.0` the opposite.
///
/// When `time_stretch_factor` (or its `target_stretch_duration`-derived equivalent)
/// differs from 1.0, the WSOLA kernel absorbs both `speed_factor` and the stretch
/// factor chain-style (§4.3 step 3); otherwise only `speed_factor` applies, via plain
/// resampling.
pub fn playback_rate(settings: &AudioSegmentSettings, source_duration: f64) -> f64 {
    let stretch = settings.effective_time_stretch_factor(source_duration);
    if (stretch - 1.0).abs() > f64::EPSILON {
        settings.speed_factor * stretch
    } else {
        settings.speed_factor
    }
}

/// Timeline duration consumed by a single, non-looped play-through of the source.
pub fn one_play_timeline_duration(settings: &AudioSegmentSettings, source_duration: f64) -> f64 {
    let rate = playback_rate(settings, source_duration);
    if rate > 0.0 {
        source_duration / rate
    } else {
        0.0
    }
}

/// Total timeline duration this segment occupies, or `None` if it's unbounded
/// (`Repetitions::Infinite` with no `target_duration` — resolved as "loops until the
/// track timeline ends" per §9 open question (ii); the caller is expected to clamp
/// against the rest of the track/composition).
pub fn segment_timeline_duration(settings: &AudioSegmentSettings, source_duration: f64) -> Option<f64> {
    let one_play = one_play_timeline_duration(settings, source_duration);
    let loop_spec = &settings.loop_spec;
    if !loop_spec.is_looping() {
        return Some(one_play);
    }
    match (loop_spec.repetitions, loop_spec.target_duration) {
        (Repetitions::Infinite, None) => None,
        (Repetitions::Infinite, Some(target)) => Some(target),
        (Repetitions::Finite(n), None) => Some(one_play * n as f64),
        (Repetitions::Finite(n), Some(target)) => Some(target.min(one_play * n as f64)),
    }
}

/// Maps a timeline offset `t` (seconds, relative to the segment's
/// `timeline_start_time`) to a source-time offset (seconds, relative to
/// `source_start_time`), wrapping for looping. Returns `None` if `t` falls after the
/// segment's occupancy (only possible when it's bounded).
pub fn map_timeline_offset_to_source(t: f64, settings: &AudioSegmentSettings, source_duration: f64) -> Option<f64> {
    if t < 0.0 || source_duration <= 0.0 {
        return None;
    }
    if let Some(total) = segment_timeline_duration(settings, source_duration) {
        if t >= total {
            return None;
        }
    }
    let rate = playback_rate(settings, source_duration);
    if rate <= 0.0 {
        return None;
    }
    let source_elapsed = t * rate;
    Some(source_elapsed % source_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_api::LoopSpec;

    fn settings_with_loop(loop_spec: LoopSpec) -> AudioSegmentSettings {
        AudioSegmentSettings {
            loop_spec,
            ..AudioSegmentSettings::default()
        }
    }

    #[test]
    fn non_looping_duration_is_one_play() {
        let settings = AudioSegmentSettings::default();
        assert!((segment_timeline_duration(&settings, 4.0).unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn target_duration_uncapped_when_repetitions_infinite() {
        let settings = settings_with_loop(LoopSpec {
            repetitions: Repetitions::Infinite,
            target_duration: Some(7.0),
        });
        assert_eq!(segment_timeline_duration(&settings, 2.0), Some(7.0));
    }

    #[test]
    fn repetitions_cap_the_target_duration_fill() {
        let settings = settings_with_loop(LoopSpec {
            repetitions: Repetitions::Finite(2),
            target_duration: Some(100.0),
        });
        // 2 reps of a 2s loop = 4s, which is less than the 100s target.
        assert_eq!(segment_timeline_duration(&settings, 2.0), Some(4.0));
    }

    #[test]
    fn infinite_no_target_is_unbounded() {
        let settings = settings_with_loop(LoopSpec {
            repetitions: Repetitions::Infinite,
            target_duration: None,
        });
        assert_eq!(segment_timeline_duration(&settings, 2.0), None);
    }

    #[test]
    fn mapping_wraps_across_loop_boundaries() {
        let settings = settings_with_loop(LoopSpec {
            repetitions: Repetitions::Finite(4),
            target_duration: None,
        });
        // 2s source, so timeline offset 2.5s should map to source offset 0.5s.
        let mapped = map_timeline_offset_to_source(2.5, &settings, 2.0).unwrap();
        assert!((mapped - 0.5).abs() < 1e-9);
    }

    #[test]
    fn mapping_past_occupancy_is_none() {
        let settings = settings_with_loop(LoopSpec {
            repetitions: Repetitions::Finite(1),
            target_duration: None,
        });
        assert!(map_timeline_offset_to_source(5.0, &settings, 2.0).is_none());
    }
}
