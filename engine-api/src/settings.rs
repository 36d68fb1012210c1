use crate::curve::FadeCurve;
use serde::{Deserialize, Serialize};

/// How a segment repeats its source window along the timeline.
///
/// Two ways to bound a loop are supported, matching §3/§9 of the spec:
/// - `repetitions` caps the number of times the source window is repeated.
/// - `target_duration` fills a fixed span of timeline, uncapped unless `repetitions`
///   is also set, in which case `repetitions` wins (§4.3 item 2).
///
/// `Repetitions::Infinite` with no `target_duration` is Open Question (ii): resolved
/// here as "repeat until the track timeline ends" (see DESIGN.md).
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct LoopSpec {
    pub repetitions: Repetitions,
    pub target_duration: Option<f64>,
}

impl Default for LoopSpec {
    fn default() -> Self {
        Self {
            repetitions: Repetitions::Finite(1),
            target_duration: None,
        }
    }
}

impl LoopSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_looping(&self) -> bool {
        !matches!(self.repetitions, Repetitions::Finite(1)) || self.target_duration.is_some()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum Repetitions {
    Finite(u32),
    Infinite,
}

/// Per-segment settings (§3 `AudioSegmentSettings`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioSegmentSettings {
    pub volume: f64,
    pub pan: f64,
    pub is_reversed: bool,
    pub speed_factor: f64,
    pub time_stretch_factor: f64,
    pub target_stretch_duration: Option<f64>,
    pub fade_in_duration: f64,
    pub fade_in_curve: FadeCurve,
    pub fade_out_duration: f64,
    pub fade_out_curve: FadeCurve,
    pub loop_spec: LoopSpec,
}

impl Default for AudioSegmentSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            is_reversed: false,
            speed_factor: 1.0,
            time_stretch_factor: 1.0,
            target_stretch_duration: None,
            fade_in_duration: 0.0,
            fade_in_curve: FadeCurve::default(),
            fade_out_duration: 0.0,
            fade_out_curve: FadeCurve::default(),
            loop_spec: LoopSpec::default(),
        }
    }
}

impl AudioSegmentSettings {
    /// The time-stretch factor after resolving the "target duration wins" rule from
    /// §3: if both are set, `target_stretch_duration` recomputes the factor relative
    /// to `source_duration`.
    pub fn effective_time_stretch_factor(&self, source_duration: f64) -> f64 {
        match self.target_stretch_duration {
            Some(target) if source_duration > 0.0 => target / source_duration,
            _ => self.time_stretch_factor,
        }
    }
}

/// Per-track settings (§3 `Track`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackSettings {
    pub volume: f64,
    pub pan: f64,
    pub is_muted: bool,
    pub is_soloed: bool,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            is_muted: false,
            is_soloed: false,
        }
    }
}

/// Constant-power pan law (§4.3 item 6): returns `(gain_left, gain_right)`.
pub fn constant_power_pan(pan: f64) -> (f64, f64) {
    let pan = pan.clamp(-1.0, 1.0);
    let angle = (pan + 1.0) * std::f64::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}
