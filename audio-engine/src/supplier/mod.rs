//! Per-segment rendering building blocks (§4.3), kept as small, independently
//! testable pure-function modules rather than the teacher's nested generic supplier
//! chain (`AdHocFader<Resampler<TimeStretcher<...>>>`) — the algorithms are the same
//! shape, composed directly in [`crate::segment`] instead of through an extra layer
//! of zero-sized wrapper types, since this crate's chain is fixed per segment rather
//! than assembled dynamically per recording/playback mode.

pub mod fade;
pub mod loop_calc;
pub mod pan_volume;
