//! `Track` (§3, §4.4) — an ordered collection of segments with per-track
//! mute/solo/volume/pan and an optional analyzer chain.

use engine_api::TrackSettings;

use crate::modifier::AnalyzerChain;
use crate::segment::AudioSegment;
use crate::supplier::pan_volume;

/// A named track: segments may overlap on the timeline (§3 invariant); summation is
/// order-independent, the ordering is only for user-visible listing (§4.4).
#[derive(Debug)]
pub struct Track {
    name: String,
    segments: Vec<AudioSegment>,
    settings: TrackSettings,
    analyzers: AnalyzerChain,
    sample_rate: u32,
    channels: usize,
    mix_scratch: Vec<f32>,
}

impl Track {
    pub fn new(name: impl Into<String>, sample_rate: u32, channels: usize) -> Self {
        Self {
            name: name.into(),
            segments: Vec::new(),
            settings: TrackSettings::default(),
            analyzers: AnalyzerChain::new(),
            sample_rate,
            channels,
            mix_scratch: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TrackSettings {
        &mut self.settings
    }

    pub fn analyzers_mut(&mut self) -> &mut AnalyzerChain {
        &mut self.analyzers
    }

    /// Appends a segment. Listing order for display purposes only (§4.4); insertion
    /// order also breaks ties when two segments share `timeline_start_time` (§3).
    pub fn add_segment(&mut self, segment: AudioSegment) {
        self.segments.push(segment);
    }

    pub fn remove_segment(&mut self, index: usize) -> AudioSegment {
        self.segments.remove(index)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[AudioSegment] {
        &self.segments
    }

    /// Segments in ascending `timeline_start_time` order, ties broken by original
    /// insertion order (§3 "ordering is by timeline_start_time ascending with ties
    /// broken by insertion order"). For display/listing only.
    pub fn segments_for_listing(&self) -> Vec<&AudioSegment> {
        let mut indexed: Vec<(usize, &AudioSegment)> = self.segments.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| {
            a.timeline_start_time()
                .partial_cmp(&b.timeline_start_time())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });
        indexed.into_iter().map(|(_, seg)| seg).collect()
    }

    /// Maximum `timeline_end_time` across every segment, `None` if the track is
    /// empty or contains an unbounded (open-ended loop) segment.
    pub fn max_timeline_end_time(&self) -> Option<f64> {
        self.segments
            .iter()
            .map(|s| s.timeline_end_time())
            .fold(Some(0.0), |acc, end| match (acc, end) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            })
    }

    /// Sums every intersecting segment's output for `[timeline_start, timeline_start
    /// + frame_count / sample_rate)`, then applies track volume/pan/mute and runs the
    /// analyzer chain (§4.4). Mute multiplies by zero; solo is resolved by the
    /// composition (§4.5), not here.
    pub fn render(&mut self, timeline_start: f64, frame_count: usize, out: &mut [f32]) {
        assert_eq!(out.len(), frame_count * self.channels, "output buffer size mismatch");
        out.fill(0.0);

        let request_end = timeline_start + frame_count as f64 / self.sample_rate as f64;
        let required_len = frame_count * self.channels;
        if self.mix_scratch.len() < required_len {
            self.mix_scratch.resize(required_len, 0.0);
        }

        for segment in &mut self.segments {
            let seg_start = segment.timeline_start_time();
            let seg_end = segment.timeline_end_time().unwrap_or(f64::INFINITY);
            if seg_start >= request_end || seg_end <= timeline_start {
                continue;
            }
            let scratch = &mut self.mix_scratch[..required_len];
            segment.render(timeline_start, frame_count, scratch);
            for (dst, src) in out.iter_mut().zip(scratch.iter()) {
                *dst += *src;
            }
        }

        let gain = if self.settings.is_muted { 0.0 } else { self.settings.volume };
        for frame in out.chunks_mut(self.channels) {
            pan_volume::apply_volume_and_pan(frame, gain, self.settings.pan);
        }

        if !self.analyzers.is_empty() {
            let buf = crate::buffer::AudioBuf::from_slice(out, self.channels, frame_count);
            self.analyzers.observe(&buf);
        }
    }
}
