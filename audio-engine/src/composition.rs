//! `Composition` (§3, §4.5) — mixes all tracks into a timeline-addressable stream and
//! exposes the transport controls an external sync source drives.

use engine_api::{AudioFormat, EngineError, EngineResult};

use crate::provider::{ListenerSlot, Provider, ProviderListener};
use crate::track::Track;

/// Composition-level transport state, driven either by `pull` (free-running) or by
/// `advance_by_sync_ticks` when `is_sync_driven` is set (§4.5).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TransportState {
    Stopped,
    Playing,
}

/// The non-destructive timeline mix of every track (§3 `Composition`). Any structural
/// mutation sets `dirty_flag` (§3 invariant); the renderer itself never clips (§4.5).
#[derive(Debug)]
pub struct Composition {
    format: AudioFormat,
    tracks: Vec<Track>,
    master_volume: f64,
    dirty: bool,
    metadata: Option<String>,
    play_cursor_seconds: f64,
    transport: TransportState,
    is_sync_driven: bool,
    ticks_to_frames: f64,
    tempo_bpm: f64,
    mix_scratch: Vec<f32>,
    listeners: ListenerSlot,
}

impl Composition {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            tracks: Vec::new(),
            master_volume: 1.0,
            dirty: false,
            metadata: None,
            play_cursor_seconds: 0.0,
            transport: TransportState::Stopped,
            is_sync_driven: false,
            ticks_to_frames: 1.0,
            tempo_bpm: 120.0,
            mix_scratch: Vec::new(),
            listeners: ListenerSlot::default(),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f64) {
        self.master_volume = volume.max(0.0);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag, typically after a host has persisted the composition.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn set_metadata(&mut self, metadata: Option<String>) {
        self.metadata = metadata;
        self.dirty = true;
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
        self.dirty = true;
    }

    pub fn remove_track(&mut self, index: usize) -> Track {
        self.dirty = true;
        self.tracks.remove(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.dirty = true;
        self.tracks.get_mut(index)
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn set_tempo_bpm(&mut self, tempo_bpm: f64) {
        self.tempo_bpm = tempo_bpm.max(1.0);
    }

    pub fn set_sync_driven(&mut self, is_sync_driven: bool, ticks_to_frames: f64) {
        self.is_sync_driven = is_sync_driven;
        self.ticks_to_frames = ticks_to_frames;
    }

    /// `calculate_total_duration()` (§4.5): max of per-track max `timeline_end_time`,
    /// `None` if any track is unbounded (an open-ended loop, §9 open question (ii)).
    pub fn calculate_total_duration(&self) -> Option<f64> {
        self.tracks.iter().fold(Some(0.0), |acc, track| {
            match (acc, track.max_timeline_end_time()) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            }
        })
    }

    /// Which tracks' output should be summed this block, resolving the solo rule
    /// (§4.5): "if any track has is_soloed=true, only soloed and non-muted tracks
    /// contribute; else non-muted tracks contribute."
    ///
    /// Mute is still applied per-track inside `Track::render` (it zeroes the whole
    /// track); what this decides is purely whether a *non-soloed* track is skipped
    /// entirely when some other track is soloed.
    fn contributing_track_indices(&self) -> Vec<usize> {
        let any_solo = self.tracks.iter().any(|t| t.settings().is_soloed);
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                if any_solo {
                    t.settings().is_soloed && !t.settings().is_muted
                } else {
                    !t.settings().is_muted
                }
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Sums every contributing track for `[timeline_start, timeline_start +
    /// frame_count / sample_rate)`, then applies master volume once (§4.5). No
    /// clipping is performed here (§4.5 "Clipping... the renderer does not clip").
    pub fn render_into(&mut self, timeline_start: f64, frame_count: usize, out: &mut [f32]) {
        let channels = self.format.channel_count();
        assert_eq!(out.len(), frame_count * channels, "output buffer size mismatch");
        out.fill(0.0);

        let required_len = frame_count * channels;
        if self.mix_scratch.len() < required_len {
            self.mix_scratch.resize(required_len, 0.0);
        }

        let contributing = self.contributing_track_indices();
        for index in contributing {
            let scratch = &mut self.mix_scratch[..required_len];
            self.tracks[index].render(timeline_start, frame_count, scratch);
            for (dst, src) in out.iter_mut().zip(scratch.iter()) {
                *dst += *src;
            }
        }

        let master_volume = self.master_volume;
        if (master_volume - 1.0).abs() > f64::EPSILON {
            for sample in out.iter_mut() {
                *sample = (*sample as f64 * master_volume) as f32;
            }
        }
    }

    /// Offline render: exact-length buffer for `[timeline_start, timeline_start +
    /// duration)`, independent of the streaming play cursor (§4.5 "render").
    pub fn render(&mut self, timeline_start: f64, duration: f64) -> Vec<f32> {
        let channels = self.format.channel_count();
        let frame_count = (duration * self.format.sample_rate_hz() as f64).round().max(0.0) as usize;
        let mut out = vec![0.0f32; frame_count * channels];
        self.render_into(timeline_start, frame_count, &mut out);
        out
    }

    /// Streaming pull: renders the next `frame_count` frames starting at the current
    /// play cursor, then advances the cursor (§4.5 "pull"). A no-op (silence) while
    /// stopped or sync-driven (an external clock owns cursor advancement in that
    /// case, via `advance_by_sync_ticks`).
    pub fn pull(&mut self, frame_count: usize, out: &mut [f32]) {
        let channels = self.format.channel_count();
        assert_eq!(out.len(), frame_count * channels, "output buffer size mismatch");
        if self.transport != TransportState::Playing {
            out.fill(0.0);
            return;
        }
        let timeline_start = self.play_cursor_seconds;
        self.render_into(timeline_start, frame_count, out);
        if !self.is_sync_driven {
            self.play_cursor_seconds += frame_count as f64 / self.format.sample_rate_hz() as f64;
        }
    }

    /// Moves the play cursor to `timeline_position` seconds, clamped to non-negative.
    pub fn seek_to(&mut self, timeline_position: f64) {
        self.play_cursor_seconds = timeline_position.max(0.0);
    }

    pub fn position_seconds(&self) -> f64 {
        self.play_cursor_seconds
    }

    pub fn play(&mut self) {
        self.transport = TransportState::Playing;
    }

    pub fn stop(&mut self) {
        self.transport = TransportState::Stopped;
        self.play_cursor_seconds = 0.0;
    }

    /// Resumes playback from the current cursor without rewinding, unlike `stop`
    /// followed by `play` (§4.5 "continue").
    pub fn resume(&mut self) {
        self.transport = TransportState::Playing;
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport
    }

    /// Read-only value used by MIDI sync (out of scope beyond exposing it, §4.5).
    pub fn get_tempo_at_current_position(&self) -> f64 {
        self.tempo_bpm
    }

    /// When `is_sync_driven`, an external clock advances the play cursor by `n *
    /// ticks_to_frames` (in frames) instead of `pull` advancing it (§4.5).
    pub fn advance_by_sync_ticks(&mut self, n: u64) -> EngineResult<()> {
        if !self.is_sync_driven {
            return Err(EngineError::invalid_operation(
                "advance_by_sync_ticks called while the composition is not sync-driven",
            ));
        }
        let frames = n as f64 * self.ticks_to_frames;
        self.play_cursor_seconds += frames / self.format.sample_rate_hz() as f64;
        Ok(())
    }

    /// The play cursor expressed as an interleaved sample index, matching the
    /// `Provider::seek`/`read` convention (§6).
    fn position_samples(&self) -> i64 {
        let frame = (self.play_cursor_seconds * self.format.sample_rate_hz() as f64).round() as i64;
        frame * self.format.channel_count() as i64
    }
}

impl Provider for Composition {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let channels = self.channel_count();
        if channels == 0 || out.len() % channels != 0 {
            self.listeners.notify_read(self.position_samples(), 0);
            return 0;
        }
        if let Some(total) = self.calculate_total_duration() {
            if self.play_cursor_seconds >= total {
                self.listeners.notify_read(self.position_samples(), 0);
                return 0;
            }
        }
        let frame_count = out.len() / channels;
        let timeline_start = self.play_cursor_seconds;
        self.render_into(timeline_start, frame_count, out);
        self.play_cursor_seconds += frame_count as f64 / self.format.sample_rate_hz() as f64;
        self.listeners.notify_read(self.position_samples(), out.len());
        out.len()
    }

    fn length_samples(&self) -> Option<i64> {
        self.calculate_total_duration()
            .map(|d| (d * self.format.sample_rate_hz() as f64).round() as i64 * self.format.channel_count() as i64)
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate_hz()
    }

    fn channel_count(&self) -> usize {
        self.format.channel_count()
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, sample_offset: i64) {
        let channels = self.channel_count().max(1) as i64;
        let frame = sample_offset / channels;
        self.seek_to(frame as f64 / self.format.sample_rate_hz() as f64);
        self.listeners.notify_seek(self.position_samples());
    }

    fn set_listener(&mut self, listener: Option<Box<dyn ProviderListener>>) {
        self.listeners.set(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryProvider;
    use crate::segment::AudioSegment;
    use engine_api::{AudioSegmentSettings, ChannelLayout};

    fn dc_track(name: &str, value: f32, sample_rate: u32) -> Track {
        let mut track = Track::new(name, sample_rate, 1);
        let provider = InMemoryProvider::new(vec![value; sample_rate as usize], 1, sample_rate);
        track.add_segment(AudioSegment::new(
            Box::new(provider),
            true,
            0.0,
            0.0,
            1.0,
            AudioSegmentSettings::default(),
            sample_rate,
            1,
        ));
        track
    }

    #[test]
    fn total_duration_is_max_over_tracks() {
        let mut comp = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        comp.add_track(dc_track("a", 0.5, 1000));
        assert_eq!(comp.calculate_total_duration(), Some(1.0));
    }

    #[test]
    fn solo_excludes_non_soloed_non_muted_tracks() {
        let mut comp = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        comp.add_track(dc_track("a", 1.0, 1000));
        comp.add_track(dc_track("b", 1.0, 1000));
        comp.track_mut(0).unwrap().settings_mut().is_soloed = true;
        let out = comp.render(0.0, 1.0);
        // Only track "a" contributes now that it's soloed.
        assert!((out[500] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn master_volume_scales_the_final_sum() {
        let mut comp = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        comp.add_track(dc_track("a", 0.5, 1000));
        comp.add_track(dc_track("b", 0.5, 1000));
        comp.set_master_volume(0.5);
        let out = comp.render(0.0, 1.0);
        assert!((out[500] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rendering_same_range_twice_is_deterministic() {
        let mut comp = Composition::new(AudioFormat::new(1000, 2, ChannelLayout::Stereo));
        comp.add_track(dc_track("a", 0.3, 1000));
        let out1 = comp.render(0.0, 0.5);
        let out2 = comp.render(0.0, 0.5);
        assert_eq!(out1, out2);
    }

    #[test]
    fn sum_of_tracks_equals_composition_render() {
        let mut comp = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        comp.add_track(dc_track("a", 0.2, 1000));
        comp.add_track(dc_track("b", 0.3, 1000));
        let combined = comp.render(0.0, 1.0);

        let mut a_only = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        a_only.add_track(dc_track("a", 0.2, 1000));
        let a = a_only.render(0.0, 1.0);

        let mut b_only = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        b_only.add_track(dc_track("b", 0.3, 1000));
        let b = b_only.render(0.0, 1.0);

        for i in 0..combined.len() {
            let err = (combined[i] - (a[i] + b[i])).abs();
            assert!(err < 1e-6, "mismatch at {i}: {} vs {}", combined[i], a[i] + b[i]);
        }
    }

    #[test]
    fn dirty_flag_set_by_structural_mutation() {
        let mut comp = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        assert!(!comp.is_dirty());
        comp.add_track(dc_track("a", 0.5, 1000));
        assert!(comp.is_dirty());
    }

    #[test]
    fn sync_driven_advance_requires_sync_driven_flag() {
        let mut comp = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        assert!(comp.advance_by_sync_ticks(4).is_err());
        comp.set_sync_driven(true, 10.0);
        assert!(comp.advance_by_sync_ticks(4).is_ok());
        assert!((comp.position_seconds() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn provider_read_ends_at_total_duration() {
        let mut comp = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        comp.add_track(dc_track("a", 1.0, 1000));
        comp.seek_to(0.0);
        let mut out = vec![0.0f32; 1000];
        assert_eq!(Provider::read(&mut comp, &mut out), 1000);
        let mut out2 = vec![0.0f32; 10];
        assert_eq!(Provider::read(&mut comp, &mut out2), 0);
    }

    #[derive(Debug, Default)]
    struct CountingListener {
        position_changed_count: u32,
        end_of_stream_count: u32,
    }

    impl ProviderListener for CountingListener {
        fn on_end_of_stream(&mut self) {
            self.end_of_stream_count += 1;
        }

        fn on_position_changed(&mut self, _position_samples: i64) {
            self.position_changed_count += 1;
        }
    }

    #[test]
    fn provider_fires_position_changed_and_end_of_stream_once() {
        use std::sync::{Arc, Mutex};

        #[derive(Debug)]
        struct SharedListener(Arc<Mutex<CountingListener>>);

        impl ProviderListener for SharedListener {
            fn on_end_of_stream(&mut self) {
                self.0.lock().unwrap().on_end_of_stream();
            }

            fn on_position_changed(&mut self, position_samples: i64) {
                self.0.lock().unwrap().on_position_changed(position_samples);
            }
        }

        let mut comp = Composition::new(AudioFormat::new(1000, 1, ChannelLayout::Mono));
        comp.add_track(dc_track("a", 1.0, 1000));
        comp.seek_to(0.0);
        let shared = Arc::new(Mutex::new(CountingListener::default()));
        Provider::set_listener(&mut comp, Some(Box::new(SharedListener(shared.clone()))));

        let mut out = vec![0.0f32; 500];
        Provider::read(&mut comp, &mut out);
        Provider::read(&mut comp, &mut out);
        Provider::read(&mut comp, &mut out);
        Provider::read(&mut comp, &mut out);

        let recorded = shared.lock().unwrap();
        assert_eq!(recorded.position_changed_count, 2);
        assert_eq!(recorded.end_of_stream_count, 1);
    }
}
