//! `AudioSegment` (§4.3) — a positioned clip on the timeline; the atomic unit of
//! non-destructive editing.

use engine_api::AudioSegmentSettings;
use engine_base::rt_warn;

use crate::provider::Provider;
use crate::resample::resample_linear;
use crate::supplier::{fade, loop_calc, pan_volume};
use crate::wsola::{WsolaParams, WsolaPreset, WsolaStretcher};

/// A clip: a window of a [`Provider`]'s source material, positioned on the timeline
/// with independent volume/pan/reversal/speed/stretch/fade/loop settings.
pub struct AudioSegment {
    provider: Box<dyn Provider>,
    owns_provider: bool,
    timeline_start_time: f64,
    source_start_time: f64,
    source_duration: f64,
    settings: AudioSegmentSettings,
    sample_rate: u32,
    channels: usize,
    one_play_cache: Option<Vec<f32>>,
}

impl std::fmt::Debug for AudioSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSegment")
            .field("timeline_start_time", &self.timeline_start_time)
            .field("source_start_time", &self.source_start_time)
            .field("source_duration", &self.source_duration)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AudioSegment {
    pub fn new(
        provider: Box<dyn Provider>,
        owns_provider: bool,
        timeline_start_time: f64,
        source_start_time: f64,
        source_duration: f64,
        settings: AudioSegmentSettings,
        sample_rate: u32,
        channels: usize,
    ) -> Self {
        Self {
            provider,
            owns_provider,
            timeline_start_time,
            source_start_time,
            source_duration,
            settings,
            sample_rate,
            channels,
            one_play_cache: None,
        }
    }

    pub fn timeline_start_time(&self) -> f64 {
        self.timeline_start_time
    }

    /// `None` means unbounded (an infinite loop with no `target_duration`, §9 open
    /// question (ii)) — callers that need a concrete end (e.g. total-duration
    /// calculation) should treat `None` as "extends to whatever bounds the rest of
    /// the track".
    pub fn timeline_duration(&self) -> Option<f64> {
        loop_calc::segment_timeline_duration(&self.settings, self.source_duration)
    }

    pub fn timeline_end_time(&self) -> Option<f64> {
        self.timeline_duration().map(|d| self.timeline_start_time + d)
    }

    pub fn owns_provider(&self) -> bool {
        self.owns_provider
    }

    pub fn settings(&self) -> &AudioSegmentSettings {
        &self.settings
    }

    /// Mutates settings and invalidates the cached one-play render, so the next
    /// `render` reflects the change.
    pub fn settings_mut(&mut self) -> SettingsMut<'_> {
        SettingsMut { segment: self }
    }

    /// Renders the portion of this segment's source that falls within
    /// `[timeline_start, timeline_start + frame_count / sample_rate)` into `out`
    /// (silence outside the segment's occupancy, per §4.3 step 1).
    pub fn render(&mut self, timeline_start: f64, frame_count: usize, out: &mut [f32]) {
        assert_eq!(out.len(), frame_count * self.channels, "output buffer size mismatch");
        out.fill(0.0);

        let total_duration = self.timeline_duration();
        let timeline_end = total_duration
            .map(|d| self.timeline_start_time + d)
            .unwrap_or(f64::INFINITY);
        let request_start = timeline_start;
        let request_end = timeline_start + frame_count as f64 / self.sample_rate as f64;
        let overlap_start = request_start.max(self.timeline_start_time);
        let overlap_end = request_end.min(timeline_end);
        if overlap_start >= overlap_end {
            return;
        }

        self.ensure_one_play_cache();
        let Some(one_play) = self.one_play_cache.as_ref() else {
            return;
        };
        let channels = self.channels;
        let one_play_frames = one_play.len() / channels;
        if one_play_frames == 0 {
            return;
        }
        let one_play_duration = one_play_frames as f64 / self.sample_rate as f64;

        let first_frame = (((overlap_start - request_start) * self.sample_rate as f64).round() as usize).min(frame_count);
        let last_frame = (((overlap_end - request_start) * self.sample_rate as f64).round() as usize).min(frame_count);

        for frame_i in first_frame..last_frame {
            let t_abs = request_start + frame_i as f64 / self.sample_rate as f64;
            let t_rel = t_abs - self.timeline_start_time;
            let pos_in_cycle = if one_play_duration > 0.0 {
                t_rel.rem_euclid(one_play_duration)
            } else {
                0.0
            };
            let mut src_frame = (pos_in_cycle * self.sample_rate as f64).round() as usize;
            if src_frame >= one_play_frames {
                src_frame = one_play_frames - 1;
            }

            let gain = fade::fade_gain(
                t_rel,
                total_duration.unwrap_or(f64::INFINITY),
                self.settings.fade_in_duration,
                self.settings.fade_in_curve,
                self.settings.fade_out_duration,
                self.settings.fade_out_curve,
            ) as f32;

            let out_frame = &mut out[frame_i * channels..(frame_i + 1) * channels];
            let src = &one_play[src_frame * channels..(src_frame + 1) * channels];
            for (dst, src) in out_frame.iter_mut().zip(src.iter()) {
                *dst = *src * gain;
            }
            pan_volume::apply_volume_and_pan(out_frame, self.settings.volume, self.settings.pan);
        }
    }

    fn invalidate_cache(&mut self) {
        self.one_play_cache = None;
    }

    fn ensure_one_play_cache(&mut self) {
        if self.one_play_cache.is_none() {
            self.one_play_cache = Some(self.build_one_play());
        }
    }

    /// Renders exactly one, un-looped, un-faded, un-panned play-through of the
    /// source window: pulled from the provider, stretched or resampled, then
    /// reversed if configured (§4.3 steps 2-4).
    fn build_one_play(&mut self) -> Vec<f32> {
        let channels = self.channels;
        let source_frames = (self.source_duration * self.sample_rate as f64).round().max(0.0) as usize;
        let mut source_buf = vec![0.0f32; source_frames * channels];
        if source_frames > 0 {
            let start_sample = (self.source_start_time * self.sample_rate as f64).round() as i64 * channels as i64;
            self.provider.seek(start_sample);
            let read = self.provider.read(&mut source_buf);
            if read < source_buf.len() {
                rt_warn!(
                    "segment source underrun: requested {} samples, got {}",
                    source_buf.len(),
                    read
                );
            }
        }

        let stretch = self.settings.effective_time_stretch_factor(self.source_duration);
        let rate = loop_calc::playback_rate(&self.settings, self.source_duration);
        let mut output = if (stretch - 1.0).abs() > f64::EPSILON {
            run_wsola_pass(&source_buf, channels, rate)
        } else if (self.settings.speed_factor - 1.0).abs() > f64::EPSILON {
            run_resample_pass(&source_buf, channels, self.settings.speed_factor)
        } else {
            source_buf
        };

        if self.settings.is_reversed {
            reverse_frames(&mut output, channels);
        }
        output
    }
}

pub struct SettingsMut<'a> {
    segment: &'a mut AudioSegment,
}

impl<'a> std::ops::Deref for SettingsMut<'a> {
    type Target = AudioSegmentSettings;
    fn deref(&self) -> &Self::Target {
        &self.segment.settings
    }
}

impl<'a> std::ops::DerefMut for SettingsMut<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.segment.settings
    }
}

impl<'a> Drop for SettingsMut<'a> {
    fn drop(&mut self) {
        self.segment.invalidate_cache();
    }
}

fn reverse_frames(buf: &mut [f32], channels: usize) {
    let frame_count = buf.len() / channels;
    for i in 0..frame_count / 2 {
        let j = frame_count - 1 - i;
        for c in 0..channels {
            buf.swap(i * channels + c, j * channels + c);
        }
    }
}

fn run_resample_pass(source: &[f32], channels: usize, rate: f64) -> Vec<f32> {
    let source_frames = source.len() / channels;
    let output_frames = ((source_frames as f64) / rate).round().max(0.0) as usize;
    let mut output = vec![0.0f32; output_frames * channels];
    let mut cursor = 0.0;
    resample_linear(source, channels, &mut cursor, rate, &mut output);
    output
}

fn run_wsola_pass(source: &[f32], channels: usize, speed: f64) -> Vec<f32> {
    let params = WsolaParams::preset(WsolaPreset::Balanced);
    let mut stretcher = WsolaStretcher::new(channels, params).expect("balanced preset is always valid");
    stretcher
        .set_speed(speed)
        .expect("playback rate is always positive (settings are validated upstream)");

    let synthesis_hop_samples = params.synthesis_hop_frames * channels;
    let mut scratch = vec![0.0f32; synthesis_hop_samples];
    let mut out = Vec::with_capacity((source.len() as f64 / speed).round() as usize + synthesis_hop_samples);

    let chunk_frames = params.synthesis_hop_frames;
    let mut cursor = 0usize;
    let max_iterations = source.len() / synthesis_hop_samples.max(1) + 16;
    let mut iterations = 0;
    loop {
        iterations += 1;
        if iterations > max_iterations {
            rt_warn!("wsola pass exceeded expected iteration bound, stopping early");
            break;
        }
        let end = (cursor + chunk_frames * channels).min(source.len());
        let step = stretcher.process(&source[cursor..end], &mut scratch);
        cursor += step.input_consumed_samples;
        if step.output_written_samples > 0 {
            out.extend_from_slice(&scratch[..step.output_written_samples]);
        }
        if cursor >= source.len() && step.output_written_samples == 0 {
            break;
        }
    }

    loop {
        let mut flush_buf = vec![0.0f32; synthesis_hop_samples];
        let written = stretcher.flush(&mut flush_buf);
        if written == 0 {
            break;
        }
        out.extend_from_slice(&flush_buf[..written]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InMemoryProvider, SeededNoiseProvider};
    use engine_api::{FadeCurve, LoopSpec, Repetitions};

    fn ramp_provider(sample_rate: u32, duration: f64) -> InMemoryProvider {
        let frames = (sample_rate as f64 * duration).round() as usize;
        let data: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        InMemoryProvider::new(data, 1, sample_rate)
    }

    #[test]
    fn silence_outside_timeline_range() {
        let provider = ramp_provider(1000, 1.0);
        let mut segment = AudioSegment::new(
            Box::new(provider),
            true,
            1.0,
            0.0,
            1.0,
            AudioSegmentSettings::default(),
            1000,
            1,
        );
        let mut out = vec![1.0f32; 100];
        segment.render(0.0, 100, &mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn lossless_passthrough_mono_noise() {
        let noise = SeededNoiseProvider::render_all(0xC0FFEE, 1, 1000, 1000);
        let provider = InMemoryProvider::new(noise.clone(), 1, 1000);
        let mut segment = AudioSegment::new(
            Box::new(provider),
            true,
            0.0,
            0.0,
            1.0,
            AudioSegmentSettings::default(),
            1000,
            1,
        );
        let mut out = vec![0.0f32; 1000];
        segment.render(0.0, 1000, &mut out);
        let mut sum_sq_err = 0.0f64;
        for (a, b) in out.iter().zip(noise.iter()) {
            let err = (*a - *b) as f64;
            sum_sq_err += err * err;
        }
        let rms = (sum_sq_err / out.len() as f64).sqrt();
        assert!(rms <= 1e-6, "rms error {rms} too large");
    }

    #[test]
    fn reverse_flips_ramp() {
        let provider = ramp_provider(1000, 1.0);
        let mut settings = AudioSegmentSettings::default();
        settings.is_reversed = true;
        let mut segment = AudioSegment::new(Box::new(provider), true, 0.0, 0.0, 1.0, settings, 1000, 1);
        let mut out = vec![0.0f32; 1000];
        segment.render(0.0, 1000, &mut out);
        // out[0] should be close to 1.0 (end of the ramp), out[999] close to 0.0.
        assert!(out[0] > 0.95, "expected near-1.0, got {}", out[0]);
        assert!(out[999] < 0.05, "expected near-0.0, got {}", out[999]);
    }

    #[test]
    fn linear_fade_in_midpoint_is_half_of_dc_signal() {
        let data = vec![1.0f32; 1000];
        let provider = InMemoryProvider::new(data, 1, 1000);
        let mut settings = AudioSegmentSettings::default();
        settings.fade_in_duration = 1.0;
        settings.fade_in_curve = FadeCurve::Linear;
        let mut segment = AudioSegment::new(Box::new(provider), true, 0.0, 0.0, 1.0, settings, 1000, 1);
        let mut out = vec![0.0f32; 1000];
        segment.render(0.0, 1000, &mut out);
        assert!((out[500] - 0.5).abs() < 1e-3, "got {}", out[500]);
    }

    #[test]
    fn loops_by_target_duration() {
        let data: Vec<f32> = (0..2000).map(|i| (i % 2000) as f32 / 2000.0).collect();
        let provider = InMemoryProvider::new(data, 1, 1000);
        let mut settings = AudioSegmentSettings::default();
        settings.loop_spec = LoopSpec {
            repetitions: Repetitions::Infinite,
            target_duration: Some(7.0),
        };
        let mut segment = AudioSegment::new(Box::new(provider), true, 0.0, 0.0, 2.0, settings, 1000, 1);
        assert_eq!(segment.timeline_duration(), Some(7.0));
        let mut out = vec![0.0f32; 7000];
        segment.render(0.0, 7000, &mut out);
        // The 1s prefix of the fourth (partial) loop should match the start of the loop.
        assert!((out[6000] - out[0]).abs() < 1e-3);
    }
}
