//! `SoundPlayer` (§4.6) — pulls from a provider (often a [`Composition`] wrapped as
//! one), optionally applies a WSOLA stage or direct resampling, and writes to a
//! mixer.
//!
//! [`Composition`]: crate::composition::Composition

use engine_api::{EngineError, EngineResult};
use engine_base::rt_warn;

use crate::buffer::AudioBufMut;
use crate::modifier::EffectChains;
use crate::provider::Provider;
use crate::resample::resample_linear;
use crate::ring_buffer::SampleBuffer;
use crate::wsola::{WsolaParams, WsolaPreset, WsolaStretcher};

/// Observable playback state (§4.6).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
}

/// The pitch-preserving-speed-change pull stage: either a WSOLA kernel (pitch
/// preserved) or a plain variable-rate resampler (pitch follows speed), matching
/// §4.6 "applies a WSOLA stage... or direct resampling".
enum SpeedStage {
    None,
    Wsola {
        stretcher: WsolaStretcher,
        pull_scratch: Vec<f32>,
        hop_scratch: Vec<f32>,
    },
    Resample {
        input: SampleBuffer,
        cursor: f64,
    },
}

impl std::fmt::Debug for SpeedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedStage::None => f.write_str("SpeedStage::None"),
            SpeedStage::Wsola { .. } => f.write_str("SpeedStage::Wsola"),
            SpeedStage::Resample { .. } => f.write_str("SpeedStage::Resample"),
        }
    }
}

/// Pulls a [`Provider`], optionally stretches/resamples for `playback_speed`, and
/// exposes VCR-style transport plus a modifier/analyzer chain (§4.6-§4.8).
#[derive(Debug)]
pub struct SoundPlayer {
    provider: Box<dyn Provider>,
    owns_provider: bool,
    channels: usize,
    sample_rate: u32,
    state: PlayerState,
    volume: f64,
    playback_speed: f64,
    preserve_pitch: bool,
    quality_preset: WsolaPreset,
    speed_stage: SpeedStage,
    source_frames_played: f64,
    effects: EffectChains,
}

const RESAMPLE_LOOKAHEAD_FRAMES: usize = 8;

impl SoundPlayer {
    pub fn new(provider: Box<dyn Provider>, owns_provider: bool) -> Self {
        let channels = provider.channel_count();
        let sample_rate = provider.sample_rate();
        Self {
            provider,
            owns_provider,
            channels,
            sample_rate,
            state: PlayerState::Stopped,
            volume: 1.0,
            playback_speed: 1.0,
            preserve_pitch: true,
            quality_preset: WsolaPreset::Balanced,
            speed_stage: SpeedStage::None,
            source_frames_played: 0.0,
            effects: EffectChains::new(),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.max(0.0);
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    /// `time` (§4.6): source position in seconds the player has consumed so far.
    pub fn time(&self) -> f64 {
        self.source_frames_played / self.sample_rate as f64
    }

    /// `duration` (§4.6): seconds, or `f64::INFINITY` for an open stream.
    pub fn duration(&self) -> f64 {
        match self.provider.length_samples() {
            Some(samples) => (samples / self.channels.max(1) as i64) as f64 / self.sample_rate as f64,
            None => f64::INFINITY,
        }
    }

    pub fn effects_mut(&mut self) -> &mut EffectChains {
        &mut self.effects
    }

    pub fn play(&mut self) {
        self.state = PlayerState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = PlayerState::Stopped;
        self.seek(0.0);
    }

    /// Seeks the underlying provider and resets the speed stage (discontinuities at
    /// a seek are expected; only the preset-swap path in §4.6 promises sub-window
    /// continuity).
    pub fn seek(&mut self, time_seconds: f64) {
        let frame = (time_seconds.max(0.0) * self.sample_rate as f64).round() as i64;
        self.provider.seek(frame * self.channels as i64);
        self.source_frames_played = frame as f64;
        self.reset_speed_stage();
    }

    /// `playback_speed != 1` with `preserve_pitch=true` wires a WSOLA stage; with
    /// `preserve_pitch=false` wires plain resampling. `speed == 1` disables both
    /// (§4.6).
    pub fn set_playback_speed(&mut self, speed: f64) -> EngineResult<()> {
        if !(speed > 0.0) {
            return Err(EngineError::validation("playback speed must be positive"));
        }
        self.playback_speed = speed;
        self.rebuild_speed_stage()
    }

    pub fn set_preserve_pitch(&mut self, preserve_pitch: bool) -> EngineResult<()> {
        self.preserve_pitch = preserve_pitch;
        self.rebuild_speed_stage()
    }

    /// Reconfigures the internal WSOLA stage in place rather than dropping it, so a
    /// quality change mid-playback only disturbs up to one window boundary (§4.6).
    pub fn set_time_stretch_quality(&mut self, preset: WsolaPreset) -> EngineResult<()> {
        self.quality_preset = preset;
        if let SpeedStage::Wsola { stretcher, pull_scratch, hop_scratch } = &mut self.speed_stage {
            let params = WsolaParams::preset(preset);
            stretcher.configure(params)?;
            stretcher.set_speed(self.playback_speed)?;
            *pull_scratch = vec![0.0; params.synthesis_hop_frames * self.channels];
            *hop_scratch = vec![0.0; params.synthesis_hop_frames * self.channels];
        }
        Ok(())
    }

    fn reset_speed_stage(&mut self) {
        match &mut self.speed_stage {
            SpeedStage::Wsola { stretcher, .. } => stretcher.reset(),
            SpeedStage::Resample { input, cursor } => {
                input.clear();
                *cursor = 0.0;
            }
            SpeedStage::None => {}
        }
    }

    fn rebuild_speed_stage(&mut self) -> EngineResult<()> {
        if (self.playback_speed - 1.0).abs() <= f64::EPSILON {
            self.speed_stage = SpeedStage::None;
            return Ok(());
        }
        if self.preserve_pitch {
            let params = WsolaParams::preset(self.quality_preset);
            let mut stretcher = WsolaStretcher::new(self.channels, params)?;
            stretcher.set_speed(self.playback_speed)?;
            self.speed_stage = SpeedStage::Wsola {
                stretcher,
                pull_scratch: vec![0.0; params.synthesis_hop_frames * self.channels],
                hop_scratch: vec![0.0; params.synthesis_hop_frames * self.channels],
            };
        } else {
            self.speed_stage = SpeedStage::Resample {
                input: SampleBuffer::new(self.channels, RESAMPLE_LOOKAHEAD_FRAMES * 8),
                cursor: 0.0,
            };
        }
        Ok(())
    }

    /// Writes `frame_count` interleaved frames into `out`, applying the speed stage,
    /// volume and the modifier/analyzer chain (§4.6-§4.8). Silence while not
    /// `Playing`.
    pub fn pull(&mut self, frame_count: usize, out: &mut [f32]) {
        assert_eq!(out.len(), frame_count * self.channels, "output buffer size mismatch");
        if self.state != PlayerState::Playing {
            out.fill(0.0);
            return;
        }

        let stage_kind = match &self.speed_stage {
            SpeedStage::None => 0u8,
            SpeedStage::Wsola { .. } => 1u8,
            SpeedStage::Resample { .. } => 2u8,
        };
        match stage_kind {
            0 => self.pull_direct(out),
            1 => self.pull_via_wsola(out),
            _ => self.pull_via_resample(frame_count, out),
        }

        let volume = self.volume;
        if (volume - 1.0).abs() > f64::EPSILON {
            for sample in out.iter_mut() {
                *sample = (*sample as f64 * volume) as f32;
            }
        }

        if !self.effects.modifiers.is_empty() || !self.effects.analyzers.is_empty() {
            let mut buf_mut = AudioBufMut::from_slice(out, self.channels, frame_count);
            self.effects.apply(&mut buf_mut);
        }
    }

    fn pull_direct(&mut self, out: &mut [f32]) {
        let read = self.provider.read(out);
        if read < out.len() {
            out[read..].fill(0.0);
            if read == 0 {
                self.state = PlayerState::Stopped;
            }
        }
        self.source_frames_played += (read / self.channels.max(1)) as f64;
    }

    fn pull_via_resample(&mut self, frame_count: usize, out: &mut [f32]) {
        let channels = self.channels;
        let speed = self.playback_speed;
        let SpeedStage::Resample { input, cursor } = &mut self.speed_stage else {
            unreachable!("pull_via_resample called without a resample stage");
        };

        let needed_frames = (frame_count as f64 * speed).ceil() as usize + RESAMPLE_LOOKAHEAD_FRAMES;
        while input.valid_frames() < needed_frames {
            let free = input.free_frames_at_tail();
            if free == 0 {
                input.ensure_capacity_frames(input.capacity_frames() * 2);
            }
            let mut pull_buf = vec![0.0f32; input.free_frames_at_tail().min(needed_frames) * channels];
            if pull_buf.is_empty() {
                break;
            }
            let read = self.provider.read(&mut pull_buf);
            if read == 0 {
                break;
            }
            input.push_frames(&pull_buf[..read]);
        }

        resample_linear(input.readable(), channels, cursor, speed, out);

        let consumed_frames = (*cursor).floor().max(0.0) as usize;
        let available_frames = input.valid_frames();
        let consumed_frames = consumed_frames.min(available_frames);
        if consumed_frames > 0 {
            input.consume_frames(consumed_frames);
            *cursor -= consumed_frames as f64;
        }
        input.compact();

        self.source_frames_played += frame_count as f64 * speed;
    }

    fn pull_via_wsola(&mut self, out: &mut [f32]) {
        let channels = self.channels;
        let SpeedStage::Wsola { stretcher, pull_scratch, hop_scratch } = &mut self.speed_stage else {
            unreachable!("pull_via_wsola called without a wsola stage");
        };
        let synthesis_hop_samples = stretcher.params().synthesis_hop_frames * channels;
        let mut written = 0usize;
        let mut stalled_iterations = 0usize;

        while written + synthesis_hop_samples <= out.len() {
            let read = self.provider.read(&mut pull_scratch[..]);
            let step = stretcher.process(&pull_scratch[..read], hop_scratch);
            if step.output_written_samples > 0 {
                out[written..written + step.output_written_samples]
                    .copy_from_slice(&hop_scratch[..step.output_written_samples]);
                written += step.output_written_samples;
                self.source_frames_played += step.source_samples_represented / channels as f64;
                stalled_iterations = 0;
            } else if read == 0 {
                let flushed = stretcher.flush(&mut hop_scratch[..]);
                if flushed > 0 {
                    let to_copy = flushed.min(out.len() - written);
                    out[written..written + to_copy].copy_from_slice(&hop_scratch[..to_copy]);
                    written += to_copy;
                } else {
                    rt_warn!("sound player exhausted source mid-pull, zero-filling remainder");
                    self.state = PlayerState::Stopped;
                    break;
                }
            } else {
                stalled_iterations += 1;
                if stalled_iterations > 64 {
                    rt_warn!("wsola stage made no progress after 64 iterations, aborting pull");
                    break;
                }
            }
        }
        if written < out.len() {
            out[written..].fill(0.0);
        }
    }
}

impl Drop for SoundPlayer {
    fn drop(&mut self) {
        if !self.owns_provider {
            // Ownership is external (§3/§5): nothing to release here, the provider
            // outlives this player.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InMemoryProvider, SineProvider};

    #[test]
    fn stopped_player_emits_silence() {
        let provider = InMemoryProvider::new(vec![1.0; 100], 1, 1000);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        let mut out = vec![9.0f32; 10];
        player.pull(10, &mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn direct_pull_passes_samples_through() {
        let data: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let provider = InMemoryProvider::new(data.clone(), 1, 1000);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        player.play();
        let mut out = vec![0.0f32; 10];
        player.pull(10, &mut out);
        assert_eq!(out, data[0..10]);
    }

    #[test]
    fn volume_scales_output() {
        let provider = InMemoryProvider::new(vec![1.0; 100], 1, 1000);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        player.set_volume(0.25);
        player.play();
        let mut out = vec![0.0f32; 10];
        player.pull(10, &mut out);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn seek_resets_time() {
        let provider = InMemoryProvider::new(vec![1.0; 1000], 1, 1000);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        player.seek(0.5);
        assert!((player.time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn stop_rewinds_to_zero() {
        let provider = InMemoryProvider::new(vec![1.0; 1000], 1, 1000);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        player.play();
        let mut out = vec![0.0f32; 500];
        player.pull(500, &mut out);
        player.stop();
        assert_eq!(player.state(), PlayerState::Stopped);
        assert!((player.time() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn pitch_preserving_speed_change_keeps_playing() {
        let provider = SineProvider::new(1, 48_000, 440.0, 0.5);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        player.set_playback_speed(1.5).unwrap();
        player.play();
        let mut out = vec![0.0f32; 2048];
        player.pull(2048, &mut out);
        assert_eq!(player.state(), PlayerState::Playing);
    }

    #[test]
    fn non_pitch_preserving_speed_resamples() {
        let data: Vec<f32> = (0..4000).map(|i| (i as f32 * 0.01).sin()).collect();
        let provider = InMemoryProvider::new(data, 1, 48_000);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        player.set_preserve_pitch(false).unwrap();
        player.set_playback_speed(2.0).unwrap();
        player.play();
        let mut out = vec![0.0f32; 512];
        player.pull(512, &mut out);
        assert_eq!(player.state(), PlayerState::Playing);
    }

    #[test]
    fn quality_preset_swap_keeps_wsola_stage_alive() {
        let provider = SineProvider::new(1, 48_000, 220.0, 0.5);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        player.set_playback_speed(1.3).unwrap();
        player.play();
        let mut out = vec![0.0f32; 1024];
        player.pull(1024, &mut out);
        player.set_time_stretch_quality(WsolaPreset::HighQuality).unwrap();
        player.pull(1024, &mut out);
        assert_eq!(player.state(), PlayerState::Playing);
    }
}
