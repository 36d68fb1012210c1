//! WSOLA (Waveform Similarity Overlap-Add) time-stretcher (§4.2).
//!
//! Ported from the offline NCC-search sketch in the reference pack, but reworked for
//! the real-time contract: internal buffering through [`SampleBuffer`], no per-block
//! allocation once `configure`/`set_channels` have sized things, and an explicit
//! `(output_written, input_consumed, source_samples_represented)` step result instead
//! of returning owned `Vec`s.

use engine_api::{EngineError, EngineResult};

use crate::ring_buffer::SampleBuffer;

/// Built-in quality presets: `(window_frames, synthesis_hop_frames, search_radius_frames)`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WsolaPreset {
    Fast,
    Balanced,
    HighQuality,
    Audiophile,
}

impl WsolaPreset {
    fn params(self) -> WsolaParams {
        let (window_frames, synthesis_hop_frames, search_radius_frames) = match self {
            Self::Fast => (1024, 512, 128),
            Self::Balanced => (2048, 1024, 256),
            Self::HighQuality => (4096, 2048, 512),
            Self::Audiophile => (8192, 4096, 1024),
        };
        WsolaParams {
            window_frames,
            synthesis_hop_frames,
            search_radius_frames,
        }
    }
}

/// Explicit WSOLA window geometry, for callers that want something other than a
/// [`WsolaPreset`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct WsolaParams {
    pub window_frames: usize,
    pub synthesis_hop_frames: usize,
    pub search_radius_frames: usize,
}

impl WsolaParams {
    pub fn preset(preset: WsolaPreset) -> Self {
        preset.params()
    }

    fn validate(&self) -> EngineResult<()> {
        if self.window_frames == 0 || self.window_frames % 2 != 0 {
            return Err(EngineError::validation("wsola window must be a positive even number of frames"));
        }
        if self.synthesis_hop_frames == 0 || self.synthesis_hop_frames >= self.window_frames {
            return Err(EngineError::validation("wsola synthesis hop must be in (0, window)"));
        }
        Ok(())
    }

    fn overlap_frames(&self) -> usize {
        self.window_frames - self.synthesis_hop_frames
    }
}

/// Result of one [`WsolaStretcher::process`] call.
#[derive(Copy, Clone, Debug)]
pub struct WsolaStepResult {
    /// Interleaved samples written to the caller's output slice (0 or exactly one
    /// synthesis hop's worth).
    pub output_written_samples: usize,
    /// Interleaved samples consumed from the caller's input slice and absorbed into
    /// the internal buffer.
    pub input_consumed_samples: usize,
    /// How many source (input) samples this emission represents, for the caller's
    /// source-position clock. Derived solely from synthesis/analysis hop (§9 open
    /// question (i)) — never from the possibly-stale `target_speed`.
    pub source_samples_represented: f64,
}

/// A single-channel-agnostic WSOLA kernel operating on interleaved frames.
#[derive(Debug)]
pub struct WsolaStretcher {
    channels: usize,
    target_speed: f64,
    params: WsolaParams,
    analysis_hop_frames: usize,
    input: SampleBuffer,
    /// Offset, in frames from the start of `input`'s unread region, of the next
    /// analysis window. Decremented whenever `input` compacts (§4.9).
    nominal_offset_frames: usize,
    previous_output_tail: Vec<f32>,
    has_tail: bool,
    current_analysis_frame: Vec<f32>,
    overlap_out_buffer: Vec<f32>,
    is_flushing: bool,
}

const NCC_EARLY_ACCEPT: f64 = 0.995;
const NCC_HYSTERESIS: f64 = 0.02;
const SILENCE_ENERGY_THRESHOLD: f64 = 1e-7;

impl WsolaStretcher {
    pub fn new(channels: usize, params: WsolaParams) -> EngineResult<Self> {
        params.validate()?;
        assert!(channels > 0, "channel count must be positive");
        let mut stretcher = Self {
            channels,
            target_speed: 1.0,
            params,
            analysis_hop_frames: params.synthesis_hop_frames,
            input: SampleBuffer::new(channels, Self::capacity_frames(&params)),
            nominal_offset_frames: 0,
            previous_output_tail: vec![0.0; params.overlap_frames() * channels],
            has_tail: false,
            current_analysis_frame: vec![0.0; params.window_frames * channels],
            overlap_out_buffer: vec![0.0; params.window_frames * channels],
            is_flushing: false,
        };
        stretcher.reset();
        Ok(stretcher)
    }

    fn capacity_frames(params: &WsolaParams) -> usize {
        // Headroom for the search lookahead plus a couple of analysis hops of
        // incoming audio, so a typical block doesn't force a mid-block grow.
        params.window_frames + params.search_radius_frames * 2 + params.synthesis_hop_frames * 4
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn params(&self) -> WsolaParams {
        self.params
    }

    /// Resets buffers when any geometry parameter changes.
    pub fn configure(&mut self, params: WsolaParams) -> EngineResult<()> {
        params.validate()?;
        self.params = params;
        self.previous_output_tail = vec![0.0; params.overlap_frames() * self.channels];
        self.current_analysis_frame = vec![0.0; params.window_frames * self.channels];
        self.overlap_out_buffer = vec![0.0; params.window_frames * self.channels];
        self.input = SampleBuffer::new(self.channels, Self::capacity_frames(&params));
        self.set_speed(self.target_speed)?;
        self.reset();
        Ok(())
    }

    /// Re-allocates internal buffers for a new channel count. No-op if unchanged.
    pub fn set_channels(&mut self, channels: usize) {
        assert!(channels > 0, "channel count must be positive");
        if channels == self.channels {
            return;
        }
        self.channels = channels;
        self.previous_output_tail = vec![0.0; self.params.overlap_frames() * channels];
        self.current_analysis_frame = vec![0.0; self.params.window_frames * channels];
        self.overlap_out_buffer = vec![0.0; self.params.window_frames * channels];
        self.input = SampleBuffer::new(channels, Self::capacity_frames(&self.params));
        self.reset();
    }

    /// Fixes the synthesis hop and derives the analysis hop. Grows input capacity if
    /// needed; never clears already-buffered audio.
    pub fn set_speed(&mut self, speed: f64) -> EngineResult<()> {
        if !(speed > 0.0) {
            return Err(EngineError::validation("wsola speed must be positive"));
        }
        self.target_speed = speed;
        let hop = (self.params.synthesis_hop_frames as f64 * speed).round() as usize;
        self.analysis_hop_frames = hop.max(1);
        let needed = self.nominal_offset_frames
            + self.params.search_radius_frames
            + self.params.window_frames
            + self.analysis_hop_frames;
        self.input.ensure_capacity_frames(needed);
        Ok(())
    }

    /// Clears all buffers and flags; keeps geometry and speed.
    pub fn reset(&mut self) {
        self.input.clear();
        self.previous_output_tail.iter_mut().for_each(|s| *s = 0.0);
        self.has_tail = false;
        self.nominal_offset_frames = 0;
        self.is_flushing = false;
    }

    /// Pulls buffered input through one WSOLA iteration. May buffer `input` without
    /// emitting; never blocks, never produces more than one synthesis hop.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> WsolaStepResult {
        assert_eq!(input.len() % self.channels, 0, "input is not a whole number of frames");
        let synthesis_hop_samples = self.params.synthesis_hop_frames * self.channels;
        assert!(
            output.len() >= synthesis_hop_samples,
            "output buffer too small for one synthesis hop"
        );

        self.compact_if_needed();
        let input_consumed_frames = self.input.push_frames(input);

        if self.try_iterate(&mut output[..synthesis_hop_samples]) {
            WsolaStepResult {
                output_written_samples: synthesis_hop_samples,
                input_consumed_samples: input_consumed_frames * self.channels,
                source_samples_represented: (self.analysis_hop_frames * self.channels) as f64,
            }
        } else {
            WsolaStepResult {
                output_written_samples: 0,
                input_consumed_samples: input_consumed_frames * self.channels,
                source_samples_represented: 0.0,
            }
        }
    }

    /// Drains remaining buffered audio into `output` until fewer than one window
    /// remains. Returns the number of interleaved samples written.
    pub fn flush(&mut self, output: &mut [f32]) -> usize {
        self.is_flushing = true;
        let synthesis_hop_samples = self.params.synthesis_hop_frames * self.channels;
        let mut written = 0;
        while written + synthesis_hop_samples <= output.len() {
            self.compact_if_needed();
            if !self.try_iterate(&mut output[written..written + synthesis_hop_samples]) {
                break;
            }
            written += synthesis_hop_samples;
        }
        written
    }

    fn compact_if_needed(&mut self) {
        let keep_from_frames = self
            .nominal_offset_frames
            .saturating_sub(self.params.search_radius_frames);
        if keep_from_frames > 0 {
            self.input.consume_frames(keep_from_frames);
        }
        let shifted = self.input.compact();
        self.nominal_offset_frames -= shifted;
    }

    /// Attempts one iteration of the algorithm in §4.2. On success, writes exactly
    /// one synthesis hop into `output` and advances internal state; returns `false`
    /// (leaving all state untouched) if not enough input is buffered yet.
    fn try_iterate(&mut self, output: &mut [f32]) -> bool {
        let channels = self.channels;
        let window_frames = self.params.window_frames;
        let synthesis_hop_frames = self.params.synthesis_hop_frames;
        let overlap_frames = self.params.overlap_frames();
        let available_frames = self.input.valid_frames();

        let required_frames = if self.is_flushing {
            self.nominal_offset_frames + window_frames
        } else {
            self.nominal_offset_frames + self.params.search_radius_frames + window_frames
        };
        if available_frames < required_frames {
            return false;
        }

        let base = self.nominal_offset_frames as i64;
        let max_forward_delta = (available_frames as i64 - base - window_frames as i64).max(0);
        let min_delta = -(self.params.search_radius_frames as i64).min(base);
        let max_delta = (self.params.search_radius_frames as i64).min(max_forward_delta);

        let delta = if !self.has_tail {
            0
        } else {
            self.search_best_delta(base, min_delta, max_delta, overlap_frames)
        };

        let window_start_frame = (base + delta) as usize;
        let window_start_sample = window_start_frame * channels;
        self.current_analysis_frame
            .copy_from_slice(&self.input.readable()[window_start_sample..window_start_sample + window_frames * channels]);

        if self.has_tail {
            for i in 0..overlap_frames {
                let w = raised_cosine_weight(i, overlap_frames);
                for c in 0..channels {
                    let idx = i * channels + c;
                    let prev = self.previous_output_tail[idx];
                    let cur = self.current_analysis_frame[idx];
                    self.overlap_out_buffer[idx] = prev * (1.0 - w) + cur * w;
                }
            }
        } else {
            self.overlap_out_buffer[..overlap_frames * channels]
                .copy_from_slice(&self.current_analysis_frame[..overlap_frames * channels]);
        }
        self.overlap_out_buffer[overlap_frames * channels..]
            .copy_from_slice(&self.current_analysis_frame[overlap_frames * channels..]);

        let synthesis_hop_samples = synthesis_hop_frames * channels;
        output.copy_from_slice(&self.overlap_out_buffer[..synthesis_hop_samples]);
        self.previous_output_tail
            .copy_from_slice(&self.overlap_out_buffer[synthesis_hop_samples..]);
        self.has_tail = true;

        self.nominal_offset_frames += self.analysis_hop_frames;
        true
    }

    /// Normalized cross-correlation search over `δ ∈ [min_delta, max_delta]`, channel
    /// 0 only, tie-broken toward smaller `|δ|` and suppressed by hysteresis/energy
    /// gating per §4.2 step 2.
    fn search_best_delta(&self, base: i64, min_delta: i64, max_delta: i64, overlap_frames: usize) -> i64 {
        if overlap_frames == 0 {
            return 0;
        }
        let tail_energy = channel0_energy(&self.previous_output_tail, self.channels, overlap_frames);
        if tail_energy < SILENCE_ENERGY_THRESHOLD * overlap_frames as f64 {
            return 0;
        }
        if (overlap_frames as i64) < (self.params.search_radius_frames as i64 / 4) {
            return 0;
        }

        let readable = self.input.readable();
        let channels = self.channels;

        let mut best_delta = 0i64;
        let mut best_ncc = self.ncc_at_delta(readable, base, 0, overlap_frames).unwrap_or(f64::NEG_INFINITY);

        for offset in 1..=max_delta.max(-min_delta).max(0) {
            for &delta in &[offset, -offset] {
                if delta < min_delta || delta > max_delta || delta == 0 {
                    continue;
                }
                let Some(ncc) = self.ncc_at_delta(readable, base, delta, overlap_frames) else {
                    continue;
                };
                if ncc > best_ncc + NCC_HYSTERESIS {
                    best_ncc = ncc;
                    best_delta = delta;
                }
            }
            if best_ncc > NCC_EARLY_ACCEPT {
                break;
            }
        }
        let _ = channels;
        best_delta
    }

    fn ncc_at_delta(&self, readable: &[f32], base: i64, delta: i64, overlap_frames: usize) -> Option<f64> {
        let start_frame = base + delta;
        if start_frame < 0 {
            return None;
        }
        let start_sample = (start_frame as usize) * self.channels;
        let needed = overlap_frames * self.channels;
        if start_sample + needed > readable.len() {
            return None;
        }
        let candidate = &readable[start_sample..start_sample + needed];
        Some(normalized_cross_correlation_channel0(
            &self.previous_output_tail,
            candidate,
            self.channels,
            overlap_frames,
        ))
    }
}

fn raised_cosine_weight(index: usize, overlap_frames: usize) -> f64 {
    if overlap_frames <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * (std::f64::consts::PI * index as f64 / (overlap_frames - 1) as f64).cos()
}

fn channel0_energy(interleaved: &[f32], channels: usize, frame_count: usize) -> f64 {
    (0..frame_count)
        .map(|i| {
            let s = interleaved[i * channels] as f64;
            s * s
        })
        .sum()
}

fn normalized_cross_correlation_channel0(a: &[f32], b: &[f32], channels: usize, frame_count: usize) -> f64 {
    let mut sum_ab = 0.0;
    let mut sum_aa = 0.0;
    let mut sum_bb = 0.0;
    for i in 0..frame_count {
        let av = a[i * channels] as f64;
        let bv = b[i * channels] as f64;
        sum_ab += av * bv;
        sum_aa += av * av;
        sum_bb += bv * bv;
    }
    let denom = (sum_aa * sum_bb).sqrt();
    if denom > 0.0 {
        sum_ab / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_all(stretcher: &mut WsolaStretcher, input: &[f32], channels: usize) -> Vec<f32> {
        let synthesis_hop_samples = stretcher.params().synthesis_hop_frames * channels;
        let mut output = vec![0.0f32; synthesis_hop_samples];
        let mut result = Vec::new();
        let mut cursor = 0;
        loop {
            let chunk_end = (cursor + 256 * channels).min(input.len());
            let chunk = &input[cursor..chunk_end];
            cursor = chunk_end;
            let step = stretcher.process(chunk, &mut output);
            if step.output_written_samples > 0 {
                result.extend_from_slice(&output[..step.output_written_samples]);
            }
            if cursor >= input.len() && step.output_written_samples == 0 && step.input_consumed_samples == 0 {
                break;
            }
        }
        let mut flushed = vec![0.0f32; synthesis_hop_samples * 8];
        let written = stretcher.flush(&mut flushed);
        result.extend_from_slice(&flushed[..written]);
        result
    }

    #[test]
    fn speed_one_zero_search_radius_is_passthrough_after_warmup() {
        let params = WsolaParams {
            window_frames: 64,
            synthesis_hop_frames: 32,
            search_radius_frames: 0,
        };
        let mut stretcher = WsolaStretcher::new(1, params).unwrap();
        stretcher.set_speed(1.0).unwrap();

        let input: Vec<f32> = (0..2000)
            .map(|i| (i as f32 * 0.05).sin())
            .collect();
        let output = drain_all(&mut stretcher, &input, 1);

        let warmup = params.window_frames - params.synthesis_hop_frames;
        assert!(output.len() + warmup <= input.len() + params.window_frames);
        let comparable = output.len().min(input.len() - warmup);
        let mut max_err = 0.0f32;
        for i in 0..comparable {
            let err = (output[i] - input[i + warmup]).abs();
            if err > max_err {
                max_err = err;
            }
        }
        assert!(max_err < 1e-4, "max error {max_err} exceeds tolerance");
    }

    #[test]
    fn rejects_odd_window() {
        let params = WsolaParams {
            window_frames: 63,
            synthesis_hop_frames: 16,
            search_radius_frames: 8,
        };
        assert!(WsolaStretcher::new(1, params).is_err());
    }

    #[test]
    fn rejects_hop_outside_window() {
        let params = WsolaParams {
            window_frames: 64,
            synthesis_hop_frames: 64,
            search_radius_frames: 8,
        };
        assert!(WsolaStretcher::new(1, params).is_err());
    }

    #[test]
    fn set_speed_rejects_non_positive() {
        let mut stretcher = WsolaStretcher::new(1, WsolaParams::preset(WsolaPreset::Fast)).unwrap();
        assert!(stretcher.set_speed(0.0).is_err());
        assert!(stretcher.set_speed(-1.0).is_err());
    }

    #[test]
    fn stretching_lengthens_output_roughly_by_speed() {
        let params = WsolaParams {
            window_frames: 128,
            synthesis_hop_frames: 64,
            search_radius_frames: 16,
        };
        let mut stretcher = WsolaStretcher::new(1, params).unwrap();
        stretcher.set_speed(0.5).unwrap();

        let input: Vec<f32> = (0..4000).map(|i| (i as f32 * 0.03).sin()).collect();
        let output = drain_all(&mut stretcher, &input, 1);

        // Speed 0.5 means half-speed playback: roughly double the frames out.
        let ratio = output.len() as f64 / input.len() as f64;
        assert!(ratio > 1.5 && ratio < 2.5, "unexpected stretch ratio {ratio}");
    }

    #[test]
    fn reset_clears_buffered_state() {
        let mut stretcher = WsolaStretcher::new(2, WsolaParams::preset(WsolaPreset::Fast)).unwrap();
        let input = vec![0.3f32; 4096 * 2];
        let mut output = vec![0.0f32; 512 * 2];
        stretcher.process(&input, &mut output);
        stretcher.reset();
        assert!(!stretcher.has_tail);
        assert_eq!(stretcher.input.valid_frames(), 0);
    }
}
