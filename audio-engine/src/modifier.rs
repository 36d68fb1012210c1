//! Modifier & analyzer pipeline (§4.8) plus the process-wide stable type-name
//! registry a host needs to reconstruct a persisted effect chain (§6 "Project file",
//! §9 Design Notes "Global mutable state... → process-wide subsystems with explicit
//! init").
//!
//! A **modifier** transforms a block of samples in place; an **analyzer** observes a
//! block read-only, after all modifiers have run. Both are addressed by a stable
//! type-name string rather than a `TypeId`, so a persisted project round-trips even
//! across a host rebuild (§6).

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;

use crate::biquad::{BiquadBank, FilterType};
use crate::buffer::{AudioBuf, AudioBufMut};

/// In-place per-block effect. `process` runs on whatever thread pulls the owning
/// component — the audio thread for anything wired into live playback — so
/// implementations must not allocate once constructed.
pub trait Modifier: Debug + Send {
    /// The stable, process-wide identifier used to persist and reconstruct this
    /// modifier (§6).
    fn type_name(&self) -> &'static str;
    fn process(&mut self, buf: &mut AudioBufMut);
    fn reset(&mut self) {}
}

/// Read-only observer run after a component's modifier chain. Must never mutate
/// `buf`.
pub trait Analyzer: Debug + Send {
    fn type_name(&self) -> &'static str;
    fn analyze(&mut self, buf: &AudioBuf);
    fn reset(&mut self) {}
}

/// An ordered modifier chain, applied in insertion order (§4.8).
#[derive(Debug, Default)]
pub struct ModifierChain {
    modifiers: Vec<Box<dyn Modifier>>,
}

impl ModifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, modifier: Box<dyn Modifier>) {
        self.modifiers.push(modifier);
    }

    /// Removes the first modifier whose [`Modifier::type_name`] matches. Returns
    /// whether one was found.
    pub fn remove(&mut self, type_name: &str) -> bool {
        if let Some(index) = self.modifiers.iter().position(|m| m.type_name() == type_name) {
            self.modifiers.remove(index);
            true
        } else {
            false
        }
    }

    pub fn process(&mut self, buf: &mut AudioBufMut) {
        for modifier in &mut self.modifiers {
            modifier.process(buf);
        }
    }

    pub fn reset(&mut self) {
        for modifier in &mut self.modifiers {
            modifier.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }
}

/// An ordered analyzer chain, run after modifiers (§4.8). Analyzers never mutate
/// samples, so the chain only needs shared access to the buffer.
#[derive(Debug, Default)]
pub struct AnalyzerChain {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl AnalyzerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, analyzer: Box<dyn Analyzer>) {
        self.analyzers.push(analyzer);
    }

    pub fn remove(&mut self, type_name: &str) -> bool {
        if let Some(index) = self.analyzers.iter().position(|a| a.type_name() == type_name) {
            self.analyzers.remove(index);
            true
        } else {
            false
        }
    }

    pub fn observe(&mut self, buf: &AudioBuf) {
        for analyzer in &mut self.analyzers {
            analyzer.analyze(buf);
        }
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

/// Combines a [`ModifierChain`] and an [`AnalyzerChain`] the way every `component` in
/// §4.7/§4.8 owns one of each. Embedded by value in `Track`, `Mixer` and
/// `SoundPlayer`, which each forward `add_modifier`/`add_analyzer`/etc. to it.
#[derive(Debug, Default)]
pub struct EffectChains {
    pub modifiers: ModifierChain,
    pub analyzers: AnalyzerChain,
}

impl EffectChains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs modifiers (in insertion order) then analyzers (read-only) over one
    /// block, per §4.8: "Analyzers are read-only observers run after modifiers".
    pub fn apply(&mut self, buf: &mut AudioBufMut) {
        self.modifiers.process(buf);
        self.analyzers.observe(&buf.slice(..));
    }
}

/// Builds a boxed modifier/analyzer instance from persisted parameters. Built-ins
/// ignore malformed params rather than failing construction, matching the "clamp,
/// don't reject" failure semantics of the DSP components they wrap (§4.1).
pub type ModifierConstructor = fn(&serde_json::Value) -> Box<dyn Modifier>;
pub type AnalyzerConstructor = fn(&serde_json::Value) -> Box<dyn Analyzer>;

/// Process-wide registry mapping stable type-name strings to modifier constructors.
/// Installed once via [`ModifierRegistry::make_available_globally`]; the audio thread
/// never touches this (construction only happens while loading a project on a
/// control thread).
#[derive(Debug)]
pub struct ModifierRegistry {
    constructors: Mutex<HashMap<&'static str, ModifierConstructor>>,
}

engine_base::make_available_globally_on_demand!(ModifierRegistry);

impl ModifierRegistry {
    pub fn new() -> Self {
        Self {
            constructors: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, type_name: &'static str, constructor: ModifierConstructor) {
        self.constructors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(type_name, constructor);
    }

    pub fn construct(&self, type_name: &str, params: &serde_json::Value) -> Option<Box<dyn Modifier>> {
        let constructors = self.constructors.lock().unwrap_or_else(|e| e.into_inner());
        constructors.get(type_name).map(|ctor| ctor(params))
    }
}

impl Default for ModifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide registry mapping stable type-name strings to analyzer constructors.
#[derive(Debug)]
pub struct AnalyzerRegistry {
    constructors: Mutex<HashMap<&'static str, AnalyzerConstructor>>,
}

engine_base::make_available_globally_on_demand!(AnalyzerRegistry);

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            constructors: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, type_name: &'static str, constructor: AnalyzerConstructor) {
        self.constructors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(type_name, constructor);
    }

    pub fn construct(&self, type_name: &str, params: &serde_json::Value) -> Option<Box<dyn Analyzer>> {
        let constructors = self.constructors.lock().unwrap_or_else(|e| e.into_inner());
        constructors.get(type_name).map(|ctor| ctor(params))
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers every built-in modifier/analyzer type with the global registries. Hosts
/// that want the built-ins available for project loading call this once at startup,
/// alongside installing their own `tracing_subscriber` layer — the engine itself
/// never calls this implicitly (§9 "must accept alternative implementations").
pub fn register_builtins() {
    ModifierRegistry::make_available_globally(ModifierRegistry::new);
    AnalyzerRegistry::make_available_globally(AnalyzerRegistry::new);
    let modifiers = ModifierRegistry::get();
    modifiers.register("builtin.gain", |params| {
        let gain = params.get("gain").and_then(|v| v.as_f64()).unwrap_or(1.0);
        Box::new(GainModifier::new(gain))
    });
    modifiers.register("builtin.biquad", |params| {
        let sample_rate_hz = params.get("sample_rate_hz").and_then(|v| v.as_f64()).unwrap_or(48_000.0);
        let frequency_hz = params.get("frequency_hz").and_then(|v| v.as_f64()).unwrap_or(1_000.0);
        let q = params.get("q").and_then(|v| v.as_f64()).unwrap_or(0.707);
        let channel_count = params.get("channel_count").and_then(|v| v.as_u64()).unwrap_or(2) as usize;
        Box::new(BiquadModifier::new(channel_count.max(1), FilterType::LowPass, sample_rate_hz, frequency_hz, q))
    });

    let analyzers = AnalyzerRegistry::get();
    analyzers.register("builtin.peak_meter", |_params| Box::new(PeakMeterAnalyzer::new()));
}

/// A flat linear gain applied to every sample, every channel.
#[derive(Clone, Debug)]
pub struct GainModifier {
    gain: f64,
}

impl GainModifier {
    pub fn new(gain: f64) -> Self {
        Self { gain }
    }
}

impl Modifier for GainModifier {
    fn type_name(&self) -> &'static str {
        "builtin.gain"
    }

    fn process(&mut self, buf: &mut AudioBufMut) {
        let gain = self.gain;
        buf.modify_samples(|s| (s as f64 * gain) as f32);
    }
}

/// Wraps [`BiquadBank`] as a persistable, stable-named modifier.
#[derive(Debug)]
pub struct BiquadModifier {
    bank: BiquadBank,
}

impl BiquadModifier {
    pub fn new(channel_count: usize, filter_type: FilterType, sample_rate_hz: f64, frequency_hz: f64, q: f64) -> Self {
        let mut bank = BiquadBank::new(channel_count);
        bank.set(filter_type, sample_rate_hz, frequency_hz, q, 0.0, 0.0);
        Self { bank }
    }
}

impl Modifier for BiquadModifier {
    fn type_name(&self) -> &'static str {
        "builtin.biquad"
    }

    fn process(&mut self, buf: &mut AudioBufMut) {
        let channel_count = buf.channel_count();
        self.bank.set_channel_count(channel_count);
        for frame_index in 0..buf.frame_count() {
            let mut frame = [0.0f32; 16];
            let frame_slice = &mut frame[..channel_count];
            frame_slice.copy_from_slice(buf.slice(frame_index..frame_index + 1).data());
            self.bank.process_frame(frame_slice);
            buf.slice_mut(frame_index..frame_index + 1).data_mut().copy_from_slice(frame_slice);
        }
    }

    fn reset(&mut self) {
        self.bank.reset();
    }
}

/// Tracks the running peak sample magnitude seen across every block, the simplest
/// useful read-only observer (§4.8, §2 "In-place per-block effect chain and observer
/// chain attached to a component").
#[derive(Clone, Debug, Default)]
pub struct PeakMeterAnalyzer {
    peak: f32,
}

impl PeakMeterAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }
}

impl Analyzer for PeakMeterAnalyzer {
    fn type_name(&self) -> &'static str {
        "builtin.peak_meter"
    }

    fn analyze(&mut self, buf: &AudioBuf) {
        for &sample in buf.data() {
            let magnitude = sample.abs();
            if magnitude > self.peak {
                self.peak = magnitude;
            }
        }
    }

    fn reset(&mut self) {
        self.peak = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OwnedAudioBuffer;

    #[test]
    fn gain_modifier_scales_samples() {
        let mut chain = ModifierChain::new();
        chain.add(Box::new(GainModifier::new(0.5)));
        let mut buffer = OwnedAudioBuffer::new(1, 2);
        buffer.as_buf_mut().modify_samples(|_| 1.0);
        let mut buf_mut = buffer.as_buf_mut();
        chain.process(&mut buf_mut);
        assert!((buf_mut.data()[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn remove_by_type_name() {
        let mut chain = ModifierChain::new();
        chain.add(Box::new(GainModifier::new(0.5)));
        assert_eq!(chain.len(), 1);
        assert!(chain.remove("builtin.gain"));
        assert_eq!(chain.len(), 0);
        assert!(!chain.remove("builtin.gain"));
    }

    #[test]
    fn peak_analyzer_tracks_max_magnitude_without_mutating() {
        let mut analyzer = PeakMeterAnalyzer::new();
        let mut buffer = OwnedAudioBuffer::new(1, 3);
        buffer.as_buf_mut().data_mut().copy_from_slice(&[0.1, -0.9, 0.3]);
        analyzer.analyze(&buffer.as_buf());
        assert!((analyzer.peak() - 0.9).abs() < 1e-6);
        assert_eq!(buffer.as_buf().data(), &[0.1, -0.9, 0.3]);
    }

    #[test]
    fn modifiers_run_before_analyzers_in_effect_chains() {
        let mut chains = EffectChains::new();
        chains.modifiers.add(Box::new(GainModifier::new(2.0)));
        chains.analyzers.add(Box::new(PeakMeterAnalyzer::new()));
        let mut buffer = OwnedAudioBuffer::new(1, 1);
        buffer.as_buf_mut().modify_samples(|_| 0.4);
        let mut buf_mut = buffer.as_buf_mut();
        chains.apply(&mut buf_mut);
        // Analyzer should see the post-gain value (0.8), not the pre-gain (0.4).
        assert_eq!(chains.analyzers.len(), 1);
    }

    #[test]
    fn registry_constructs_by_stable_type_name() {
        register_builtins();
        let modifier = ModifierRegistry::get()
            .construct("builtin.gain", &serde_json::json!({ "gain": 0.25 }))
            .unwrap();
        assert_eq!(modifier.type_name(), "builtin.gain");
    }
}
