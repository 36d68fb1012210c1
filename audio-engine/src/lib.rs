//! Real-time WSOLA time-stretching kernel and non-destructive timeline renderer.
//!
//! Signal flows bottom-up through this crate: a [`provider::Provider`] is the
//! lazy PCM source; a [`segment::AudioSegment`] positions one on a timeline and
//! applies per-segment volume/pan/fades/looping/time-stretch; a [`track::Track`]
//! sums its segments and applies track-level volume/pan/mute; a
//! [`composition::Composition`] sums its tracks (resolving solo) and applies
//! master volume. Independently, a [`player::SoundPlayer`] pulls any `Provider`
//! (often a rendered `Composition`) for realtime VCR-style playback, and a
//! [`mixer::Mixer`] sums sibling components — players or nested mixers — behind
//! a single [`mixer::Dispatcher`] that owns the audio thread.

pub mod biquad;
pub mod buffer;
pub mod composition;
pub mod mixer;
pub mod modifier;
pub mod player;
pub mod provider;
pub mod resample;
pub mod ring_buffer;
pub mod segment;
pub mod supplier;
pub mod track;
pub mod wsola;

pub use biquad::{BiquadBank, FilterType};
pub use buffer::{AbstractAudioBuf, AudioBuf, AudioBufMut, OwnedAudioBuffer};
pub use composition::{Composition, TransportState};
pub use mixer::{AudioComponent, Dispatcher, Mixer};
pub use modifier::{Analyzer, AnalyzerChain, AnalyzerRegistry, EffectChains, Modifier, ModifierChain, ModifierRegistry};
pub use player::{PlayerState, SoundPlayer};
pub use provider::{InMemoryProvider, Provider, ProviderListener, SeededNoiseProvider, SineProvider};
pub use segment::AudioSegment;
pub use track::Track;
pub use wsola::{WsolaParams, WsolaPreset, WsolaStepResult, WsolaStretcher};
