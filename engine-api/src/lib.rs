pub mod codec;
pub mod curve;
pub mod device;
pub mod error;
pub mod format;
pub mod persistence;
pub mod settings;

pub use codec::{resolve_m4a_codec_id, Decoder, DecoderFactory, Encoder, EncoderFactory};
pub use curve::FadeCurve;
pub use device::DeviceEvent;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use format::{AudioFormat, ChannelLayout, MAX_CHANNELS};
pub use settings::{constant_power_pan, AudioSegmentSettings, LoopSpec, Repetitions, TrackSettings};
