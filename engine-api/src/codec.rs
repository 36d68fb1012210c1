//! Encoder/decoder interfaces (§6 "Encoder interface" / "Decoder interface").
//!
//! Concrete codec backends (wav, flac, mp3, ogg, opus, aac, alac) are collaborators the
//! core depends on only through these traits — the factories that actually produce
//! them, and the format-specific bit-twiddling, live outside this crate (§1 Non-goals
//! "codec factories"). What belongs here is the stable interface shape plus the one bit
//! of deterministic, format-independent logic named in the spec: the `"m4a"` container
//! remap.

use crate::format::AudioFormat;
use crate::error::EngineResult;

/// Encodes interleaved `f32` PCM into a specific container/codec.
pub trait Encoder: std::fmt::Debug {
    /// Encodes `samples` (interleaved), returning the number of input samples
    /// consumed. Implementations may buffer internally rather than writing out a
    /// 1:1 chunk per call.
    fn encode(&mut self, samples: &[f32]) -> EngineResult<usize>;

    /// Flushes any buffered state and finalizes the container. No further calls to
    /// `encode` are valid afterwards.
    fn close(&mut self) -> EngineResult<()>;
}

/// Constructs an [`Encoder`] for a short lowercase format identifier (`"wav"`,
/// `"flac"`, `"mp3"`, `"ogg"`, `"opus"`, `"aac"`, `"alac"`).
pub trait EncoderFactory: std::fmt::Debug {
    fn create_encoder(&self, format_id: &str, format: AudioFormat) -> EngineResult<Box<dyn Encoder>>;
}

/// Decodes a specific container/codec into interleaved `f32` PCM.
pub trait Decoder: std::fmt::Debug {
    /// Writes decoded interleaved samples into `out`, returning how many were
    /// written. `0` means end of stream.
    fn decode(&mut self, out: &mut [f32]) -> usize;

    /// Seeks to `sample_offset` (interleaved sample index).
    fn seek(&mut self, sample_offset: i64);

    fn length_samples(&self) -> Option<i64>;
}

/// Constructs a [`Decoder`] either for a known format identifier, or via probing.
pub trait DecoderFactory: std::fmt::Debug {
    fn create_decoder(&self, format_id: &str) -> EngineResult<Box<dyn Decoder>>;

    /// Probes unknown input and returns a decoder plus the format it detected.
    fn probe(&self) -> EngineResult<(Box<dyn Decoder>, AudioFormat)>;
}

/// Resolves the short container identifier used to pick an [`EncoderFactory`]/
/// [`DecoderFactory`] entry point for a `.m4a` file, which is a container rather than
/// a codec in its own right (§6: `"m4a"` remaps to `"alac"` for 24/32-bit PCM, else
/// `"aac"`).
pub fn resolve_m4a_codec_id(bit_depth: u32) -> &'static str {
    if bit_depth >= 24 {
        "alac"
    } else {
        "aac"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn m4a_remaps_to_alac_for_high_bit_depth() {
        assert_eq!(resolve_m4a_codec_id(24), "alac");
        assert_eq!(resolve_m4a_codec_id(32), "alac");
    }

    #[test]
    fn m4a_remaps_to_aac_otherwise() {
        assert_eq!(resolve_m4a_codec_id(16), "aac");
        assert_eq!(resolve_m4a_codec_id(8), "aac");
    }
}
