use serde::{Deserialize, Serialize};

/// A speaker layout. Carried mostly for persistence/UI purposes; the engine itself
/// only cares about `channel_count()` for anything on the hot path.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Quad,
    Surround51,
    Surround71,
    /// A layout this spec has no dedicated name for; `channel_count` is authoritative.
    Custom,
}

impl ChannelLayout {
    pub fn channel_count(self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
            ChannelLayout::Quad => 4,
            ChannelLayout::Surround51 => 6,
            ChannelLayout::Surround71 => 8,
            ChannelLayout::Custom => 0,
        }
    }
}

/// The immutable sample-rate / channel-count / layout triple every component in a
/// composition shares.
///
/// "For this spec" channel counts are capped at 16 (§3); constructors reject anything
/// outside `[1, 16]`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct AudioFormat {
    sample_rate_hz: u32,
    channels: u8,
    layout: ChannelLayout,
}

pub const MAX_CHANNELS: u8 = 16;

impl AudioFormat {
    pub fn new(sample_rate_hz: u32, channels: u8, layout: ChannelLayout) -> Self {
        assert!(sample_rate_hz > 0, "sample rate must be positive");
        assert!(
            channels > 0 && channels <= MAX_CHANNELS,
            "channel count must be in [1, {MAX_CHANNELS}]"
        );
        Self {
            sample_rate_hz,
            channels,
            layout,
        }
    }

    pub fn stereo(sample_rate_hz: u32) -> Self {
        Self::new(sample_rate_hz, 2, ChannelLayout::Stereo)
    }

    pub fn mono(sample_rate_hz: u32) -> Self {
        Self::new(sample_rate_hz, 1, ChannelLayout::Mono)
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn channel_count(&self) -> usize {
        self.channels as usize
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_channels() {
        let result = std::panic::catch_unwind(|| AudioFormat::new(48_000, 0, ChannelLayout::Mono));
        assert!(result.is_err());
    }

    #[test]
    fn stereo_has_two_channels() {
        let format = AudioFormat::stereo(44_100);
        assert_eq!(format.channel_count(), 2);
    }
}
