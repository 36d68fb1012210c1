//! Interleaved float audio buffers.
//!
//! One frame = `channel_count` consecutive samples (§3 of the spec). This module is
//! the f32/no-native-host-pointer analogue of the teacher's `rt::buffer` — everything
//! here is slice-backed, no `unsafe` is needed because this crate never reaches into a
//! foreign host's raw buffer pointers (that bridging lives in the device-callback
//! adapter the host supplies, outside this crate per §6).

use std::ops::{Bound, RangeBounds};

/// An owned, zero-initialized interleaved buffer of `channel_count * frame_count`
/// samples.
#[derive(Clone, Debug)]
pub struct OwnedAudioBuffer {
    data: Vec<f32>,
    channel_count: usize,
    frame_count: usize,
}

impl OwnedAudioBuffer {
    pub fn new(channel_count: usize, frame_count: usize) -> Self {
        Self {
            data: vec![0.0; channel_count * frame_count],
            channel_count,
            frame_count,
        }
    }

    pub fn as_buf(&self) -> AudioBuf<'_> {
        AudioBuf {
            data: &self.data,
            channel_count: self.channel_count,
            frame_count: self.frame_count,
        }
    }

    pub fn as_buf_mut(&mut self) -> AudioBufMut<'_> {
        AudioBufMut {
            data: &mut self.data,
            channel_count: self.channel_count,
            frame_count: self.frame_count,
        }
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }
}

/// A borrowed view over interleaved audio, generic over immutable/mutable access.
#[derive(Debug)]
pub struct AbstractAudioBuf<T> {
    data: T,
    channel_count: usize,
    frame_count: usize,
}

pub type AudioBuf<'a> = AbstractAudioBuf<&'a [f32]>;
pub type AudioBufMut<'a> = AbstractAudioBuf<&'a mut [f32]>;

impl<'a> AudioBufMut<'a> {
    /// # Panics
    ///
    /// Panics if `chunk` is too small for `channel_count * frame_count` samples.
    pub fn from_slice(chunk: &'a mut [f32], channel_count: usize, frame_count: usize) -> Self {
        let required = channel_count * frame_count;
        assert!(chunk.len() >= required, "slice not large enough for buffer");
        Self {
            data: &mut chunk[..required],
            channel_count,
            frame_count,
        }
    }
}

impl<'a> AudioBuf<'a> {
    pub fn from_slice(chunk: &'a [f32], channel_count: usize, frame_count: usize) -> Self {
        let required = channel_count * frame_count;
        assert!(chunk.len() >= required, "slice not large enough for buffer");
        Self {
            data: &chunk[..required],
            channel_count,
            frame_count,
        }
    }
}

impl<T: AsRef<[f32]>> AbstractAudioBuf<T> {
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn data(&self) -> &[f32] {
        self.data.as_ref()
    }

    pub fn frame(&self, frame_index: usize) -> &[f32] {
        let start = frame_index * self.channel_count;
        &self.data.as_ref()[start..start + self.channel_count]
    }

    pub fn sample_at(&self, frame_index: usize, channel: usize) -> f32 {
        self.data.as_ref()[frame_index * self.channel_count + channel]
    }

    pub fn copy_to(&self, dest: &mut AudioBufMut) {
        assert_eq!(dest.channel_count, self.channel_count, "channel count mismatch");
        assert_eq!(dest.frame_count, self.frame_count, "frame count mismatch");
        dest.data.copy_from_slice(self.data.as_ref());
    }

    fn resolve_frame_range(&self, bounds: impl RangeBounds<usize>) -> (usize, usize) {
        let start = match bounds.start_bound() {
            Bound::Included(&i) => i,
            Bound::Excluded(&i) => i + 1,
            Bound::Unbounded => 0,
        };
        let end = match bounds.end_bound() {
            Bound::Included(&i) => i + 1,
            Bound::Excluded(&i) => i,
            Bound::Unbounded => self.frame_count,
        };
        assert!(start <= end && end <= self.frame_count, "frame range out of bounds");
        (start, end)
    }

    pub fn slice(&self, bounds: impl RangeBounds<usize>) -> AudioBuf {
        let (start, end) = self.resolve_frame_range(bounds);
        AudioBuf {
            data: &self.data.as_ref()[start * self.channel_count..end * self.channel_count],
            channel_count: self.channel_count,
            frame_count: end - start,
        }
    }
}

impl<T: AsRef<[f32]> + AsMut<[f32]>> AbstractAudioBuf<T> {
    pub fn data_mut(&mut self) -> &mut [f32] {
        self.data.as_mut()
    }

    pub fn slice_mut(&mut self, bounds: impl RangeBounds<usize>) -> AudioBufMut {
        let (start, end) = self.resolve_frame_range(bounds);
        AudioBufMut {
            data: &mut self.data.as_mut()[start * self.channel_count..end * self.channel_count],
            channel_count: self.channel_count,
            frame_count: end - start,
        }
    }

    pub fn clear(&mut self) {
        self.data.as_mut().fill(0.0);
    }

    /// Applies `f` to every sample, frame-major (all channels of frame 0, then frame
    /// 1, ...). Used for per-sample gain application (fades, volume) where the caller
    /// doesn't need the current frame/channel index.
    pub fn modify_samples(&mut self, mut f: impl FnMut(f32) -> f32) {
        for sample in self.data.as_mut().iter_mut() {
            *sample = f(*sample);
        }
    }

    /// Applies `f(frame_index, channel, sample)` to every sample in place.
    pub fn modify_frames(&mut self, mut f: impl FnMut(usize, usize, f32) -> f32) {
        let channel_count = self.channel_count;
        for (i, sample) in self.data.as_mut().iter_mut().enumerate() {
            let frame = i / channel_count;
            let channel = i % channel_count;
            *sample = f(frame, channel, *sample);
        }
    }

    /// Mixes `src` into `self` sample-by-sample (`self += src`), used by the mixer and
    /// composition renderer to sum track/component outputs (§4.4, §4.5, §4.7).
    pub fn add_from(&mut self, src: &AudioBuf) {
        assert_eq!(self.channel_count, src.channel_count, "channel count mismatch");
        assert_eq!(self.frame_count, src.frame_count, "frame count mismatch");
        for (dst, s) in self.data.as_mut().iter_mut().zip(src.data.iter()) {
            *dst += *s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_silent() {
        let buf = OwnedAudioBuffer::new(2, 4);
        assert!(buf.as_buf().data().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn add_from_sums_samples() {
        let mut a = OwnedAudioBuffer::new(1, 2);
        a.as_buf_mut().modify_samples(|_| 0.5);
        let mut b = OwnedAudioBuffer::new(1, 2);
        b.as_buf_mut().modify_samples(|_| 0.25);
        let mut a_mut = a.as_buf_mut();
        a_mut.add_from(&b.as_buf());
        assert!((a_mut.data()[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn slice_mut_writes_back_into_parent() {
        let mut buf = OwnedAudioBuffer::new(2, 4);
        buf.as_buf_mut().modify_samples(|_| 2.0);
        buf.as_buf_mut().slice_mut(1..3).clear();
        let expected = [2.0, 2.0, 0.0, 0.0, 0.0, 0.0, 2.0, 2.0];
        assert_eq!(buf.as_buf().data(), &expected);
    }
}
