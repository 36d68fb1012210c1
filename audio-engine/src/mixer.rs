//! Mixer & master pipeline (§4.7) and the device-callback dispatcher (§9 "Callbacks
//! from unmanaged I/O → explicit dispatcher").
//!
//! A mixer sums its children's outputs into a fixed-size block, then runs its own
//! modifier/analyzer chain. Mixers nest — a master mixer owns sub-mixers — by
//! implementing [`AudioComponent`] for [`Mixer`] itself. Adding/removing a component
//! during playback is observed at the next block boundary, never mid-block (§4.7,
//! §5): commands queue behind a mutex a control thread can block on freely, and the
//! audio thread drains it with [`engine_base::try_lock`], skipping a drain entirely
//! rather than ever blocking.

use std::fmt::Debug;
use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};
use engine_api::DeviceEvent;

use crate::buffer::AudioBufMut;
use crate::modifier::EffectChains;
use crate::player::SoundPlayer;

/// Anything a [`Mixer`] can pull a block from: an oscillator, a [`SoundPlayer`], or
/// another `Mixer` (§4.7 "Mixers can be nested").
pub trait AudioComponent: Debug + Send {
    /// Writes `frame_count` interleaved frames into `out` (`out.len() == frame_count
    /// * channel_count`).
    fn pull(&mut self, frame_count: usize, out: &mut [f32]);
}

impl AudioComponent for SoundPlayer {
    fn pull(&mut self, frame_count: usize, out: &mut [f32]) {
        SoundPlayer::pull(self, frame_count, out)
    }
}

enum MixerCommand {
    Add(Box<dyn AudioComponent>),
    RemoveAt(usize),
}

/// Sums child components' outputs into one block, then applies its own modifier and
/// analyzer chain (§4.7). A device owns exactly one master mixer.
pub struct Mixer {
    channels: usize,
    children: Vec<Box<dyn AudioComponent>>,
    pending: Mutex<Vec<MixerCommand>>,
    effects: EffectChains,
    mix_scratch: Vec<f32>,
}

impl Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("channels", &self.channels)
            .field("child_count", &self.children.len())
            .finish_non_exhaustive()
    }
}

impl Mixer {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            children: Vec::new(),
            pending: Mutex::new(Vec::new()),
            effects: EffectChains::new(),
            mix_scratch: Vec::new(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn effects_mut(&mut self) -> &mut EffectChains {
        &mut self.effects
    }

    /// Enqueues a component addition; called from a control thread, which may block
    /// normally on the queue mutex (§5 "a per-component mutex protecting only the
    /// command queue is acceptable").
    pub fn add_component(&self, component: Box<dyn AudioComponent>) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MixerCommand::Add(component));
    }

    /// Enqueues removal of the child currently at `index`. Resolved against the
    /// child list as it stands at the next block boundary, not at enqueue time.
    pub fn remove_component(&self, index: usize) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MixerCommand::RemoveAt(index));
    }

    /// Applies any queued add/remove commands. Called from the audio thread at the
    /// top of every [`pull`](Self::pull); uses a non-blocking lock so a control
    /// thread mid-enqueue never stalls a callback (§5) — the drain simply waits for
    /// the next block if contended.
    fn drain_pending(&mut self) {
        let Some(mut pending) = engine_base::try_lock(&self.pending) else {
            return;
        };
        for command in pending.drain(..) {
            match command {
                MixerCommand::Add(component) => self.children.push(component),
                MixerCommand::RemoveAt(index) => {
                    if index < self.children.len() {
                        self.children.remove(index);
                    }
                }
            }
        }
    }

    /// Sums every child's output, then runs the modifier/analyzer chain (§4.7).
    pub fn pull(&mut self, frame_count: usize, out: &mut [f32]) {
        assert_eq!(out.len(), frame_count * self.channels, "output buffer size mismatch");
        self.drain_pending();
        out.fill(0.0);

        let required_len = frame_count * self.channels;
        if self.mix_scratch.len() < required_len {
            self.mix_scratch.resize(required_len, 0.0);
        }

        for child in &mut self.children {
            let scratch = &mut self.mix_scratch[..required_len];
            child.pull(frame_count, scratch);
            for (dst, src) in out.iter_mut().zip(scratch.iter()) {
                *dst += *src;
            }
        }

        if !self.effects.modifiers.is_empty() || !self.effects.analyzers.is_empty() {
            let mut buf_mut = AudioBufMut::from_slice(out, self.channels, frame_count);
            self.effects.apply(&mut buf_mut);
        }
    }
}

impl AudioComponent for Mixer {
    fn pull(&mut self, frame_count: usize, out: &mut [f32]) {
        Mixer::pull(self, frame_count, out)
    }
}

/// The single owner of the audio thread (§9 "explicit dispatcher"): marshals device
/// callbacks into the pull pipeline. No raw function pointers into user code cross
/// this boundary — the host's device backend calls [`Dispatcher::fill_block`] and
/// nothing else.
const DEVICE_EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct Dispatcher {
    master_mixer: Mixer,
    events: Sender<DeviceEvent>,
}

impl Dispatcher {
    /// Builds a dispatcher and its device-event channel (§7 "device-backend errors...
    /// propagate to control threads via a `device_stopped` event"). The receiver is
    /// handed to whichever control thread owns error recovery; a full channel drops
    /// the oldest-pending send rather than blocking the audio thread.
    pub fn new(master_mixer: Mixer) -> (Self, Receiver<DeviceEvent>) {
        let (events, receiver) = crossbeam_channel::bounded(DEVICE_EVENT_CHANNEL_CAPACITY);
        (Self { master_mixer, events }, receiver)
    }

    pub fn master_mixer(&self) -> &Mixer {
        &self.master_mixer
    }

    pub fn master_mixer_mut(&mut self) -> &mut Mixer {
        &mut self.master_mixer
    }

    /// Reports a fatal device-backend condition detected by the host's I/O callback
    /// glue, which lives outside this crate (§1 Non-goals "audio I/O backend"). The
    /// dispatcher only carries the event to whoever is listening.
    pub fn report_device_stopped(&self, error: engine_api::EngineError) {
        let _ = self.events.try_send(DeviceEvent::DeviceStopped { error });
    }

    /// Fills `out` for one device callback. `out.len()` must be a whole number of
    /// frames at the master mixer's channel count (§6 "Device callback").
    pub fn fill_block(&mut self, out: &mut [f32]) {
        let channels = self.master_mixer.channel_count();
        assert_eq!(out.len() % channels, 0, "device buffer is not a whole number of frames");
        let frame_count = out.len() / channels;
        self.master_mixer.pull(frame_count, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryProvider;

    fn dc_player(value: f32, frame_count: usize) -> SoundPlayer {
        let provider = InMemoryProvider::new(vec![value; frame_count], 1, 1000);
        let mut player = SoundPlayer::new(Box::new(provider), true);
        player.play();
        player
    }

    #[test]
    fn sums_children_linearly() {
        let mut mixer = Mixer::new(1);
        mixer.add_component(Box::new(dc_player(0.3, 100)));
        mixer.add_component(Box::new(dc_player(0.4, 100)));
        let mut out = vec![0.0f32; 10];
        mixer.pull(10, &mut out);
        assert!(out.iter().all(|&s| (s - 0.7).abs() < 1e-6));
    }

    #[test]
    fn added_component_is_picked_up_on_next_pull() {
        let mut mixer = Mixer::new(1);
        let mut out = vec![0.0f32; 10];
        mixer.pull(10, &mut out);
        assert!(out.iter().all(|&s| s == 0.0));

        mixer.add_component(Box::new(dc_player(0.5, 100)));
        let mut out2 = vec![0.0f32; 10];
        mixer.pull(10, &mut out2);
        assert!(out2.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn nested_mixers_sum_through() {
        let mut inner = Mixer::new(1);
        inner.add_component(Box::new(dc_player(0.2, 100)));
        let mut outer = Mixer::new(1);
        outer.add_component(Box::new(inner));
        outer.add_component(Box::new(dc_player(0.1, 100)));
        let mut out = vec![0.0f32; 10];
        outer.pull(10, &mut out);
        assert!(out.iter().all(|&s| (s - 0.3).abs() < 1e-6));
    }

    #[test]
    fn dispatcher_fills_from_master_mixer() {
        let mut mixer = Mixer::new(2);
        mixer.add_component(Box::new(dc_player(1.0, 200)));
        let (mut dispatcher, _events) = Dispatcher::new(mixer);
        let mut out = vec![0.0f32; 20];
        dispatcher.fill_block(&mut out);
        assert!(out.iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn device_stopped_event_is_observable_on_the_channel() {
        let (dispatcher, events) = Dispatcher::new(Mixer::new(1));
        dispatcher.report_device_stopped(engine_api::EngineError::host("backend crashed"));
        let event = events.try_recv().expect("event should have been sent");
        match event {
            DeviceEvent::DeviceStopped { error } => assert_eq!(error.kind(), engine_api::ErrorKind::Host),
            DeviceEvent::Underrun => panic!("expected DeviceStopped"),
        }
    }
}
