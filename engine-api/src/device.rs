//! Device-event channel (§7 "device-backend errors abort the device and propagate to
//! control threads via a `device_stopped` event carrying the error").
//!
//! The audio I/O backend itself is out-of-core (§1 Non-goals); what the core provides
//! is this event shape plus the dispatcher-owned channel (see
//! `audio_engine::mixer::Dispatcher`) so a host's backend has somewhere deterministic
//! to report a fatal condition without the core depending on that backend's types.

use crate::error::EngineError;

/// Emitted by the device-callback dispatcher to whichever control thread is listening.
#[derive(Clone, Debug)]
pub enum DeviceEvent {
    /// The device session aborted; the host must reinitialize it before audio resumes.
    DeviceStopped { error: EngineError },
    /// A component could not supply audio for one block; the block was zero-filled and
    /// playback continues (§7 "transient underruns are recovered locally").
    Underrun,
}
