//! Opt-in, allocation-free-on-the-hot-path metrics recording.
//!
//! Mirrors the teacher's approach: metrics are disabled unless explicitly turned on by
//! the host, and even when enabled the audio thread never touches the `metrics` crate
//! directly — it pushes a tiny task onto a bounded channel that a dedicated worker
//! thread drains. Dropping a task when the channel is full is preferable to blocking
//! or allocating on the audio thread.

use crossbeam_channel::{Receiver, Sender};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

static METRICS_ENABLED: AtomicBool = AtomicBool::new(false);
static METRICS_CHANNEL: Lazy<MetricsChannel> = Lazy::new(MetricsChannel::default);

/// Turns on metrics recording for the lifetime of the process.
///
/// Must be called before any component starts producing audio; it spawns the worker
/// thread that drains the metrics channel.
pub fn enable_metrics() {
    if METRICS_ENABLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let _ = &*METRICS_CHANNEL;
    thread::Builder::new()
        .name(String::from("audio-engine metrics"))
        .spawn(|| keep_recording_metrics(METRICS_CHANNEL.receiver.clone()))
        .expect("failed to spawn metrics thread");
}

pub fn metrics_enabled() -> bool {
    METRICS_ENABLED.load(Ordering::Relaxed)
}

/// Measures `f` and, if metrics are enabled, records the elapsed time under `id`.
///
/// Safe to call from the audio thread: when disabled this is just `f()`, and when
/// enabled the only extra cost is an `Instant::now()` pair and a non-blocking channel
/// send.
pub fn measure_time<R>(id: &'static str, f: impl FnOnce() -> R) -> R {
    if !metrics_enabled() {
        return f();
    }
    let start = Instant::now();
    let result = f();
    let task = MetricsTask::Histogram {
        id,
        delta: start.elapsed(),
    };
    let _ = METRICS_CHANNEL.sender.try_send(task);
    result
}

struct MetricsChannel {
    sender: Sender<MetricsTask>,
    receiver: Receiver<MetricsTask>,
}

impl Default for MetricsChannel {
    fn default() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(5000);
        Self { sender, receiver }
    }
}

enum MetricsTask {
    Histogram { id: &'static str, delta: Duration },
}

fn keep_recording_metrics(receiver: Receiver<MetricsTask>) {
    while let Ok(task) = receiver.recv() {
        match task {
            MetricsTask::Histogram { id, delta } => {
                metrics::histogram!(id).record(delta.as_secs_f64());
            }
        }
    }
}
