//! Logging macros used on or near the audio thread.
//!
//! `tracing` calls can allocate (formatting, span storage) and the audio thread must
//! never allocate once it's up and running. These macros wrap the call site in
//! `assert_no_alloc::permit_alloc` so that an occasional warning (a starved provider, a
//! rejected configuration change) doesn't trip the no-alloc assertion that guards the
//! rest of the block.

#[macro_export]
macro_rules! rt_trace {
    ($($tts:tt)*) => {
        assert_no_alloc::permit_alloc(|| {
            tracing::trace!($($tts)*);
        })
    };
}

#[macro_export]
macro_rules! rt_debug {
    ($($tts:tt)*) => {
        assert_no_alloc::permit_alloc(|| {
            tracing::debug!($($tts)*);
        })
    };
}

#[macro_export]
macro_rules! rt_warn {
    ($($tts:tt)*) => {
        assert_no_alloc::permit_alloc(|| {
            tracing::warn!($($tts)*);
        })
    };
}

#[macro_export]
macro_rules! rt_error {
    ($($tts:tt)*) => {
        assert_no_alloc::permit_alloc(|| {
            tracing::error!($($tts)*);
        })
    };
}

/// Logs `Err` as a warning and discards it, handing back `Some(value)` on success.
///
/// Used at fire-and-forget call sites (e.g. a control-thread command that failed
/// validation) where the caller has no useful recovery path beyond observing the
/// warning.
pub fn ok_or_log_as_warn<T, E: std::fmt::Display>(result: Result<T, E>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    }
}
