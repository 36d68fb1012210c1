use std::sync::{Mutex, MutexGuard, TryLockError};

/// Locks a mutex without ever blocking the calling (audio) thread.
///
/// A poisoned mutex still yields its guard — a panic on a control thread must not take
/// the whole engine down with it. The only thing that must never happen is the audio
/// thread waiting on a control thread; if that would occur, we panic loudly instead of
/// silently stalling a callback.
///
/// # Panics
///
/// Panics if the lock is currently held by another thread.
pub fn non_blocking_lock<'a, T>(mutex: &'a Mutex<T>, description: &'static str) -> MutexGuard<'a, T> {
    match mutex.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            panic!("locking mutex would block: {description}")
        }
    }
}

/// Like [`non_blocking_lock`] but returns `None` on contention instead of panicking.
///
/// Use this on the audio thread for locks that are allowed to be occasionally busy
/// (e.g. a command queue a control thread is mid-write to); the caller falls back to
/// "nothing changed this block" rather than stalling.
pub fn try_lock<'a, T>(mutex: &'a Mutex<T>) -> Option<MutexGuard<'a, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
