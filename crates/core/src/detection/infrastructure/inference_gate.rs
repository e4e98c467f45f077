use std::sync::{Mutex, TryLockError};

/// Exclusive, non-blocking access to a value that must only be used by one
/// caller at a time.
///
/// [`InferenceGate::try_run`] never waits: if another caller holds the gate
/// it returns `None` straight away. The lock is released when the closure
/// returns or unwinds.
pub struct InferenceGate<T> {
    inner: Mutex<T>,
}

impl<T> InferenceGate<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Runs `f` with exclusive access, or returns `None` if the gate is held.
    ///
    /// A panic inside an earlier run poisons the mutex; the value is still
    /// handed out, since a panicking engine call leaves no partial state the
    /// next call depends on.
    pub fn try_run<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return None,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        Some(f(&mut guard))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.inner.try_lock(), Err(TryLockError::WouldBlock))
    }
}
