//! Thread-safe sequence counter for emitted images.
//!
//! The relay numbers every image it emits so viewers can order them and spot
//! session restarts.  Numbers are handed out by the encode worker, which may
//! run on any thread of the blocking pool, so the counter is an `AtomicU64`
//! rather than a plain integer behind a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A lock-free, monotonically increasing counter starting at 0.
///
/// The counter wraps around at `u64::MAX` back to 0 without panicking.
///
/// ```rust
/// use tortoise_core::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.peek(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value and advances the counter by one.
    ///
    /// `Relaxed` is enough: the number only needs to be unique, and the image
    /// carrying it is published through the broadcast channel, which provides
    /// its own synchronisation.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// The value the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}
