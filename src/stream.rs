use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Monotonic tick counter written by a single clock and read by anyone.
#[derive(Debug)]
pub struct TickCounter {
    elapsed: AtomicU64,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            elapsed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.elapsed.load(Ordering::Acquire)
    }

    /// Increments the counter and returns the new value.
    #[inline]
    pub fn bump(&self) -> u64 {
        self.elapsed.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct StopFlag {
    stop: AtomicBool,
}

impl StopFlag {
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn force_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}
