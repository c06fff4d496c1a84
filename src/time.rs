use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of true wall-clock time, used to judge server timestamps.
///
/// Kept separate from the tick clock so tests can pin the wall clock while
/// stepping ticks by hand.
pub trait WallClock: Send + Sync {
    /// Seconds since the UNIX epoch.
    fn now_seconds(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_seconds(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_secs())
                .map(|s| -s)
                .unwrap_or(i64::MIN),
        }
    }
}

/// Wall clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualWallClock {
    now: AtomicI64,
}

impl ManualWallClock {
    pub fn new(now_seconds: i64) -> Self {
        Self {
            now: AtomicI64::new(now_seconds),
        }
    }

    pub fn set(&self, now_seconds: i64) {
        self.now.store(now_seconds, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl WallClock for ManualWallClock {
    fn now_seconds(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
