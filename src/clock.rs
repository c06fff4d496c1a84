//! Shared once-per-second clock for every passcode display in a scope.
//!
//! A [`ClockSource`] owns the only timer in its scope. Consumers get a
//! [`ClockHandle`], which can read the elapsed counter and subscribe to tick
//! notifications but can never drive the clock itself, so every display in
//! the scope sees the same tick values in the same order.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use derive_builder::Builder;
use flume::{Receiver, RecvTimeoutError, Sender};

use crate::error::Error;
use crate::stream::{StopFlag, TickCounter};

/// Clock driver configuration.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(pattern = "owned")]
pub struct ClockConfig {
    #[builder(default = "Duration::from_secs(1)")]
    pub tick_interval: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.tick_interval < Duration::from_millis(1) {
            return Err(Error::InvalidConfig(
                "tick_interval must be at least 1 millisecond".into(),
            ));
        }
        Ok(())
    }
}

impl ClockConfigBuilder {
    pub fn build_validated(self) -> Result<ClockConfig, Error> {
        let config = self
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Default)]
struct Shared {
    counter: TickCounter,
    subscribers: Mutex<Vec<Sender<u64>>>,
    closed: StopFlag,
}

impl Shared {
    fn publish(&self) -> u64 {
        // Bump under the lock so subscribers always receive values in order.
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        let now = self.counter.bump();
        subscribers.retain(|tx| tx.send(now).is_ok());
        tracing::trace!(elapsed = now, subscribers = subscribers.len(), "clock tick");
        now
    }

    fn subscribe(&self) -> Receiver<u64> {
        let (tx, rx) = flume::unbounded();
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        // A stopped clock hands out receivers that are already disconnected.
        if !self.closed.should_stop() {
            subscribers.push(tx);
        }
        rx
    }

    /// Disconnect every subscriber; later subscriptions start disconnected.
    fn close(&self) {
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        self.closed.force_stop();
        subscribers.clear();
    }
}

/// Read-only view of a [`ClockSource`].
#[derive(Debug, Clone)]
pub struct ClockHandle {
    shared: Arc<Shared>,
}

impl ClockHandle {
    /// Seconds elapsed since the owning clock started.
    pub fn elapsed(&self) -> u64 {
        self.shared.counter.get()
    }

    /// Receive every subsequent tick value. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<u64> {
        self.shared.subscribe()
    }
}

/// The single timer of a presenting scope.
///
/// Dropping the clock stops and joins its driver thread.
#[derive(Debug)]
pub struct ClockSource {
    shared: Arc<Shared>,
    stop: Arc<StopFlag>,
    wake: Option<Sender<()>>,
    driver: Option<JoinHandle<()>>,
}

impl ClockSource {
    /// Start counting from 0 on a dedicated driver thread.
    ///
    /// # Panics
    /// If the driver thread cannot be spawned. A scope without a running clock
    /// would silently freeze every countdown.
    pub fn start(config: ClockConfig) -> Result<Self, Error> {
        config.validate()?;

        let shared = Arc::new(Shared::default());
        let stop = Arc::new(StopFlag::new());
        let (wake_tx, wake_rx) = flume::bounded::<()>(1);

        let driver = {
            let shared = Arc::clone(&shared);
            let stop = Arc::clone(&stop);
            let interval = config.tick_interval;
            thread::Builder::new()
                .name("passtick-clock".into())
                .spawn(move || drive(&shared, &stop, &wake_rx, interval))
                .expect("failed to spawn clock driver thread")
        };

        tracing::debug!(interval = ?config.tick_interval, "clock source started");

        Ok(Self {
            shared,
            stop,
            wake: Some(wake_tx),
            driver: Some(driver),
        })
    }

    /// A clock with no driver thread; it only moves through [`ClockSource::advance`].
    pub fn manual() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            stop: Arc::new(StopFlag::new()),
            wake: None,
            driver: None,
        }
    }

    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn elapsed(&self) -> u64 {
        self.shared.counter.get()
    }

    pub fn subscribe(&self) -> Receiver<u64> {
        self.shared.subscribe()
    }

    pub fn is_manual(&self) -> bool {
        self.driver.is_none()
    }

    /// Publish one tick on a manual clock. Returns `None` for a driven clock,
    /// which only its own timer may advance.
    pub fn advance(&self) -> Option<u64> {
        if !self.is_manual() || self.stop.should_stop() {
            return None;
        }
        Some(self.shared.publish())
    }
}

impl Drop for ClockSource {
    fn drop(&mut self) {
        self.stop.force_stop();
        // Disconnecting the wake channel interrupts the driver's wait.
        self.wake.take();
        if let Some(driver) = self.driver.take() {
            if driver.join().is_err() {
                tracing::error!("clock driver thread panicked");
            }
        }
        self.shared.close();
        tracing::debug!(elapsed = self.shared.counter.get(), "clock source stopped");
    }
}

fn drive(shared: &Shared, stop: &StopFlag, wake: &Receiver<()>, interval: Duration) {
    let started = Instant::now();
    let mut ticks: u32 = 0;
    loop {
        // Deadlines are computed from the start instant so sleeps never accumulate drift.
        let deadline = interval
            .checked_mul(ticks.saturating_add(1))
            .map(|offset| started + offset);
        let wait = match deadline {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => interval,
        };
        match wake.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if stop.should_stop() {
            break;
        }
        shared.publish();
        ticks = ticks.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_counts_every_tick_exactly_once() {
        let clock = ClockSource::manual();
        let rx = clock.subscribe();
        assert_eq!(clock.elapsed(), 0);

        for n in 1..=50u64 {
            assert_eq!(clock.advance(), Some(n));
            assert_eq!(clock.elapsed(), n);
        }

        let seen: Vec<u64> = rx.try_iter().collect();
        assert_eq!(seen, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn handles_share_one_counter() {
        let clock = ClockSource::manual();
        let a = clock.handle();
        let b = a.clone();
        let rx_a = a.subscribe();
        let rx_b = b.subscribe();

        clock.advance();
        clock.advance();

        assert_eq!(a.elapsed(), 2);
        assert_eq!(b.elapsed(), 2);
        assert_eq!(rx_a.try_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(rx_b.try_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let clock = ClockSource::manual();
        let rx = clock.subscribe();
        drop(clock.subscribe());

        clock.advance();
        assert_eq!(clock.shared.subscribers.lock().unwrap().len(), 1);
        assert_eq!(rx.try_recv(), Ok(1));
    }

    #[test]
    fn driven_clock_cannot_be_advanced_by_hand() {
        let clock = ClockSource::start(ClockConfig::default()).expect("start clock");
        assert!(!clock.is_manual());
        assert_eq!(clock.advance(), None);
        assert_eq!(clock.elapsed(), 0);
    }

    #[test]
    fn driven_clock_ticks_and_stops_on_drop() {
        let config = ClockConfigBuilder::default()
            .tick_interval(Duration::from_millis(5))
            .build_validated()
            .expect("valid config");
        let clock = ClockSource::start(config).expect("start clock");
        let handle = clock.handle();
        let rx = clock.subscribe();

        for expected in 1..=3u64 {
            let tick = rx
                .recv_timeout(Duration::from_secs(2))
                .expect("tick within deadline");
            assert_eq!(tick, expected);
        }

        drop(clock);
        let frozen = handle.elapsed();
        assert!(frozen >= 3);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(handle.elapsed(), frozen);
    }

    #[test]
    fn handle_subscribers_disconnect_when_driven_clock_drops() {
        let config = ClockConfigBuilder::default()
            .tick_interval(Duration::from_millis(5))
            .build_validated()
            .expect("valid config");
        let clock = ClockSource::start(config).expect("start clock");
        let handle = clock.handle();
        let rx = handle.subscribe();

        drop(clock);
        while rx.try_recv().is_ok() {}

        assert_eq!(
            rx.recv_timeout(Duration::from_millis(200)),
            Err(RecvTimeoutError::Disconnected)
        );
        assert_eq!(
            handle.subscribe().try_recv(),
            Err(flume::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn handle_subscribers_disconnect_when_manual_clock_drops() {
        let clock = ClockSource::manual();
        let handle = clock.handle();
        let rx = handle.subscribe();
        clock.advance();

        drop(clock);

        assert_eq!(rx.try_recv(), Ok(1));
        assert_eq!(rx.try_recv(), Err(flume::TryRecvError::Disconnected));
        assert_eq!(handle.elapsed(), 1);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = ClockConfigBuilder::default()
            .tick_interval(Duration::ZERO)
            .build_validated()
            .expect_err("zero interval should be rejected");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
