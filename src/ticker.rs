//! Per-code passcode state machine.
//!
//! A [`PasscodeTicker`] anchors a [`PasscodeSnapshot`] to the shared clock
//! reading at arrival time and, on every tick, projects the server's clock
//! forward from that anchor. Which passcode to show, how long it has left and
//! whether both passcodes have gone stale all fall out of integer period
//! arithmetic on that projection; nothing is counted down in place.
//!
//! | period index vs. anchor period | phase            | shows            |
//! |--------------------------------|------------------|------------------|
//! | same                           | `Active`         | current passcode |
//! | +1                             | `Active`         | next passcode    |
//! | +2 or later                    | `ExpiredPending` | "Expired"        |
//!
//! Skew is judged once per snapshot against the wall clock and pins the
//! ticker in `Skewed` until a new snapshot replaces it.

use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;

use crate::clock::ClockHandle;
use crate::error::Error;
use crate::time::WallClock;
use crate::types::{PasscodeSnapshot, TickerEvent, TickerPhase, TickerState};

/// Behavioural constants of the state machine.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(pattern = "owned")]
pub struct TickerConfig {
    /// Largest tolerated difference between server time and local wall time.
    #[builder(default = "Duration::from_secs(5)")]
    pub skew_threshold: Duration,
    /// Ticks the "Expired" placeholder stays up before the host is told.
    #[builder(default = "3")]
    pub expiry_grace_ticks: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            skew_threshold: Duration::from_secs(5),
            expiry_grace_ticks: 3,
        }
    }
}

impl TickerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        // Server timestamps are whole seconds; anything finer would be silently truncated.
        if self.skew_threshold.subsec_nanos() != 0 {
            return Err(Error::InvalidConfig(
                "skew_threshold must be a whole number of seconds".into(),
            ));
        }
        Ok(())
    }
}

impl TickerConfigBuilder {
    pub fn build_validated(self) -> Result<TickerConfig, Error> {
        let config = self
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
struct Anchor {
    snapshot: PasscodeSnapshot,
    local: u64,
    skewed: bool,
    expired_sent: bool,
}

impl Anchor {
    fn server_now(&self, now: u64) -> i64 {
        let since = i64::try_from(now.saturating_sub(self.local)).unwrap_or(i64::MAX);
        self.snapshot.server_timestamp_seconds.saturating_add(since)
    }

    /// Server second at which the pre-fetched next passcode goes stale too.
    fn expires_at(&self) -> i64 {
        let period = i64::from(self.snapshot.period_seconds);
        let anchor_period = self
            .snapshot
            .period_index(self.snapshot.server_timestamp_seconds);
        anchor_period.saturating_add(2).saturating_mul(period)
    }

    fn project(&self, now: u64) -> TickerState {
        if self.skewed {
            return TickerState::skewed();
        }

        let snapshot = &self.snapshot;
        let server_now = self.server_now(now);
        let rotations = snapshot.period_index(server_now)
            - snapshot.period_index(snapshot.server_timestamp_seconds);

        let displayed_passcode = match rotations {
            0 => snapshot.current_passcode.clone(),
            1 => snapshot.next_passcode.clone(),
            _ => {
                return TickerState {
                    displayed_passcode: None,
                    seconds_remaining_in_period: 0,
                    phase: TickerPhase::ExpiredPending,
                }
            }
        };

        let period = i64::from(snapshot.period_seconds);
        let position = server_now.rem_euclid(period);
        let remaining = u32::try_from(period - position).unwrap_or(snapshot.period_seconds);

        TickerState {
            displayed_passcode: Some(displayed_passcode),
            seconds_remaining_in_period: remaining,
            phase: TickerPhase::Active,
        }
    }

    /// Ticks spent in `ExpiredPending` at `now`, if it has been entered.
    fn ticks_expired(&self, now: u64) -> Option<u64> {
        if self.skewed {
            return None;
        }
        let past = self.server_now(now) - self.expires_at();
        u64::try_from(past).ok()
    }
}

/// Tracks one code's passcode pair against a shared clock.
pub struct PasscodeTicker {
    config: TickerConfig,
    clock: ClockHandle,
    wall: Arc<dyn WallClock>,
    anchor: Option<Anchor>,
    state: TickerState,
}

impl std::fmt::Debug for PasscodeTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasscodeTicker")
            .field("config", &self.config)
            .field("anchor", &self.anchor)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PasscodeTicker {
    pub fn new(
        config: TickerConfig,
        clock: ClockHandle,
        wall: Arc<dyn WallClock>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            wall,
            anchor: None,
            state: TickerState::awaiting(),
        })
    }

    pub fn config(&self) -> &TickerConfig {
        &self.config
    }

    pub fn state(&self) -> &TickerState {
        &self.state
    }

    pub fn phase(&self) -> TickerPhase {
        self.state.phase
    }

    pub fn snapshot(&self) -> Option<&PasscodeSnapshot> {
        self.anchor.as_ref().map(|a| &a.snapshot)
    }

    /// Replace the reference point with a freshly issued snapshot.
    ///
    /// Whatever the ticker was doing before, including showing a skew warning
    /// or an expired placeholder, is discarded. The state is re-derived at the
    /// current clock reading straight away.
    pub fn set_snapshot(&mut self, snapshot: PasscodeSnapshot) -> Result<&TickerState, Error> {
        snapshot.validate()?;

        let local = self.clock.elapsed();
        let wall_now = self.wall.now_seconds();
        let skew = snapshot.server_timestamp_seconds.abs_diff(wall_now);
        let skewed = skew > self.config.skew_threshold.as_secs();

        if skewed {
            tracing::warn!(
                server_time = snapshot.server_timestamp_seconds,
                wall_time = wall_now,
                skew,
                "rejecting passcode snapshot: clock skew too significant"
            );
        } else {
            tracing::debug!(
                server_time = snapshot.server_timestamp_seconds,
                period = snapshot.period_seconds,
                anchor = local,
                "passcode snapshot anchored"
            );
        }

        let anchor = Anchor {
            snapshot,
            local,
            skewed,
            expired_sent: false,
        };
        self.state = anchor.project(local);
        self.anchor = Some(anchor);
        Ok(&self.state)
    }

    /// The state this ticker would show at clock reading `now`.
    pub fn state_at(&self, now: u64) -> TickerState {
        match &self.anchor {
            Some(anchor) => anchor.project(now),
            None => TickerState::awaiting(),
        }
    }

    /// Recompute for clock reading `now`.
    ///
    /// Returns [`TickerEvent::Expired`] once per snapshot, when the expired
    /// placeholder has been up for the configured grace ticks.
    pub fn tick(&mut self, now: u64) -> Option<TickerEvent> {
        let anchor = self.anchor.as_mut()?;
        let next = anchor.project(now);

        if next.phase != self.state.phase || next.displayed_passcode != self.state.displayed_passcode
        {
            match next.phase {
                TickerPhase::Active => tracing::debug!(tick = now, "passcode rolled over"),
                TickerPhase::ExpiredPending => tracing::debug!(tick = now, "passcodes expired"),
                _ => {}
            }
        }
        self.state = next;

        if anchor.expired_sent {
            return None;
        }
        match anchor.ticks_expired(now) {
            Some(ticks) if ticks >= self.config.expiry_grace_ticks => {
                anchor.expired_sent = true;
                tracing::info!(tick = now, "passcode expiry grace elapsed, requesting refresh");
                Some(TickerEvent::Expired)
            }
            _ => None,
        }
    }
}
