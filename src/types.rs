use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const EXPIRED_TEXT: &str = "Expired";
pub const SKEW_WARNING_TEXT: &str = "Clock skew too significant";
pub const AWAITING_TEXT: &str = "Loading";

/// A passcode pair as issued by the server, anchored to the server's clock.
///
/// Serialized with the backend's field names:
/// `{"passcode", "nextPasscode", "serverTime", "period"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasscodeSnapshot {
    #[serde(rename = "passcode")]
    pub current_passcode: String,
    #[serde(rename = "nextPasscode")]
    pub next_passcode: String,
    #[serde(rename = "serverTime")]
    pub server_timestamp_seconds: i64,
    #[serde(rename = "period")]
    pub period_seconds: u32,
}

impl PasscodeSnapshot {
    pub fn new(
        current_passcode: impl Into<String>,
        next_passcode: impl Into<String>,
        server_timestamp_seconds: i64,
        period_seconds: u32,
    ) -> Result<Self, Error> {
        let snapshot = Self {
            current_passcode: current_passcode.into(),
            next_passcode: next_passcode.into(),
            server_timestamp_seconds,
            period_seconds,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.period_seconds == 0 {
            return Err(Error::InvalidSnapshot("period must be > 0".into()));
        }
        Ok(())
    }

    /// Index of the rotation period containing `server_seconds`.
    pub fn period_index(&self, server_seconds: i64) -> i64 {
        server_seconds.div_euclid(i64::from(self.period_seconds))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickerPhase {
    /// No snapshot received yet.
    Awaiting,
    /// Server and local wall clock disagree; nothing may be shown.
    Skewed,
    Active,
    /// Both passcodes are stale; the "Expired" placeholder is showing.
    ExpiredPending,
}

/// Everything a display needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerState {
    pub displayed_passcode: Option<String>,
    pub seconds_remaining_in_period: u32,
    pub phase: TickerPhase,
}

impl TickerState {
    pub const fn awaiting() -> Self {
        Self {
            displayed_passcode: None,
            seconds_remaining_in_period: 0,
            phase: TickerPhase::Awaiting,
        }
    }

    pub const fn skewed() -> Self {
        Self {
            displayed_passcode: None,
            seconds_remaining_in_period: 0,
            phase: TickerPhase::Skewed,
        }
    }

    pub fn display_text(&self) -> &str {
        match self.phase {
            TickerPhase::Awaiting => AWAITING_TEXT,
            TickerPhase::Skewed => SKEW_WARNING_TEXT,
            TickerPhase::ExpiredPending => EXPIRED_TEXT,
            TickerPhase::Active => self.displayed_passcode.as_deref().unwrap_or_default(),
        }
    }
}

/// Notifications a ticker hands back to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerEvent {
    /// The expiry grace window has elapsed; fetch a fresh snapshot.
    Expired,
}
