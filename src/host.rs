//! Host side of the ticker: fetching snapshots and re-arming on expiry.
//!
//! A [`PasscodeBoard`] is one presenting scope. It owns the scope's only
//! [`ClockSource`], one [`CodeDisplay`] per visible code, and drains clock
//! ticks on the caller's thread so every display is recomputed for tick `n`
//! before any display sees tick `n + 1`.

use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, TryRecvError};

use crate::clock::{ClockHandle, ClockSource};
use crate::error::Error;
use crate::ticker::{PasscodeTicker, TickerConfig};
use crate::time::WallClock;
use crate::types::{PasscodeSnapshot, TickerEvent, TickerState};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("code not found: {0}")]
    NotFound(String),
    #[error("passcode request failed: {0}")]
    Request(String),
    #[error(transparent)]
    Snapshot(#[from] Error),
}

/// Issues passcode snapshots for a code, typically by calling the backend.
pub trait PasscodeSource: Send + Sync {
    fn fetch(&self, code_id: &str) -> Result<PasscodeSnapshot, SourceError>;
}

/// One code on screen: its identifier and the ticker driving it.
#[derive(Debug)]
pub struct CodeDisplay {
    code_id: String,
    ticker: PasscodeTicker,
    last_error: Option<String>,
}

impl CodeDisplay {
    /// Create the display and request its first snapshot.
    ///
    /// A failed fetch leaves the display waiting; the error is kept for the
    /// host to show.
    pub fn mount(
        code_id: impl Into<String>,
        ticker: PasscodeTicker,
        source: &dyn PasscodeSource,
    ) -> Self {
        let mut display = Self {
            code_id: code_id.into(),
            ticker,
            last_error: None,
        };
        // Failures are already recorded in `last_error`.
        display.refresh(source).ok();
        display
    }

    pub fn code_id(&self) -> &str {
        &self.code_id
    }

    pub fn state(&self) -> &TickerState {
        self.ticker.state()
    }

    pub fn ticker(&self) -> &PasscodeTicker {
        &self.ticker
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fetch a fresh snapshot and re-arm the ticker with it.
    pub fn refresh(&mut self, source: &dyn PasscodeSource) -> Result<&TickerState, SourceError> {
        let fetched = source.fetch(&self.code_id).and_then(|snapshot| {
            self.ticker
                .set_snapshot(snapshot)
                .map(|_| ())
                .map_err(SourceError::from)
        });
        match fetched {
            Ok(()) => {
                self.last_error = None;
                Ok(self.ticker.state())
            }
            Err(err) => {
                tracing::warn!(code_id = %self.code_id, error = %err, "passcode refresh failed");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Feed one clock tick. An expiry event triggers exactly one refresh.
    /// Skewed tickers never expire, so a skew warning stays until the host
    /// refreshes by hand.
    pub fn on_tick(&mut self, now: u64, source: &dyn PasscodeSource) -> Option<TickerEvent> {
        let event = self.ticker.tick(now)?;
        match event {
            TickerEvent::Expired => {
                self.refresh(source).ok();
            }
        }
        Some(event)
    }
}

/// A presenting scope: one shared clock, many code displays.
pub struct PasscodeBoard<S: PasscodeSource> {
    clock: ClockSource,
    ticks: Receiver<u64>,
    source: Arc<S>,
    wall: Arc<dyn WallClock>,
    config: TickerConfig,
    displays: Vec<CodeDisplay>,
}

impl<S: PasscodeSource + 'static> PasscodeBoard<S> {
    pub fn new(
        clock: ClockSource,
        source: Arc<S>,
        wall: Arc<dyn WallClock>,
        config: TickerConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let ticks = clock.subscribe();
        Ok(Self {
            clock,
            ticks,
            source,
            wall,
            config,
            displays: Vec::new(),
        })
    }

    pub fn clock(&self) -> ClockHandle {
        self.clock.handle()
    }

    /// The owned clock, e.g. to step a manual clock.
    pub fn clock_source(&self) -> &ClockSource {
        &self.clock
    }

    pub fn displays(&self) -> &[CodeDisplay] {
        &self.displays
    }

    pub fn display(&self, code_id: &str) -> Option<&CodeDisplay> {
        self.displays.iter().find(|d| d.code_id == code_id)
    }

    /// Show a code. Mounting an already visible code refreshes it instead.
    pub fn mount(&mut self, code_id: &str) -> Result<&CodeDisplay, Error> {
        if let Some(idx) = self.displays.iter().position(|d| d.code_id == code_id) {
            let existing = &mut self.displays[idx];
            existing.refresh(self.source.as_ref()).ok();
            return Ok(existing);
        }

        let ticker = PasscodeTicker::new(
            self.config.clone(),
            self.clock.handle(),
            Arc::clone(&self.wall),
        )?;
        let mounted = CodeDisplay::mount(code_id, ticker, self.source.as_ref());
        let phase = mounted.state().phase;
        tracing::debug!(code_id, ?phase, "code display mounted");
        self.displays.push(mounted);
        Ok(&self.displays[self.displays.len() - 1])
    }

    pub fn unmount(&mut self, code_id: &str) -> bool {
        let before = self.displays.len();
        self.displays.retain(|d| d.code_id != code_id);
        before != self.displays.len()
    }

    /// Manually re-request a code, e.g. after the user acknowledged a skew warning.
    pub fn refresh(&mut self, code_id: &str) -> Option<Result<&TickerState, SourceError>> {
        let source = Arc::clone(&self.source);
        let display = self.displays.iter_mut().find(|d| d.code_id == code_id)?;
        Some(display.refresh(source.as_ref()))
    }

    fn apply(&mut self, now: u64) -> usize {
        let source = self.source.as_ref();
        self.displays
            .iter_mut()
            .filter_map(|display| display.on_tick(now, source))
            .count()
    }

    /// Process every tick that has already been published. Returns the number
    /// of ticks applied.
    pub fn pump(&mut self) -> Result<usize, Error> {
        let mut applied = 0;
        loop {
            match self.ticks.try_recv() {
                Ok(now) => {
                    self.apply(now);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return Ok(applied),
                Err(TryRecvError::Disconnected) => return Err(Error::ChannelClosed),
            }
        }
    }

    /// Block until the next tick (or `timeout`), then apply it.
    pub fn wait_tick(&mut self, timeout: Duration) -> Result<Option<u64>, Error> {
        match self.ticks.recv_timeout(timeout) {
            Ok(now) => {
                self.apply(now);
                Ok(Some(now))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::ChannelClosed),
        }
    }

    /// Await the next tick without blocking an async runtime, then apply it.
    pub async fn next_tick(&mut self) -> Result<u64, Error> {
        let now = self
            .ticks
            .recv_async()
            .await
            .map_err(|_| Error::ChannelClosed)?;
        self.apply(now);
        Ok(now)
    }
}
