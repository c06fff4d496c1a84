//! Client-side TOTP passcode lifecycle tracking.
//!
//! The server hands out a passcode, the one after it, its own timestamp and
//! the rotation period. From that and a shared once-per-second clock this
//! crate reconstructs the countdown locally, rolls over to the next passcode,
//! blanks the display once both are stale and refuses to show anything when
//! the server's clock disagrees with ours.
//!
//! - [`clock`]: the single shared tick clock of a presenting scope.
//! - [`ticker`]: the per-code rollover/expiry/skew state machine.
//! - [`host`]: displays and boards that fetch snapshots and re-arm tickers.
//! - [`store`]: group and code records, backup reminder.

pub mod clock;
pub mod error;
pub mod host;
pub mod store;
pub mod stream;
pub mod ticker;
pub mod time;
pub mod types;

pub use clock::{ClockConfig, ClockConfigBuilder, ClockHandle, ClockSource};
pub use error::Error;
pub use host::{CodeDisplay, PasscodeBoard, PasscodeSource, SourceError};
pub use store::{BackupWarning, CodeGroup, CodeSummary, GroupStore};
pub use ticker::{PasscodeTicker, TickerConfig, TickerConfigBuilder};
pub use time::{ManualWallClock, SystemWallClock, WallClock};
pub use types::{PasscodeSnapshot, TickerEvent, TickerPhase, TickerState};
