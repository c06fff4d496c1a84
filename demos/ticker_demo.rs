//! Minimal end-to-end demo of the passcode ticker.
//!
//! - A stand-in backend issues passcode pairs labelled by period index.
//! - A board owns the real 1-second clock and two code displays.
//! - Ticks are awaited on Tokio; expiry re-fetches automatically.
//!
//! Run with `RUST_LOG=passtick=debug` to see rollover and expiry events.

use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use passtick::{
    ClockConfig, ClockSource, PasscodeBoard, PasscodeSnapshot, PasscodeSource, SourceError,
    SystemWallClock, TickerConfigBuilder, WallClock,
};
use tracing_subscriber::EnvFilter;

const PERIOD: u32 = 10;
const DEMO_TICKS: usize = 30;

struct DemoBackend;

impl PasscodeSource for DemoBackend {
    fn fetch(&self, code_id: &str) -> Result<PasscodeSnapshot, SourceError> {
        let now = SystemWallClock.now_seconds();
        let index = now.div_euclid(i64::from(PERIOD));
        Ok(PasscodeSnapshot::new(
            format!("{code_id}:{:06}", index % 1_000_000),
            format!("{code_id}:{:06}", (index + 1) % 1_000_000),
            now,
            PERIOD,
        )?)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let clock = ClockSource::start(ClockConfig::default())?;
    let config = TickerConfigBuilder::default()
        .expiry_grace_ticks(2)
        .build_validated()?;
    let mut board = PasscodeBoard::new(
        clock,
        Arc::new(DemoBackend),
        Arc::new(SystemWallClock),
        config,
    )?;

    board.mount("github")?;
    board.mount("aws")?;

    for _ in 0..DEMO_TICKS {
        let now = board.next_tick().await?;
        let line = board
            .displays()
            .iter()
            .map(|d| {
                format!(
                    "{} {} ({:>2}s)",
                    d.code_id(),
                    d.state().display_text(),
                    d.state().seconds_remaining_in_period
                )
            })
            .collect::<Vec<_>>()
            .join(" | ");
        print!("\r[{now:>3}] {line}");
        let _ = std::io::stdout().flush();
    }
    println!();

    Ok(())
}
