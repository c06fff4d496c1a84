//! Browser binding: the page drives a manual clock from its own
//! `setInterval` and passes `Date.now()` in whole seconds as the wall clock.

use std::sync::Arc;
use std::time::Duration;

use passtick::{
    ClockSource, ManualWallClock, PasscodeSnapshot, PasscodeTicker, TickerConfigBuilder,
    TickerEvent, TickerState,
};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TickPayload<'a> {
    state: &'a TickerState,
    text: &'a str,
    expired: bool,
}

#[wasm_bindgen]
pub struct WasmTicker {
    clock: ClockSource,
    wall: Arc<ManualWallClock>,
    ticker: PasscodeTicker,
}

#[wasm_bindgen]
impl WasmTicker {
    #[wasm_bindgen(constructor)]
    pub fn new(skew_threshold_secs: u32, expiry_grace_ticks: u32) -> Result<WasmTicker, JsValue> {
        let config = TickerConfigBuilder::default()
            .skew_threshold(Duration::from_secs(u64::from(skew_threshold_secs)))
            .expiry_grace_ticks(u64::from(expiry_grace_ticks))
            .build_validated()
            .map_err(to_js_err)?;
        let clock = ClockSource::manual();
        let wall = Arc::new(ManualWallClock::new(0));
        let ticker = PasscodeTicker::new(config, clock.handle(), wall.clone()).map_err(to_js_err)?;
        Ok(WasmTicker {
            clock,
            wall,
            ticker,
        })
    }

    /// Accepts the backend's passcode response object as-is.
    #[wasm_bindgen(js_name = setSnapshot)]
    pub fn set_snapshot(&mut self, response: JsValue, wall_now_secs: f64) -> Result<JsValue, JsValue> {
        let snapshot: PasscodeSnapshot = from_value(response)
            .map_err(|err| JsValue::from_str(&format!("failed to decode passcode response: {err}")))?;
        self.wall.set(wall_now_secs.floor() as i64);
        self.ticker.set_snapshot(snapshot).map_err(to_js_err)?;
        self.payload(false)
    }

    pub fn tick(&mut self, wall_now_secs: f64) -> Result<JsValue, JsValue> {
        self.wall.set(wall_now_secs.floor() as i64);
        let now = self
            .clock
            .advance()
            .ok_or_else(|| JsValue::from_str("clock is not manual"))?;
        let expired = matches!(self.ticker.tick(now), Some(TickerEvent::Expired));
        self.payload(expired)
    }

    fn payload(&self, expired: bool) -> Result<JsValue, JsValue> {
        let state = self.ticker.state();
        to_value(&TickPayload {
            state,
            text: state.display_text(),
            expired,
        })
        .map_err(|err| JsValue::from_str(&err.to_string()))
    }
}

fn to_js_err(err: passtick::Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}
