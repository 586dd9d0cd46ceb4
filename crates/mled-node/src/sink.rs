//! Pattern output

use mled_core::CuePrepare;
use tracing::info;

/// Where activated patterns go
///
/// A real fixture drives LEDs from this; headless deployments log.
pub trait PatternSink: Send {
    fn apply(&mut self, cue_id: u32, prepare: &CuePrepare);
    fn clear(&mut self, fade_out_ms: u16);
}

/// Sink that logs pattern changes instead of rendering them
#[derive(Debug, Default)]
pub struct TracingSink;

impl PatternSink for TracingSink {
    fn apply(&mut self, cue_id: u32, prepare: &CuePrepare) {
        info!(
            cue_id,
            pattern = prepare.pattern.pattern.type_code(),
            brightness = prepare.pattern.brightness_pct,
            fade_in_ms = prepare.fade_in_ms,
            "pattern applied"
        );
    }

    fn clear(&mut self, fade_out_ms: u16) {
        info!(fade_out_ms, "pattern cleared");
    }
}
