// 6.0 config.rs: all settings in one place. trading window, tolerances, buffers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// Engine-wide configuration. Default is the NSE cash-equity session the
// simulator targets: 09:15 to 15:45 IST, weekdays only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // exchange UTC offset in seconds (IST = +5:30)
    pub utc_offset_secs: i32,
    // session open, minutes from local midnight
    pub open_minute: u32,
    // close cutoff, minutes from local midnight. EOD settlement is due at or
    // after this minute.
    pub close_minute: u32,
    // prices within this band are treated as equal by trigger rules
    pub price_epsilon: Decimal,
    // a quote older than this is unavailable
    pub quote_ttl_millis: i64,
    // audit event buffer cap; oldest events drain past this
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::nse()
    }
}

impl EngineConfig {
    pub fn nse() -> Self {
        Self {
            utc_offset_secs: 5 * 3600 + 1800,
            open_minute: 9 * 60 + 15,
            close_minute: 15 * 60 + 45,
            price_epsilon: Decimal::new(1, 2), // 0.01
            quote_ttl_millis: 60_000,
            max_events: 10_000,
        }
    }

    pub fn is_market_open(&self, now: Timestamp) -> bool {
        let minute = now.minute_of_day(self.utc_offset_secs);
        now.is_weekday(self.utc_offset_secs) && minute >= self.open_minute && minute < self.close_minute
    }

    pub fn is_after_close(&self, now: Timestamp) -> bool {
        now.is_weekday(self.utc_offset_secs)
            && now.minute_of_day(self.utc_offset_secs) >= self.close_minute
    }
}
