// =============================================================================
// Candle — canonical OHLCV record and the broker-record normalizers
// =============================================================================
//
// Both acquisition paths (historical range fetch and live stream) funnel into
// a single `Candle` shape before anything reaches the output sink.
// =============================================================================

use serde::Deserialize;

/// One historical bar as returned by the broker's chart-range request
/// (xAPI `RATE_INFO_RECORD`). It does not carry the symbol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawBar {
    pub ctm: i64,
    #[serde(rename = "ctmString")]
    pub ctm_string: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vol: f64,
}

/// One streamed candle update (xAPI `STREAMING_CANDLE_RECORD`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTick {
    pub symbol: String,
    pub ctm: i64,
    #[serde(rename = "ctmString")]
    pub ctm_string: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vol: f64,
    #[serde(rename = "quoteId")]
    pub quote_id: i64,
}

/// Canonical candle record. Immutable once built; the only unit the sink
/// accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp_millis: i64,
    /// Source-provided rendering of `timestamp_millis`, never recomputed.
    pub timestamp_text: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Only streamed ticks carry a quote id.
    pub quote_id: Option<i64>,
}

impl Candle {
    /// Historical bars lack a symbol, so the configured one is injected.
    pub fn from_historical_bar(symbol: &str, bar: RawBar) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp_millis: bar.ctm,
            timestamp_text: bar.ctm_string,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.vol,
            quote_id: None,
        }
    }

    pub fn from_streamed_tick(tick: RawTick) -> Self {
        Self {
            symbol: tick.symbol,
            timestamp_millis: tick.ctm,
            timestamp_text: tick.ctm_string,
            open: tick.open,
            high: tick.high,
            low: tick.low,
            close: tick.close,
            volume: tick.vol,
            quote_id: Some(tick.quote_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> RawBar {
        RawBar {
            ctm: 1_483_228_800_000,
            ctm_string: "Jan 1, 2017 12:00:00 AM".into(),
            open: 1.0512,
            high: 1.0530,
            low: 1.0501,
            close: 1.0520,
            vol: 312.0,
        }
    }

    #[test]
    fn historical_bar_gets_configured_symbol_and_no_quote() {
        let candle = Candle::from_historical_bar("EURUSD", sample_bar());
        assert_eq!(candle.symbol, "EURUSD");
        assert_eq!(candle.timestamp_millis, 1_483_228_800_000);
        assert_eq!(candle.timestamp_text, "Jan 1, 2017 12:00:00 AM");
        assert_eq!(candle.open, 1.0512);
        assert_eq!(candle.high, 1.0530);
        assert_eq!(candle.low, 1.0501);
        assert_eq!(candle.close, 1.0520);
        assert_eq!(candle.volume, 312.0);
        assert_eq!(candle.quote_id, None);
    }

    #[test]
    fn streamed_tick_is_copied_verbatim() {
        let tick = RawTick {
            symbol: "GBPUSD".into(),
            ctm: 1_378_369_375_000,
            ctm_string: "Sep 05, 2013 10:22:55 AM".into(),
            open: 1.2501,
            high: 1.2510,
            low: 1.2499,
            close: 1.2505,
            vol: 0.0,
            quote_id: 2,
        };
        let candle = Candle::from_streamed_tick(tick);
        assert_eq!(candle.symbol, "GBPUSD");
        assert_eq!(candle.timestamp_millis, 1_378_369_375_000);
        assert_eq!(candle.timestamp_text, "Sep 05, 2013 10:22:55 AM");
        assert_eq!(candle.close, 1.2505);
        assert_eq!(candle.quote_id, Some(2));
    }

    #[test]
    fn raw_tick_deserializes_from_xapi_payload() {
        let json = r#"{
            "close": 4.1849,
            "ctm": 1378369375000,
            "ctmString": "Sep 05, 2013 10:22:55 AM",
            "high": 4.1854,
            "low": 4.1848,
            "open": 4.1848,
            "quoteId": 2,
            "symbol": "EURUSD",
            "vol": 0.0
        }"#;
        let tick: RawTick = serde_json::from_str(json).expect("should parse");
        assert_eq!(tick.symbol, "EURUSD");
        assert_eq!(tick.quote_id, 2);
        assert!((tick.high - 4.1854).abs() < f64::EPSILON);
    }
}
