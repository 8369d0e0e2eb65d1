// =============================================================================
// xAPI wire format — request builders and response envelopes
// =============================================================================
//
// Commands are JSON objects `{ "command", "arguments", "customTag" }` sent as
// WebSocket text frames. Every response carries `status`; failures add
// `errorCode` and `errorDescr`. The streaming connection pushes
// `{ "command": "<kind>", "data": { ... } }` frames.
// =============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::candle::{RawBar, RawTick};
use crate::types::{Period, ServerMode, TimeRange};

/// Name reported to the broker on login.
pub const APP_NAME: &str = "gather";

const WS_BASE: &str = "wss://ws.xtb.com";

impl ServerMode {
    /// Request/response endpoint.
    pub fn command_url(self) -> String {
        match self {
            Self::Demo => format!("{WS_BASE}/demo"),
            Self::Live => format!("{WS_BASE}/real"),
        }
    }

    /// Streaming endpoint paired with [`ServerMode::command_url`].
    pub fn stream_url(self) -> String {
        match self {
            Self::Demo => format!("{WS_BASE}/demoStream"),
            Self::Live => format!("{WS_BASE}/realStream"),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn command(name: &str, arguments: Option<Value>, custom_tag: &str) -> Value {
    let mut req = json!({ "command": name, "customTag": custom_tag });
    if let Some(args) = arguments {
        req["arguments"] = args;
    }
    req
}

pub fn login_arguments(user_id: &str, password: &str) -> Value {
    json!({
        "userId": user_id,
        "password": password,
        "appName": APP_NAME,
    })
}

pub fn chart_range_arguments(symbol: &str, range: TimeRange, period: Period) -> Value {
    json!({
        "info": {
            "symbol": symbol,
            "period": period.minutes(),
            "start": range.start_ms,
            "end": range.end_ms,
            "ticks": 0,
        }
    })
}

pub fn subscribe_candles(stream_session_id: &str, symbol: &str) -> Value {
    json!({
        "command": "getCandles",
        "streamSessionId": stream_session_id,
        "symbol": symbol,
    })
}

pub fn stream_ping(stream_session_id: &str) -> Value {
    json!({
        "command": "ping",
        "streamSessionId": stream_session_id,
    })
}

/// Copy of a request safe to put in logs.
pub fn redacted(request: &Value) -> Value {
    let mut copy = request.clone();
    if let Some(pw) = copy.pointer_mut("/arguments/password") {
        *pw = Value::String("***".into());
    }
    copy
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub status: bool,
    #[serde(rename = "returnData", default)]
    pub return_data: Option<Value>,
    #[serde(rename = "streamSessionId", default)]
    pub stream_session_id: Option<String>,
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
    #[serde(rename = "errorDescr", default)]
    pub error_descr: Option<String>,
    #[serde(rename = "customTag", default)]
    pub custom_tag: Option<String>,
}

impl Response {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse xAPI response")
    }

    pub fn error_code(&self) -> &str {
        self.error_code.as_deref().unwrap_or("UNKNOWN")
    }

    pub fn error_descr(&self) -> &str {
        self.error_descr.as_deref().unwrap_or("no description")
    }
}

#[derive(Debug, Deserialize)]
struct ChartRangeData {
    #[serde(rename = "rateInfos", default)]
    rate_infos: Vec<RawBar>,
}

/// Extract the bars from a `getChartRangeRequest` return payload.
pub fn parse_rate_infos(return_data: Value) -> Result<Vec<RawBar>> {
    let data: ChartRangeData =
        serde_json::from_value(return_data).context("malformed chart range payload")?;
    Ok(data.rate_infos)
}

#[derive(Debug, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    status: Option<bool>,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
    #[serde(rename = "errorDescr", default)]
    error_descr: Option<String>,
}

/// What one streaming frame means to the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Candle(RawTick),
    /// `status: false`, e.g. an invalid session or an unknown symbol. The
    /// server sends nothing useful after this.
    Rejected { code: String, description: String },
    /// keepAlive and any other frame the collector does not consume.
    Ignored,
}

/// Parse one streaming frame.
pub fn parse_stream_frame(text: &str) -> Result<StreamEvent> {
    let frame: StreamFrame =
        serde_json::from_str(text).context("failed to parse streaming frame")?;
    if frame.status == Some(false) {
        return Ok(StreamEvent::Rejected {
            code: frame.error_code.unwrap_or_else(|| "UNKNOWN".into()),
            description: frame.error_descr.unwrap_or_else(|| "no description".into()),
        });
    }
    if frame.command.as_deref() != Some("candle") {
        return Ok(StreamEvent::Ignored);
    }
    let data = frame.data.context("candle frame without data")?;
    let tick = serde_json::from_value(data).context("malformed candle record")?;
    Ok(StreamEvent::Candle(tick))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_follow_server_mode() {
        assert_eq!(ServerMode::Demo.command_url(), "wss://ws.xtb.com/demo");
        assert_eq!(ServerMode::Demo.stream_url(), "wss://ws.xtb.com/demoStream");
        assert_eq!(ServerMode::Live.command_url(), "wss://ws.xtb.com/real");
        assert_eq!(ServerMode::Live.stream_url(), "wss://ws.xtb.com/realStream");
    }

    #[test]
    fn chart_range_request_shape() {
        let range = TimeRange {
            start_ms: 1_000,
            end_ms: 61_000,
        };
        let req = command(
            "getChartRangeRequest",
            Some(chart_range_arguments("EURUSD", range, Period::M1)),
            "tag-1",
        );
        assert_eq!(req["command"], "getChartRangeRequest");
        assert_eq!(req["customTag"], "tag-1");
        let info = &req["arguments"]["info"];
        assert_eq!(info["symbol"], "EURUSD");
        assert_eq!(info["period"], 1);
        assert_eq!(info["start"], 1_000);
        assert_eq!(info["end"], 61_000);
        assert_eq!(info["ticks"], 0);
    }

    #[test]
    fn logout_has_no_arguments() {
        let req = command("logout", None, "t");
        assert!(req.get("arguments").is_none());
    }

    #[test]
    fn redaction_hides_password_only() {
        let req = command("login", Some(login_arguments("1000", "hunter2")), "t");
        let safe = redacted(&req);
        assert_eq!(safe["arguments"]["password"], "***");
        assert_eq!(safe["arguments"]["userId"], "1000");
        assert_eq!(req["arguments"]["password"], "hunter2");
    }

    #[test]
    fn login_responses_parse() {
        let ok = Response::parse(r#"{"status":true,"streamSessionId":"8469308d","customTag":"t"}"#)
            .expect("ok response");
        assert!(ok.status);
        assert_eq!(ok.stream_session_id.as_deref(), Some("8469308d"));

        let rejected = Response::parse(
            r#"{"status":false,"errorCode":"BE005","errorDescr":"userPasswordCheck: Invalid login or password"}"#,
        )
        .expect("error response");
        assert!(!rejected.status);
        assert_eq!(rejected.error_code(), "BE005");
        assert!(rejected.error_descr().contains("Invalid login"));
    }

    #[test]
    fn rate_infos_keep_broker_order() {
        let data = serde_json::json!({
            "digits": 5,
            "rateInfos": [
                {"close": 1.0, "ctm": 1389362640000i64, "ctmString": "Jan 10, 2014 3:04:00 PM", "high": 6.0, "low": 0.0, "open": 41848.0, "vol": 0.0},
                {"close": -2.0, "ctm": 1389362700000i64, "ctmString": "Jan 10, 2014 3:05:00 PM", "high": 3.0, "low": -4.0, "open": 41849.0, "vol": 12.5}
            ]
        });
        let bars = parse_rate_infos(data).expect("bars");
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ctm, 1_389_362_640_000);
        assert_eq!(bars[1].ctm_string, "Jan 10, 2014 3:05:00 PM");
        assert_eq!(bars[1].vol, 12.5);
    }

    #[test]
    fn stream_frames_filter_to_candles() {
        let candle = r#"{"command":"candle","data":{"close":4.1849,"ctm":1378369375000,"ctmString":"Sep 05, 2013 10:22:55 AM","high":4.1854,"low":4.1848,"open":4.1848,"quoteId":2,"symbol":"EURUSD","vol":0.0}}"#;
        match parse_stream_frame(candle).expect("parses") {
            StreamEvent::Candle(tick) => {
                assert_eq!(tick.symbol, "EURUSD");
                assert_eq!(tick.quote_id, 2);
            }
            other => panic!("expected candle, got {other:?}"),
        }

        let keep_alive = r#"{"command":"keepAlive","data":{"timestamp":1362944112000}}"#;
        assert_eq!(parse_stream_frame(keep_alive).expect("parses"), StreamEvent::Ignored);

        assert!(parse_stream_frame("not json").is_err());
    }

    #[test]
    fn subscription_and_ping_carry_session_id() {
        let sub = subscribe_candles("sid-1", "EURUSD");
        assert_eq!(sub["command"], "getCandles");
        assert_eq!(sub["streamSessionId"], "sid-1");
        assert_eq!(sub["symbol"], "EURUSD");

        let ping = stream_ping("sid-1");
        assert_eq!(ping["command"], "ping");
        assert_eq!(ping["streamSessionId"], "sid-1");
    }

    #[test]
    fn error_status_frame_is_a_rejection() {
        let rejected = r#"{"status":false,"errorCode":"BE110","errorDescr":"Invalid stream session"}"#;
        assert_eq!(
            parse_stream_frame(rejected).expect("parses"),
            StreamEvent::Rejected {
                code: "BE110".into(),
                description: "Invalid stream session".into(),
            }
        );

        let bare = r#"{"status":false}"#;
        match parse_stream_frame(bare).expect("parses") {
            StreamEvent::Rejected { code, .. } => assert_eq!(code, "UNKNOWN"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn command_ping_is_a_plain_tagged_command() {
        let ping = command("ping", None, "tag-9");
        assert_eq!(ping["command"], "ping");
        assert_eq!(ping["customTag"], "tag-9");
        assert!(ping.get("streamSessionId").is_none());
        assert!(ping.get("arguments").is_none());
    }
}
