// =============================================================================
// Acquisition Orchestrator — login, pick a mode, route every candle to the sink
// =============================================================================
//
//   Start ──login fails──▶ AuthFailed
//     │
//     ├─ lookback > 0 ──▶ Historical Fetch ──▶ HistoryDone (logout, best effort)
//     │
//     └─ otherwise ─────▶ Live Stream (runs until the process is killed)
//
// Any sink error aborts the run on the spot; records already written stay
// written.
// =============================================================================

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::candle::Candle;
use crate::config::EffectiveConfig;
use crate::error::GatherError;
use crate::sink::CandleSink;
use crate::types::{Period, TimeRange};
use crate::xtb::{Broker, SessionHandle};

/// Granularity of historical bars.
pub const HISTORY_PERIOD: Period = Period::M1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Historical { lookback_secs: u64 },
    LiveStream,
}

impl Mode {
    pub fn select(config: &EffectiveConfig) -> Self {
        match config.history_lookback_secs {
            Some(lookback_secs) if lookback_secs > 0 => Self::Historical { lookback_secs },
            _ => Self::LiveStream,
        }
    }
}

/// `[now - lookback, now]` in milliseconds. Saturates instead of wrapping, so
/// `start_ms <= end_ms` always holds.
pub fn history_range(now_ms: i64, lookback_secs: u64) -> TimeRange {
    let span_ms = i64::try_from(lookback_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    TimeRange {
        start_ms: now_ms.saturating_sub(span_ms),
        end_ms: now_ms,
    }
}

/// Drive one collection run.
///
/// Returns the number of records written. Only the historical path returns
/// `Ok`; the live path ends in an error once the stream closes.
pub async fn run<B>(
    config: &EffectiveConfig,
    broker: &mut B,
    sink: &CandleSink,
) -> Result<u64, GatherError>
where
    B: Broker + ?Sized,
{
    let session = broker.login(&config.username, &config.password).await?;

    let mode = Mode::select(config);
    info!(symbol = %config.symbol, mode = ?mode, server = %config.server, "acquisition mode selected");

    match mode {
        Mode::Historical { lookback_secs } => {
            let range = history_range(Utc::now().timestamp_millis(), lookback_secs);
            fetch_history(config, broker, sink, range).await
        }
        Mode::LiveStream => stream_live(config, broker, &session, sink).await,
    }
}

async fn fetch_history<B>(
    config: &EffectiveConfig,
    broker: &mut B,
    sink: &CandleSink,
    range: TimeRange,
) -> Result<u64, GatherError>
where
    B: Broker + ?Sized,
{
    info!(
        symbol = %config.symbol,
        start_ms = range.start_ms,
        end_ms = range.end_ms,
        "fetching history"
    );
    let bars = broker
        .fetch_historical_range(&config.symbol, range, HISTORY_PERIOD)
        .await?;

    let mut written = 0u64;
    for bar in bars {
        let candle = Candle::from_historical_bar(&config.symbol, bar);
        sink.write(&candle)?;
        written += 1;
        debug!(ctm = candle.timestamp_millis, close = candle.close, "bar written");
    }

    // Every bar is already on disk; a failed logout does not undo that.
    if let Err(e) = broker.logout().await {
        warn!(error = %e, "logout failed after history dump");
    }
    info!(symbol = %config.symbol, written, "history done");
    Ok(written)
}

async fn stream_live<B>(
    config: &EffectiveConfig,
    broker: &mut B,
    session: &SessionHandle,
    sink: &CandleSink,
) -> Result<u64, GatherError>
where
    B: Broker + ?Sized,
{
    let mut ticks = broker.open_candle_stream(session, &config.symbol).await?;
    info!(symbol = %config.symbol, "gathering data");

    let mut written = 0u64;
    while let Some(tick) = ticks.recv().await {
        let candle = Candle::from_streamed_tick(tick);
        sink.write(&candle)?;
        written += 1;
        debug!(
            ctm = candle.timestamp_millis,
            close = candle.close,
            quote_id = candle.quote_id,
            "tick written"
        );
    }

    Err(GatherError::StreamClosed { written })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
