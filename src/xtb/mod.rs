pub mod client;
pub mod protocol;
pub mod stream;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::candle::{RawBar, RawTick};
use crate::types::{Period, TimeRange};

pub use client::XtbClient;

/// Stream session identifier issued by a successful login. The streaming
/// connection is opened with it and never authenticates on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    stream_session_id: String,
}

impl SessionHandle {
    pub fn new(stream_session_id: impl Into<String>) -> Self {
        Self {
            stream_session_id: stream_session_id.into(),
        }
    }

    pub fn stream_session_id(&self) -> &str {
        &self.stream_session_id
    }
}

/// The broker rejected the supplied credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub code: String,
    pub description: String,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "login rejected ({}): {}", self.code, self.description)
    }
}

impl std::error::Error for AuthError {}

/// Everything the collector needs from a broker session.
///
/// `login` reports a credential rejection as an [`AuthError`] inside the
/// `anyhow::Error`; any other error is a transport or protocol failure.
#[async_trait]
pub trait Broker: Send {
    async fn login(&mut self, username: &str, password: &str) -> Result<SessionHandle>;

    async fn logout(&mut self) -> Result<()>;

    async fn fetch_historical_range(
        &mut self,
        symbol: &str,
        range: TimeRange,
        period: Period,
    ) -> Result<Vec<RawBar>>;

    /// Subscribe to candle updates. Ticks arrive on the returned channel in
    /// the order the broker sent them; the channel closes when the streaming
    /// connection ends.
    async fn open_candle_stream(
        &mut self,
        session: &SessionHandle,
        symbol: &str,
    ) -> Result<mpsc::Receiver<RawTick>>;
}
