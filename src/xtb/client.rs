// =============================================================================
// XTB command client — request/response session over one WebSocket
// =============================================================================
//
// xAPI answers commands strictly in order on a single connection, so every
// request is sent and its response awaited before the next one goes out.
// Each request carries a fresh `customTag`; a response echoing a different tag
// means the session is out of step and is treated as a protocol error.
// =============================================================================

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};

use super::protocol::{self, Response};
use super::{stream, AuthError, Broker, SessionHandle};
use crate::candle::{RawBar, RawTick};
use crate::types::{Period, ServerMode, TimeRange};

pub(super) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Authenticated (or about to be) command session against one XTB server.
pub struct XtbClient {
    /// `None` once the connection was handed to the stream reader.
    socket: Option<Socket>,
    mode: ServerMode,
    /// Trace raw request/response JSON.
    debug: bool,
}

impl XtbClient {
    /// Open the command connection for `mode`.
    pub async fn connect(mode: ServerMode, debug: bool) -> Result<Self> {
        let url = mode.command_url();
        info!(url = %url, server = %mode, "connecting to xAPI");

        let (socket, _response) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect to {url}"))?;

        info!(server = %mode, "xAPI connected");
        Ok(Self {
            socket: Some(socket),
            mode,
            debug,
        })
    }

    /// Send one command and wait for its response.
    async fn send_command(&mut self, name: &str, arguments: Option<Value>) -> Result<Response> {
        let tag = uuid::Uuid::new_v4().to_string();
        let request = protocol::command(name, arguments, &tag);

        if self.debug {
            debug!(target: "gather::wire", payload = %protocol::redacted(&request), "-> request");
        }

        self.socket()?
            .send(Message::Text(request.to_string()))
            .await
            .with_context(|| format!("failed to send {name}"))?;

        let text = self.next_text().await.with_context(|| format!("no response to {name}"))?;
        if self.debug {
            debug!(target: "gather::wire", payload = %text, "<- response");
        }

        let response = Response::parse(&text)?;
        if let Some(echoed) = response.custom_tag.as_deref() {
            if echoed != tag {
                bail!("response tag mismatch for {name}: sent {tag}, got {echoed}");
            }
        }
        Ok(response)
    }

    fn socket(&mut self) -> Result<&mut Socket> {
        self.socket
            .as_mut()
            .context("command connection is owned by the candle stream")
    }

    /// Next text frame; control frames are skipped, a close ends the session.
    async fn next_text(&mut self) -> Result<String> {
        let socket = self.socket()?;
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Close(frame))) => bail!("connection closed by server: {frame:?}"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e).context("xAPI read error"),
                None => bail!("xAPI connection ended"),
            }
        }
    }
}

#[async_trait]
impl Broker for XtbClient {
    #[instrument(skip(self, password), name = "xtb::login")]
    async fn login(&mut self, username: &str, password: &str) -> Result<SessionHandle> {
        let response = self
            .send_command("login", Some(protocol::login_arguments(username, password)))
            .await?;

        if !response.status {
            warn!(code = response.error_code(), "login rejected");
            return Err(AuthError {
                code: response.error_code().to_string(),
                description: response.error_descr().to_string(),
            }
            .into());
        }

        let session_id = response
            .stream_session_id
            .context("login succeeded without a streamSessionId")?;
        info!("logged in");
        Ok(SessionHandle::new(session_id))
    }

    async fn logout(&mut self) -> Result<()> {
        let response = self.send_command("logout", None).await?;
        if !response.status {
            warn!(
                code = response.error_code(),
                descr = response.error_descr(),
                "logout reported failure"
            );
        }
        // The server may already have dropped the socket after logout.
        if let Err(e) = self.socket()?.close(None).await {
            debug!(error = %e, "closing xAPI socket after logout");
        }
        info!("logged out");
        Ok(())
    }

    #[instrument(skip(self), name = "xtb::chart_range")]
    async fn fetch_historical_range(
        &mut self,
        symbol: &str,
        range: TimeRange,
        period: Period,
    ) -> Result<Vec<RawBar>> {
        let response = self
            .send_command(
                "getChartRangeRequest",
                Some(protocol::chart_range_arguments(symbol, range, period)),
            )
            .await?;

        if !response.status {
            bail!(
                "getChartRangeRequest failed ({}): {}",
                response.error_code(),
                response.error_descr()
            );
        }

        let data = response
            .return_data
            .context("getChartRangeRequest returned no data")?;
        let bars = protocol::parse_rate_infos(data)?;
        info!(count = bars.len(), "chart range received");
        Ok(bars)
    }

    async fn open_candle_stream(
        &mut self,
        session: &SessionHandle,
        symbol: &str,
    ) -> Result<mpsc::Receiver<RawTick>> {
        // XTB drops the stream session once its owning login goes away, so the
        // stream reader keeps this connection alive from now on.
        let command = self
            .socket
            .take()
            .context("command connection is already owned by a candle stream")?;
        stream::open(self.mode, session, symbol, command, self.debug).await
    }
}
