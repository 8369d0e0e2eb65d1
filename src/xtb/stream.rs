// =============================================================================
// XTB streaming connection — candle subscription pushed onto a channel
// =============================================================================
//
// The stream session lives only as long as the login on the command
// connection, so the reader task takes that connection over and pings both
// sockets on the same cadence. Either side closing ends the stream.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::client::Socket;
use super::protocol::{self, StreamEvent};
use super::SessionHandle;
use crate::candle::RawTick;
use crate::types::ServerMode;

/// Ticks buffered between the reader task and the consumer.
const TICK_CHANNEL_CAPACITY: usize = 1024;

/// Ping cadence for both connections. xAPI expires idle stream sessions and
/// drops command connections silent for more than ten minutes.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Connect the streaming endpoint, subscribe to `symbol` candles and spawn
/// the reader task, which also owns the logged-in `command` connection from
/// here on. The returned channel closes when either connection ends or fails,
/// or when the server rejects the subscription.
pub async fn open(
    mode: ServerMode,
    session: &SessionHandle,
    symbol: &str,
    command: Socket,
    debug: bool,
) -> Result<mpsc::Receiver<RawTick>> {
    let url = mode.stream_url();
    info!(url = %url, symbol = %symbol, "connecting to xAPI stream");

    let (mut stream, _response) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    let subscribe = protocol::subscribe_candles(session.stream_session_id(), symbol);
    if debug {
        debug!(target: "gather::wire", payload = %subscribe, "-> stream");
    }
    stream
        .send(Message::Text(subscribe.to_string()))
        .await
        .context("failed to subscribe to candles")?;
    info!(symbol = %symbol, "subscribed to candle stream");

    let reader = Reader {
        session_id: session.stream_session_id().to_string(),
        symbol: symbol.to_string(),
        ping_every: PING_INTERVAL,
        debug,
    };
    Ok(reader.spawn(stream, command))
}

struct Reader {
    session_id: String,
    symbol: String,
    ping_every: Duration,
    debug: bool,
}

impl Reader {
    fn spawn(self, stream: Socket, command: Socket) -> mpsc::Receiver<RawTick> {
        let (tx, rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);
        tokio::spawn(self.run(stream, command, tx));
        rx
    }

    async fn run(self, stream: Socket, command: Socket, tx: mpsc::Sender<RawTick>) {
        let Reader {
            session_id,
            symbol,
            ping_every,
            debug,
        } = self;
        let (mut write, mut read) = stream.split();
        let (mut command_write, mut command_read) = command.split();

        let mut ping = tokio::time::interval(ping_every);
        // The first tick fires immediately; the subscription was just sent.
        ping.tick().await;

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if debug {
                            debug!(target: "gather::wire", payload = %text, "<- stream");
                        }
                        match protocol::parse_stream_frame(&text) {
                            Ok(StreamEvent::Candle(tick)) => {
                                if tx.send(tick).await.is_err() {
                                    debug!(symbol = %symbol, "tick receiver dropped, stopping stream");
                                    return;
                                }
                            }
                            Ok(StreamEvent::Rejected { code, description }) => {
                                error!(symbol = %symbol, code = %code, descr = %description, "stream rejected by server");
                                return;
                            }
                            Ok(StreamEvent::Ignored) => {}
                            Err(e) => warn!(error = %e, "failed to parse stream frame"),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!(symbol = %symbol, frame = ?frame, "stream closed by server");
                        return;
                    }
                    // Ping/Pong/Binary: tungstenite answers pings itself.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(symbol = %symbol, error = %e, "stream read error");
                        return;
                    }
                    None => {
                        warn!(symbol = %symbol, "stream ended");
                        return;
                    }
                },
                msg = command_read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if debug {
                            debug!(target: "gather::wire", payload = %text, "<- response");
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!(symbol = %symbol, frame = ?frame, "command connection closed by server, stream session ends");
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(symbol = %symbol, error = %e, "command connection read error");
                        return;
                    }
                    None => {
                        warn!(symbol = %symbol, "command connection ended, stream session ends");
                        return;
                    }
                },
                _ = ping.tick() => {
                    let payload = protocol::stream_ping(&session_id);
                    if let Err(e) = write.send(Message::Text(payload.to_string())).await {
                        error!(error = %e, "stream ping failed");
                        return;
                    }

                    let tag = uuid::Uuid::new_v4().to_string();
                    let payload = protocol::command("ping", None, &tag);
                    if debug {
                        debug!(target: "gather::wire", payload = %payload, "-> request");
                    }
                    if let Err(e) = command_write.send(Message::Text(payload.to_string())).await {
                        error!(error = %e, "command ping failed");
                        return;
                    }
                    debug!("pings sent");
                }
                _ = tx.closed() => {
                    debug!(symbol = %symbol, "tick receiver dropped, stopping stream");
                    return;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
