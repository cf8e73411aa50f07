//! Persistent duplex WebSocket channel to the remote shell endpoint.
//!
//! A background pump task owns both halves of the stream:
//!
//! - outbound messages queue through an mpsc channel and are written to the
//!   wire in queue order, so sends from different session tasks are
//!   serialized and never interleave;
//! - inbound frames are decoded leniently and surfaced via
//!   [`Connection::recv`]; the sequence is finite and ends when the peer
//!   closes or the channel errors;
//! - a liveness ping goes out every `PING_INTERVAL`; a probe unanswered
//!   for `PING_TIMEOUT` closes the channel, treated identically to a
//!   remote close.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, trace, warn};

use wssh_core::constants::{CLOSE_TIMEOUT, PING_INTERVAL, PING_TIMEOUT};
use wssh_core::error::{Error, Result};
use wssh_core::protocol::{self, Inbound, ProtocolMessage};

/// Cloneable send capability handed to session tasks.
///
/// Tasks get send access, never ownership of the channel itself.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<ProtocolMessage>,
}

impl MessageSender {
    pub(crate) fn from_channel(tx: mpsc::UnboundedSender<ProtocolMessage>) -> Self {
        Self { tx }
    }

    /// Queue a message for sending.
    ///
    /// Messages are written to the wire in queue order. Fails with
    /// [`Error::ConnectionClosed`] once the channel has shut down.
    pub fn send(&self, msg: ProtocolMessage) -> Result<()> {
        self.tx.send(msg).map_err(|_| Error::ConnectionClosed)
    }
}

/// The persistent channel to the remote endpoint.
#[derive(Debug)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<ProtocolMessage>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    pump: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Open the WebSocket channel.
    ///
    /// Fails with [`Error::Connect`]; the caller decides whether to retry.
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = connect_async(url).await.map_err(|e| Error::Connect {
            message: e.to_string(),
        })?;
        debug!(url, "WebSocket channel open");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(stream, outbound_rx, inbound_tx));

        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            pump,
        })
    }

    /// Get a cloneable send handle for session tasks.
    pub fn sender(&self) -> MessageSender {
        MessageSender::from_channel(self.outbound.clone())
    }

    /// Receive the next inbound payload.
    ///
    /// Returns `None` once the peer closes or the channel errors. The
    /// sequence is not restartable.
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }

    /// Close the channel.
    ///
    /// Drops the outbound queue so the pump drains pending messages, sends
    /// a Close frame, and exits. Best-effort: a pump that does not finish
    /// within `CLOSE_TIMEOUT` is logged and abandoned.
    pub async fn close(self) {
        drop(self.outbound);
        if tokio::time::timeout(CLOSE_TIMEOUT, self.pump).await.is_err() {
            warn!("connection pump did not finish within close timeout");
        }
    }
}

/// Background task owning the WebSocket stream.
///
/// Exits when the peer closes, the channel errors, the liveness probe
/// expires, or every outbound sender has been dropped.
async fn pump<S>(
    stream: WebSocketStream<S>,
    mut outbound: mpsc::UnboundedReceiver<ProtocolMessage>,
    inbound: mpsc::UnboundedSender<Inbound>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut source) = stream.split();

    let start = Instant::now() + PING_INTERVAL;
    let mut ping_timer = tokio::time::interval_at(start, PING_INTERVAL);
    ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // Deadline for an outstanding liveness probe, if any.
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let deadline = pong_deadline;
        let liveness = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let payload = match msg.encode() {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(error = %e, "dropping unencodable message");
                            continue;
                        }
                    };
                    trace!(len = payload.len(), "send");
                    if sink.send(WsFrame::Text(payload)).await.is_err() {
                        debug!("send failed, channel closed");
                        break;
                    }
                }
                None => {
                    // Every sender dropped: orderly local close.
                    let _ = sink.send(WsFrame::Close(None)).await;
                    debug!("outbound queue closed, shutting down channel");
                    break;
                }
            },

            frame = source.next() => {
                // Any complete frame proves the peer is alive; an
                // outstanding probe is satisfied by traffic, not only by
                // its Pong.
                if let Some(Ok(_)) = &frame {
                    pong_deadline = None;
                }
                match frame {
                    Some(Ok(WsFrame::Text(text))) => {
                        if inbound.send(protocol::decode(&text)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsFrame::Binary(data))) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        if inbound.send(protocol::decode(&text)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsFrame::Ping(payload))) => {
                        let _ = sink.send(WsFrame::Pong(payload)).await;
                    }
                    Some(Ok(WsFrame::Pong(_))) => {
                        trace!("pong received");
                    }
                    Some(Ok(WsFrame::Close(_))) => {
                        debug!("peer closed the channel");
                        break;
                    }
                    Some(Ok(WsFrame::Frame(_))) => {
                        // Raw frames never surface from a completed read
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "channel error");
                        break;
                    }
                    None => {
                        debug!("channel stream ended");
                        break;
                    }
                }
            },

            _ = ping_timer.tick() => {
                if pong_deadline.is_none() {
                    if sink.send(WsFrame::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    pong_deadline = Some(Instant::now() + PING_TIMEOUT);
                }
            }

            _ = liveness => {
                warn!("liveness probe unanswered, treating channel as closed");
                break;
            }
        }
    }
    // Dropping the inbound sender ends the receive sequence for the session.
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio_tungstenite::tungstenite::protocol::Role;

    #[tokio::test(start_paused = true)]
    async fn unanswered_ping_is_treated_as_remote_close() {
        let (client_io, mut server_io) = duplex(4096);
        let ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let pump_task = tokio::spawn(pump(ws, outbound_rx, inbound_tx));

        // Peer that drains raw bytes but never answers anything.
        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                match server_io.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let start = Instant::now();
        // The pump must give up on its own: expiry ends the inbound
        // sequence exactly like a remote close.
        assert!(inbound_rx.recv().await.is_none());
        assert!(start.elapsed() >= PING_INTERVAL + PING_TIMEOUT);

        pump_task.await.unwrap();
        assert!(outbound_tx.send(ProtocolMessage::stdin("x")).is_err());
        reader.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_traffic_counts_as_liveness() {
        let (client_io, server_io) = duplex(64 * 1024);
        let ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let pump_task = tokio::spawn(pump(ws, outbound_rx, inbound_tx));

        // Peer that streams output but never reads its side, so pings go
        // unanswered while frames keep arriving.
        let (mut server_sink, _server_source) = server.split();
        let streamer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(5)).await;
                let frame = WsFrame::Text(r#"{"operation":"stdout","data":"tick"}"#.to_string());
                if server_sink.send(frame).await.is_err() {
                    break;
                }
            }
        });

        // Several ping intervals and pong deadlines pass; the channel
        // must stay open because traffic keeps proving liveness.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!pump_task.is_finished());
        assert!(inbound_rx.recv().await.is_some());

        streamer.abort();
        drop(outbound_tx);
        let _ = tokio::time::timeout(Duration::from_secs(30), pump_task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn answered_ping_keeps_the_channel_open() {
        let (client_io, server_io) = duplex(4096);
        let ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let pump_task = tokio::spawn(pump(ws, outbound_rx, inbound_tx));

        // Peer that answers each ping explicitly.
        let (mut server_sink, mut server_source) = server.split();
        let responder = tokio::spawn(async move {
            while let Some(Ok(frame)) = server_source.next().await {
                if let WsFrame::Ping(payload) = frame {
                    if server_sink.send(WsFrame::Pong(payload)).await.is_err() {
                        break;
                    }
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!pump_task.is_finished());

        drop(outbound_tx);
        let _ = tokio::time::timeout(Duration::from_secs(30), pump_task).await;
        responder.abort();
        assert!(inbound_rx.recv().await.is_none());
    }
}
