//! Outbound WebSocket connection with exponential-backoff reconnect.
//!
//! The loop connects, presents the persisted session token via a
//! `resume` frame, then pumps frames both ways until the socket drops.
//! On a drop it reports [`ClientEvent::Disconnected`] so the consumer
//! pauses local accrual, and retries with growing delays until the
//! server is back or the cancellation token fires. After a
//! reconnect the server treats the resume as a fresh acquire, so the
//! offline gap is simply absent from the record.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use workpulse_core::protocol::{self, ClientMessage, ServerMessage};
use workpulse_core::types::DbId;

/// What the connection loop reports to its consumer.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The socket is up and the resume frame was sent.
    Connected,
    /// A parsed server frame.
    Frame(ServerMessage),
    /// The socket dropped; local accrual should pause until the next
    /// `Connected`.
    Disconnected,
}

/// Session identity presented on every (re)connect.
#[derive(Debug, Clone)]
pub struct ResumeCredentials {
    pub identity_id: DbId,
    pub session_token: String,
}

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// The delay following `current`, clamped to `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let grown = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(grown).min(self.max_delay)
    }
}

/// Why the connection loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    /// The socket dropped; reconnect.
    ConnectionLost,
    /// Cancelled, or the outbound command channel closed.
    Stop,
}

/// Run the connect/pump/reconnect loop until cancelled.
///
/// Inbound server frames and connectivity transitions go to `events`;
/// frames to send are taken from `outbound`. Frames submitted while
/// disconnected are dropped with a log line; callers re-derive state
/// from the post-resume snapshot rather than replaying blind.
pub async fn run(
    url: String,
    credentials: ResumeCredentials,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    events: mpsc::Sender<ClientEvent>,
    mut outbound: mpsc::Receiver<ClientMessage>,
) {
    let mut delay = reconnect.initial_delay;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let socket = tokio::select! {
            _ = cancel.cancelled() => return,
            result = tokio_tungstenite::connect_async(url.as_str()) => match result {
                Ok((socket, _response)) => socket,
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Connect failed, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = reconnect.next_delay(delay);
                    continue;
                }
            },
        };

        tracing::info!(identity_id = credentials.identity_id, "Connected");
        delay = reconnect.initial_delay;
        attempt = 0;

        match pump(socket, &credentials, &cancel, &events, &mut outbound).await {
            PumpExit::Stop => return,
            PumpExit::ConnectionLost => {
                if events.send(ClientEvent::Disconnected).await.is_err() {
                    return;
                }
                tracing::info!("Connection lost, entering reconnect loop");
            }
        }
    }
}

/// Pump one established socket until it drops or we are told to stop.
async fn pump<S>(
    socket: tokio_tungstenite::WebSocketStream<S>,
    credentials: &ResumeCredentials,
    cancel: &CancellationToken,
    events: &mpsc::Sender<ClientEvent>,
    outbound: &mut mpsc::Receiver<ClientMessage>,
) -> PumpExit
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    let resume = ClientMessage::Resume {
        identity_id: credentials.identity_id,
        session_token: credentials.session_token.clone(),
    };
    if send_frame(&mut sink, &resume).await.is_err() {
        return PumpExit::ConnectionLost;
    }
    if events.send(ClientEvent::Connected).await.is_err() {
        return PumpExit::Stop;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return PumpExit::Stop;
            }

            command = outbound.recv() => match command {
                Some(message) => {
                    if send_frame(&mut sink, &message).await.is_err() {
                        return PumpExit::ConnectionLost;
                    }
                }
                // The command side is gone; treat it as a logout.
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::Stop;
                }
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match protocol::parse_server(&text) {
                    Ok(message) => {
                        if events.send(ClientEvent::Frame(message)).await.is_err() {
                            return PumpExit::Stop;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Unparseable server frame");
                    }
                },
                Some(Ok(Message::Close(_))) | None => return PumpExit::ConnectionLost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    return PumpExit::ConnectionLost;
                }
            },
        }
    }
}

async fn send_frame<S>(
    sink: &mut futures::stream::SplitSink<tokio_tungstenite::WebSocketStream<S>, Message>,
    message: &ClientMessage,
) -> Result<(), ()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode client message");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await.map_err(|e| {
        tracing::debug!(error = %e, "WebSocket send failed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        assert_eq!(
            config.next_delay(Duration::from_secs(1)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(
            config.next_delay(Duration::from_secs(8)),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn full_backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        for expected_secs in [1, 2, 4, 8, 16, 30, 30] {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = config.next_delay(delay);
        }
    }
}
