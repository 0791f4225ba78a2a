use super::{Hub, Payload, SubscriberId, Subscription};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// Timing knobs for one subscriber connection
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Ping interval on the outbound side
    pub keepalive: Duration,
    /// How long the writer may keep flushing after the peer side ended
    pub drain_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(60),
            drain_grace: Duration::from_secs(5),
        }
    }
}

/// Drive one subscriber from registration to teardown
///
/// Runs an outbound writer (queue -> socket, plus keepalive pings) and an
/// inbound watcher whose only job is noticing that the peer went away.
/// Both halves live inside this future, so dropping or aborting it closes
/// the socket. Whichever half finishes first ends the session; the
/// subscriber is always unregistered on the way out.
pub async fn run_session<S>(
    ws_stream: WebSocketStream<S>,
    peer: SocketAddr,
    hub: Hub,
    config: SessionConfig,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Subscription { id, queue } = hub.register();
    let (sink, stream) = ws_stream.split();

    let send = write_outbound(sink, queue, config.keepalive, id);
    let recv = watch_inbound(stream, id);
    tokio::pin!(send);
    tokio::pin!(recv);

    tokio::select! {
        _ = &mut send => {
            debug!(subscriber = %id, %peer, "Outbound side finished");
        }
        _ = &mut recv => {
            debug!(subscriber = %id, %peer, "Peer side finished");
            hub.unregister(id);
            if tokio::time::timeout(config.drain_grace, &mut send).await.is_err() {
                debug!(subscriber = %id, "Drain grace elapsed, dropping connection");
            }
        }
    }

    hub.unregister(id);
    info!(subscriber = %id, %peer, "Subscriber connection closed");
}

async fn write_outbound<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut queue: mpsc::Receiver<Payload>,
    keepalive: Duration,
    id: SubscriberId,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);

    loop {
        tokio::select! {
            next = queue.recv() => match next {
                Some(payload) => {
                    if let Err(e) = sink.send(Message::text(payload.to_string())).await {
                        warn!(subscriber = %id, "WebSocket write error: {}", e);
                        break;
                    }
                }
                None => {
                    // queue closed by the hub
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    debug!(subscriber = %id, "Keepalive ping failed");
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

/// Inbound payloads are ignored; this only detects closure or errors
async fn watch_inbound<S>(mut stream: SplitStream<WebSocketStream<S>>, id: SubscriberId)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(subscriber = %id, "WebSocket read error: {}", e);
                break;
            }
        }
    }
}
