use super::session::{run_session, SessionConfig};
use super::Hub;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::accept_async;
use tracing::{error, info, warn};

/// Accepts subscriber WebSocket connections and hands them to the hub
pub struct SubscriberServer {
    hub: Hub,
    session: SessionConfig,
    shutdown_grace: Duration,
}

impl SubscriberServer {
    /// Bind the subscriber listener
    pub async fn bind(addr: SocketAddr) -> crate::Result<TcpListener> {
        Ok(TcpListener::bind(addr).await?)
    }

    pub fn new(hub: Hub, session: SessionConfig, shutdown_grace: Duration) -> Self {
        Self {
            hub,
            session,
            shutdown_grace,
        }
    }

    /// Accept until shutdown, then close every subscriber queue and give
    /// in-flight writes `shutdown_grace` to finish before aborting the rest
    pub async fn run(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = listener.local_addr() {
            info!("Subscriber server listening on ws://{}", addr);
        }

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "New subscriber connection");
                        sessions.spawn(handle_connection(stream, peer, self.hub.clone(), self.session));
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                _ = shutdown.changed() => break,
            }
        }

        let closed = self.hub.close_all();
        info!(
            subscribers = closed,
            "Subscriber server shutting down, draining for up to {:?}", self.shutdown_grace
        );

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(remaining = sessions.len(), "Grace period elapsed, forcing connections closed");
            sessions.abort_all();
            while sessions.join_next().await.is_some() {}
        }

        info!("Subscriber server stopped");
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, hub: Hub, session: SessionConfig) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!(%peer, "WebSocket handshake failed: {}", e);
            return;
        }
    };

    run_session(ws_stream, peer, hub, session).await;
}
