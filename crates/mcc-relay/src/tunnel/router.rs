//! Local TCP listener feeding tunnel sessions

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use mcc_core::config::ClientConfig;
use mcc_core::{ConnectionError, Session};

use super::bridge::bridge;
use super::{open_tunnel, TunnelTarget};

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A bound port forward
pub struct Router {
    listener: TcpListener,
    local_port: u16,
    session: Arc<Session>,
    target: Arc<TunnelTarget>,
    config: ClientConfig,
}

impl Router {
    /// Bind the local listener; port 0 lets the OS pick one
    pub async fn bind(
        session: Arc<Session>,
        target: TunnelTarget,
        local_port: u16,
        config: ClientConfig,
    ) -> Result<Self, ConnectionError> {
        let listener = TcpListener::bind(("127.0.0.1", local_port))
            .await
            .map_err(|source| ConnectionError::Bind {
                port: local_port,
                source,
            })?;
        let local_port = listener
            .local_addr()
            .map_err(|source| ConnectionError::Bind {
                port: local_port,
                source,
            })?
            .port();

        tracing::debug!(
            "Listening on 127.0.0.1:{} for {}:{}",
            local_port,
            target.node_id,
            target.port
        );

        Ok(Self {
            listener,
            local_port,
            session,
            target: Arc::new(target),
            config,
        })
    }

    /// The bound local port
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn target(&self) -> &TunnelTarget {
        &self.target
    }

    /// Accept connections until the task is dropped
    ///
    /// Accept errors are logged and retried after [`ACCEPT_BACKOFF`].
    pub async fn serve(self) {
        loop {
            let Some((socket, peer)) = accepted(self.listener.accept().await).await else {
                continue;
            };
            let session = Arc::clone(&self.session);
            let target = Arc::clone(&self.target);
            let config = self.config.clone();
            tokio::spawn(async move {
                handle_connection(socket, peer, session, target, config).await;
            });
        }
    }
}

async fn accepted<T>(result: io::Result<T>) -> Option<T> {
    match result {
        Ok(connection) => Some(connection),
        Err(e) => {
            tracing::error!("Error accepting connection: {}", e);
            tokio::time::sleep(ACCEPT_BACKOFF).await;
            None
        }
    }
}

/// Bind, signal `ready` with the bound port, then serve forever
///
/// Returns only if the bind fails; `ready` is dropped unsent in that case.
pub async fn start_router(
    session: Arc<Session>,
    target: TunnelTarget,
    local_port: u16,
    config: ClientConfig,
    ready: oneshot::Sender<u16>,
) -> Result<(), ConnectionError> {
    let router = Router::bind(session, target, local_port, config).await?;
    if ready.send(router.local_port()).is_err() {
        tracing::debug!("Router ready signal not observed");
    }
    router.serve().await;
    Ok(())
}

async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    session: Arc<Session>,
    target: Arc<TunnelTarget>,
    config: ClientConfig,
) {
    let id = connection_id();
    tracing::debug!("[{}] Client connected from {}", id, peer);

    let keepalive = TcpKeepalive::new().with_time(config.keepalive);
    if let Err(e) = SockRef::from(&socket).set_tcp_keepalive(&keepalive) {
        tracing::warn!("[{}] Failed to enable TCP keep-alive: {}", id, e);
    }

    let ws = match open_tunnel(&session, &target, config.connect_timeout).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("[{}] Unable to connect to server: {}", id, e);
            return;
        }
    };
    tracing::debug!("[{}] WebSocket connected", id);

    let (reader, writer) = socket.into_split();
    bridge(ws, reader, writer, &id).await;
}

/// Short id for correlating one connection's log lines
fn connection_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcc_core::Credentials;
    use mcc_protocol::RelayEndpoint;

    fn session() -> Arc<Session> {
        let endpoint = RelayEndpoint::from_server("ws://127.0.0.1:9").unwrap();
        Arc::new(Session::new(endpoint, Credentials::default()))
    }

    #[tokio::test]
    async fn test_port_zero_gets_os_port() {
        let router = Router::bind(
            session(),
            TunnelTarget::new("node//x", 22),
            0,
            ClientConfig::default(),
        )
        .await
        .unwrap();
        assert_ne!(router.local_port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = Router::bind(
            session(),
            TunnelTarget::new("node//x", 22),
            port,
            ClientConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(ConnectionError::Bind { port: p, .. }) if p == port));
    }

    #[tokio::test]
    async fn test_start_signals_ready_once() {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(start_router(
            session(),
            TunnelTarget::new("node//x", 22),
            0,
            ClientConfig::default(),
            tx,
        ));

        let port = rx.await.unwrap();
        assert_ne!(port, 0);
        TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_error_backs_off() {
        let start = tokio::time::Instant::now();
        let failed = accepted::<()>(Err(io::Error::from_raw_os_error(24))).await;
        assert!(failed.is_none());
        assert!(start.elapsed() >= ACCEPT_BACKOFF);

        let start = tokio::time::Instant::now();
        assert_eq!(accepted(Ok(7)).await, Some(7));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_connection_id_is_short() {
        assert_eq!(connection_id().len(), 8);
    }
}
