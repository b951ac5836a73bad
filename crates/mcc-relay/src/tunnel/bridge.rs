//! Bidirectional byte pump between a local stream and a tunnel session
//!
//! Two pump tasks share one completion token. Whichever direction ends
//! first cancels it; the other stops at its next await point. The bridge
//! joins both before returning, so each side is closed exactly once.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::transport::{is_normal_close, is_normal_error, WsStream};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Bytes moved in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Tunnel to local
    pub received: u64,
    /// Local to tunnel
    pub sent: u64,
}

/// Relay bytes between `reader`/`writer` and `ws` until either side ends
pub async fn bridge<S, R, W>(ws: WebSocketStream<S>, reader: R, writer: W, id: &str) -> BridgeStats
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    let done = CancellationToken::new();

    let downstream = tokio::spawn(tunnel_to_local(
        stream,
        writer,
        done.clone(),
        id.to_string(),
    ));
    let upstream = tokio::spawn(local_to_tunnel(reader, sink, done.clone(), id.to_string()));

    let (received, sent) = tokio::join!(downstream, upstream);
    let stats = BridgeStats {
        received: received.unwrap_or_else(|e| {
            tracing::warn!("[{}] tunnel reader task failed: {}", id, e);
            0
        }),
        sent: sent.unwrap_or_else(|e| {
            tracing::warn!("[{}] tunnel writer task failed: {}", id, e);
            0
        }),
    };

    tracing::debug!(
        "[{}] Tunnel closed ({} bytes in, {} bytes out)",
        id,
        stats.received,
        stats.sent
    );
    stats
}

/// Pipe a tunnel session to this process's stdin/stdout
pub async fn proxy_stdio(ws: WsStream) -> BridgeStats {
    bridge(ws, tokio::io::stdin(), tokio::io::stdout(), "stdio").await
}

async fn tunnel_to_local<S, W>(
    mut stream: SplitStream<WebSocketStream<S>>,
    mut writer: W,
    done: CancellationToken,
    id: String,
) -> u64
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;

    loop {
        let message = tokio::select! {
            _ = done.cancelled() => break,
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Binary(data))) => {
                if data.is_empty() {
                    continue;
                }
                if let Err(e) = write_chunk(&mut writer, &data).await {
                    tracing::error!("[{}] TCP write error: {}", id, e);
                    break;
                }
                total += data.len() as u64;
            }
            Some(Ok(Message::Close(frame))) => {
                if is_normal_close(frame.as_ref()) {
                    tracing::debug!("[{}] WebSocket closed normally", id);
                } else {
                    tracing::error!("[{}] WebSocket closed: {:?}", id, frame);
                }
                break;
            }
            // Text, ping and pong frames carry no tunnel payload
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                if is_normal_error(&e) {
                    tracing::debug!("[{}] WebSocket closed normally", id);
                } else {
                    tracing::error!("[{}] WebSocket read error: {}", id, e);
                }
                break;
            }
            None => {
                tracing::debug!("[{}] WebSocket stream ended", id);
                break;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!("[{}] TCP shutdown: {}", id, e);
    }
    done.cancel();
    total
}

async fn local_to_tunnel<S, R>(
    mut reader: R,
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    done: CancellationToken,
    id: String,
) -> u64
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let mut total = 0u64;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            _ = done.cancelled() => break,
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                tracing::debug!("[{}] TCP connection closed by client", id);
                break;
            }
            Ok(n) => {
                if let Err(e) = sink.send(Message::Binary(buf[..n].to_vec())).await {
                    tracing::error!("[{}] WebSocket write error: {}", id, e);
                    break;
                }
                total += n as u64;
            }
            Err(e) => {
                tracing::error!("[{}] TCP read error: {}", id, e);
                break;
            }
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!("[{}] WebSocket close: {}", id, e);
    }
    done.cancel();
    total
}

async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> std::io::Result<()> {
    writer.write_all(data).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};

    type Peer = WebSocketStream<tokio::io::DuplexStream>;

    /// A connected client/server WebSocket pair over memory
    async fn ws_pair() -> (Peer, Peer) {
        let (a, b) = duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
        (client, server)
    }

    #[tokio::test]
    async fn test_bytes_flow_both_ways() {
        let (client, mut remote) = ws_pair().await;
        let (local, app) = duplex(64 * 1024);
        let (local_read, local_write) = tokio::io::split(local);
        let (mut app_read, mut app_write) = tokio::io::split(app);

        let handle = tokio::spawn(bridge(client, local_read, local_write, "t1"));

        app_write.write_all(b"ping").await.unwrap();
        match remote.next().await.unwrap().unwrap() {
            Message::Binary(data) => assert_eq!(data, b"ping"),
            other => panic!("unexpected frame {:?}", other),
        }

        remote.send(Message::Text("ignored".into())).await.unwrap();
        remote.send(Message::Binary(vec![])).await.unwrap();
        remote.send(Message::Binary(b"pong".to_vec())).await.unwrap();
        let mut buf = [0u8; 4];
        app_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        remote
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })))
            .await
            .unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, BridgeStats { received: 4, sent: 4 });

        // Local side sees EOF
        let mut rest = Vec::new();
        app_read.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_local_close_ends_tunnel() {
        let (client, mut remote) = ws_pair().await;
        let (local, app) = duplex(1024);
        let (local_read, local_write) = tokio::io::split(local);

        let handle = tokio::spawn(bridge(client, local_read, local_write, "t2"));
        drop(app);

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, BridgeStats::default());

        // Remote sees a close frame, then the end of the stream
        match remote.next().await {
            Some(Ok(Message::Close(_))) | None => {}
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_drop_ends_bridge() {
        let (client, remote) = ws_pair().await;
        let (local, _app) = duplex(1024);
        let (local_read, local_write) = tokio::io::split(local);

        let handle = tokio::spawn(bridge(client, local_read, local_write, "t3"));
        drop(remote);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
