//! In-process stand-in for the management server
//!
//! Serves `control.ashx` with a scripted control session and
//! `meshrelay.ashx` with a configurable tunnel peer, over plain `ws://`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use mcc_core::{Credentials, Session};
use mcc_protocol::RelayEndpoint;

/// How the control endpoint behaves
#[derive(Clone)]
pub enum ControlScript {
    /// serverinfo, cookie on request, answer every `nodes` with `nodes`
    Normal { nodes: Value },
    /// Send this `close` command right away, then hang up
    Reject { close: Value },
    /// serverinfo, one cookie, then hang up
    HangUpAfterCookie,
}

/// How the tunnel endpoint behaves
#[derive(Clone, Copy)]
pub enum TunnelMode {
    /// Echo every binary frame back
    Echo,
    /// Accept, then close normally
    CloseNormally,
    /// Refuse the upgrade
    Reject,
}

/// Upgrade request as seen by the server
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub query: Option<String>,
    pub auth: Option<String>,
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub requests: mpsc::UnboundedReceiver<SeenRequest>,
    /// Close frames received on the control endpoint
    pub closes: mpsc::UnboundedReceiver<(u16, String)>,
}

impl MockServer {
    pub async fn start(control: ControlScript, tunnel: TunnelMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, requests) = mpsc::unbounded_channel();
        let (close_tx, closes) = mpsc::unbounded_channel();
        let control = Arc::new(control);

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => break,
                };
                let control = Arc::clone(&control);
                let request_tx = request_tx.clone();
                let close_tx = close_tx.clone();
                tokio::spawn(async move {
                    serve(stream, &control, tunnel, request_tx, close_tx).await;
                });
            }
        });

        Self {
            addr,
            requests,
            closes,
        }
    }

    /// Session pointed at this server
    pub fn session(&self) -> Arc<Session> {
        let endpoint = RelayEndpoint::from_server(&format!("ws://{}", self.addr)).unwrap();
        Arc::new(Session::new(
            endpoint,
            Credentials::password("admin", "secret"),
        ))
    }

    /// Next upgrade request for `path`, skipping others
    pub async fn next_request(&mut self, path: &str) -> SeenRequest {
        loop {
            let request = self.requests.recv().await.unwrap();
            if request.path == path {
                return request;
            }
        }
    }
}

async fn serve(
    stream: TcpStream,
    control: &ControlScript,
    tunnel: TunnelMode,
    requests: mpsc::UnboundedSender<SeenRequest>,
    closes: mpsc::UnboundedSender<(u16, String)>,
) {
    let mut seen = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let request = SeenRequest {
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
            auth: req
                .headers()
                .get("x-meshauth")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        let reject = request.path.ends_with("meshrelay.ashx") && matches!(tunnel, TunnelMode::Reject);
        seen = Some(request);

        if reject {
            let mut denied = ErrorResponse::new(Some("denied".to_string()));
            *denied.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(denied);
        }
        Ok(resp)
    };

    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await;
    let request = match seen {
        Some(request) => request,
        None => return,
    };
    let _ = requests.send(request.clone());
    let Ok(ws) = ws else { return };

    if request.path.ends_with("control.ashx") {
        run_control(ws, control, closes).await;
    } else {
        run_tunnel(ws, tunnel).await;
    }
}

async fn run_control(
    mut ws: tokio_tungstenite::WebSocketStream<TcpStream>,
    script: &ControlScript,
    closes: mpsc::UnboundedSender<(u16, String)>,
) {
    let nodes = match script {
        ControlScript::Reject { close } => {
            let _ = ws.send(Message::Text(close.to_string())).await;
            let _ = ws.close(None).await;
            return;
        }
        ControlScript::Normal { nodes } => nodes.clone(),
        ControlScript::HangUpAfterCookie => Value::Null,
    };
    let hang_up = matches!(script, ControlScript::HangUpAfterCookie);

    let serverinfo = json!({"action": "serverinfo", "serverinfo": {"name": "mock"}});
    if ws.send(Message::Text(serverinfo.to_string())).await.is_err() {
        return;
    }

    let mut issued = 0;
    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => {
                let command: Value = serde_json::from_str(&text).unwrap();
                let reply = match command["action"].as_str() {
                    Some("authcookie") => {
                        issued += 1;
                        json!({
                            "action": "authcookie",
                            "cookie": format!("c{}", issued),
                            "rcookie": format!("r{}", issued),
                        })
                    }
                    Some("nodes") => json!({"action": "nodes", "nodes": nodes}),
                    _ => continue,
                };
                if ws.send(Message::Text(reply.to_string())).await.is_err() {
                    return;
                }
                if hang_up {
                    let _ = ws.close(None).await;
                    while let Some(Ok(_)) = ws.next().await {}
                    return;
                }
            }
            Message::Close(frame) => {
                if let Some(frame) = frame {
                    let _ = closes.send((u16::from(frame.code), frame.reason.into_owned()));
                }
                break;
            }
            _ => {}
        }
    }
}

async fn run_tunnel(mut ws: tokio_tungstenite::WebSocketStream<TcpStream>, mode: TunnelMode) {
    match mode {
        TunnelMode::Echo => {
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Binary(data) => {
                        if ws.send(Message::Binary(data)).await.is_err() {
                            return;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
        TunnelMode::CloseNormally => {
            let _ = ws
                .close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                }))
                .await;
            while let Some(Ok(_)) = ws.next().await {}
        }
        TunnelMode::Reject => {}
    }
}

/// Two groups holding three and one nodes
pub fn two_groups() -> Value {
    json!({
        "mesh//group1": [
            {"_id": "node//a", "rname": "alpha", "osdesc": "Linux", "ip": "10.0.0.1", "icon": 1, "conn": 1, "pwr": 1},
            {"_id": "node//b", "rname": "bravo", "icon": 2},
            {"_id": "node//c", "name": "charlie", "icon": 1, "conn": 1}
        ],
        "mesh//group2": [
            {"_id": "node//d", "rname": "delta", "icon": 3}
        ]
    })
}
