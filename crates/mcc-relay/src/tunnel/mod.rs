//! Tunnel engine
//!
//! Every local connection gets its own freshly authenticated tunnel session
//! to the remote node. Tunnel sessions never share a transport with the
//! control channel or with each other.

mod bridge;
mod router;

pub use bridge::{bridge, proxy_stdio, BridgeStats};
pub use router::{start_router, Router};

use std::time::Duration;

use mcc_core::{BindAddress, ConnectionError, Session};
use mcc_protocol::TunnelParams;

use crate::transport::{self, WsStream};

/// Remote end of a tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelTarget {
    /// Remote node id
    pub node_id: String,
    /// TCP port on the remote side
    pub port: u16,
    /// Address reachable from the node; `None` for the node itself
    pub target: Option<String>,
}

impl TunnelTarget {
    pub fn new(node_id: impl Into<String>, port: u16) -> Self {
        Self {
            node_id: node_id.into(),
            port,
            target: None,
        }
    }

    /// Remote side of a parsed bind address
    pub fn from_bind(node_id: impl Into<String>, bind: &BindAddress) -> Self {
        Self {
            node_id: node_id.into(),
            port: bind.remote_port,
            target: bind.target.clone(),
        }
    }
}

/// Open one tunnel session to `target`
///
/// Waits for the control channel's first auth cookie, then dials the relay
/// endpoint with the cookie and target in the query string.
pub async fn open_tunnel(
    session: &Session,
    target: &TunnelTarget,
    connect_timeout: Duration,
) -> Result<WsStream, ConnectionError> {
    let cookie = tokio::time::timeout(connect_timeout, session.wait_for_cookie())
        .await
        .map_err(|_| ConnectionError::Timeout("waiting for auth cookie".to_string()))??;

    let url = session.endpoint().tunnel_url(&TunnelParams {
        cookie: &cookie,
        node_id: &target.node_id,
        port: target.port,
        target: target.target.as_deref(),
    });

    let connection = transport::connect(&url, None, connect_timeout).await?;
    Ok(connection.stream)
}
