//! Endpoint URLs and login material
//!
//! The server exposes two WebSocket endpoints under the same host:
//! `meshrelay.ashx` carries tunnel sessions and `control.ashx` carries the
//! control channel. The control endpoint is derived from the relay one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::Url;

use crate::error::ProtocolError;

const RELAY_PATH: &str = "meshrelay.ashx";
const CONTROL_PATH: &str = "control.ashx";

/// Relay base URL for one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoint {
    url: Url,
}

/// Target of one tunnel session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelParams<'a> {
    /// Authorization cookie from the control channel
    pub cookie: &'a str,
    /// Remote node id
    pub node_id: &'a str,
    /// TCP port on the remote side
    pub port: u16,
    /// Address reachable from the node; `None` means the node itself
    pub target: Option<&'a str>,
}

impl RelayEndpoint {
    /// Build from a configured server address
    ///
    /// A bare host (`mesh.example.com`, `mesh.example.com:4430`) becomes
    /// `wss://<host>/meshrelay.ashx`. A full `ws://` or `wss://` URL is kept,
    /// with the relay path filled in when it has none.
    pub fn from_server(server: &str) -> Result<Self, ProtocolError> {
        let server = server.trim().trim_end_matches('/');
        if server.is_empty() {
            return Err(ProtocolError::InvalidUrl("server address is empty".to_string()));
        }

        let raw = if server.starts_with("wss://") || server.starts_with("ws://") {
            server.to_string()
        } else {
            format!("wss://{}", server)
        };

        let mut url = Url::parse(&raw).map_err(|e| ProtocolError::InvalidUrl(e.to_string()))?;
        if url.host_str().is_none() {
            return Err(ProtocolError::InvalidUrl(format!("{} has no host", raw)));
        }
        if !url.path().ends_with(".ashx") {
            let path = format!("{}/{}", url.path().trim_end_matches('/'), RELAY_PATH);
            url.set_path(&path);
        }
        url.set_query(None);

        Ok(Self { url })
    }

    /// The relay base URL
    pub fn relay_url(&self) -> &Url {
        &self.url
    }

    /// Control endpoint without login parameters
    pub fn control_url(&self) -> Url {
        let mut url = self.url.clone();
        let path = url.path().replacen(RELAY_PATH, CONTROL_PATH, 1);
        url.set_path(&path);
        url
    }

    /// Control endpoint carrying a login cookie (and token) in the query
    pub fn control_url_with_cookie(&self, cookie: &str, token: Option<&str>) -> Url {
        let mut url = self.control_url();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("auth", cookie);
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        url
    }

    /// Tunnel endpoint for one remote node and port
    pub fn tunnel_url(&self, params: &TunnelParams<'_>) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("auth", params.cookie)
                .append_pair("nodeid", params.node_id)
                .append_pair("tcpport", &params.port.to_string());
            if let Some(target) = params.target {
                query.append_pair("tcpaddr", target);
            }
        }
        url
    }

    /// Host name, used to describe the server in messages
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

/// Base64 a credential field the way the server expects
pub fn encode_field(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Value of the `x-meshauth` header for a password login
///
/// `base64(username),base64(password)[,base64(token)]`
pub fn auth_header(username: &str, password: &str, token: Option<&str>) -> String {
    let mut header = format!("{},{}", encode_field(username), encode_field(password));
    if let Some(token) = token {
        header.push(',');
        header.push_str(&encode_field(token));
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_becomes_wss_relay() {
        let endpoint = RelayEndpoint::from_server("mesh.example.com").unwrap();
        assert_eq!(
            endpoint.relay_url().as_str(),
            "wss://mesh.example.com/meshrelay.ashx"
        );
        assert_eq!(endpoint.host(), "mesh.example.com");
    }

    #[test]
    fn test_explicit_url_kept() {
        let endpoint = RelayEndpoint::from_server("ws://127.0.0.1:8080/").unwrap();
        assert_eq!(
            endpoint.relay_url().as_str(),
            "ws://127.0.0.1:8080/meshrelay.ashx"
        );

        let endpoint =
            RelayEndpoint::from_server("wss://mesh.example.com:4430/meshrelay.ashx").unwrap();
        assert_eq!(
            endpoint.control_url().as_str(),
            "wss://mesh.example.com:4430/control.ashx"
        );
    }

    #[test]
    fn test_empty_server_rejected() {
        assert!(RelayEndpoint::from_server("  ").is_err());
    }

    #[test]
    fn test_control_url_with_cookie() {
        let endpoint = RelayEndpoint::from_server("mesh.example.com").unwrap();

        let url = endpoint.control_url_with_cookie("abc", None);
        assert_eq!(url.as_str(), "wss://mesh.example.com/control.ashx?auth=abc");

        let url = endpoint.control_url_with_cookie("abc", Some("**email**"));
        assert_eq!(
            url.as_str(),
            "wss://mesh.example.com/control.ashx?auth=abc&token=**email**"
        );
    }

    #[test]
    fn test_tunnel_url() {
        let endpoint = RelayEndpoint::from_server("mesh.example.com").unwrap();

        let url = endpoint.tunnel_url(&TunnelParams {
            cookie: "c1",
            node_id: "node1",
            port: 22,
            target: None,
        });
        assert_eq!(
            url.as_str(),
            "wss://mesh.example.com/meshrelay.ashx?auth=c1&nodeid=node1&tcpport=22"
        );

        let url = endpoint.tunnel_url(&TunnelParams {
            cookie: "c1",
            node_id: "node1",
            port: 80,
            target: Some("10.0.0.5"),
        });
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("tcpaddr".to_string(), "10.0.0.5".to_string())));
    }

    #[test]
    fn test_auth_header() {
        assert_eq!(auth_header("admin", "secret", None), "YWRtaW4=,c2VjcmV0");
        assert_eq!(
            auth_header("admin", "secret", Some("123456")),
            "YWRtaW4=,c2VjcmV0,MTIzNDU2"
        );
    }
}
