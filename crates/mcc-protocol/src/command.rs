//! Control-channel commands
//!
//! Every control message is a JSON object whose `action` field selects the
//! command. Server commands are decoded in two steps: the envelope is read
//! for its `action`, then the action-specific payload is validated. A
//! message that fails either step is a [`ProtocolError`], never a panic.
//!
//! # Message Flow
//!
//! 1. Client connects (credentials in header, or cookie in query)
//! 2. Server sends `serverinfo`; client requests `authcookie`
//! 3. Server answers `authcookie` with `cookie` / `rcookie`
//! 4. Client re-requests `authcookie` periodically
//! 5. Client sends `nodes`; server answers `nodes`
//! 6. Server may send `close` (cause `noauth` on failed login)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::close::CloseNotice;
use crate::device::{parse_nodes, Device};
use crate::error::ProtocolError;

/// Command sent by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    /// Server greeting after login
    ServerInfo,
    /// Fresh authorization cookie and its renewal cookie
    AuthCookie { cookie: String, rcookie: String },
    /// Server asks the client to authenticate over the TLS-hash path
    ServerAuth,
    /// Server is closing the session
    Close(CloseNotice),
    /// Node directory response
    Nodes(Vec<Device>),
}

impl ServerCommand {
    /// Decode one control message
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::MissingAction);
        };

        let action = match object.remove("action") {
            Some(Value::String(action)) => action,
            _ => return Err(ProtocolError::MissingAction),
        };

        match action.as_str() {
            "serverinfo" => Ok(ServerCommand::ServerInfo),
            "authcookie" => Ok(ServerCommand::AuthCookie {
                cookie: take_string(&mut object, "authcookie", "cookie")?,
                rcookie: take_string(&mut object, "authcookie", "rcookie")?,
            }),
            "serverAuth" => Ok(ServerCommand::ServerAuth),
            "close" => {
                let notice = CloseNotice::deserialize(Value::Object(object)).map_err(|e| {
                    ProtocolError::InvalidField {
                        action: "close",
                        field: "cause",
                        reason: e.to_string(),
                    }
                })?;
                Ok(ServerCommand::Close(notice))
            }
            "nodes" => match object.get("nodes") {
                Some(Value::Object(groups)) => Ok(ServerCommand::Nodes(parse_nodes(groups))),
                Some(_) => Err(ProtocolError::InvalidField {
                    action: "nodes",
                    field: "nodes",
                    reason: "expected a mapping of group to node list".to_string(),
                }),
                None => Err(ProtocolError::MissingField {
                    action: "nodes",
                    field: "nodes",
                }),
            },
            _ => Err(ProtocolError::UnknownAction(action)),
        }
    }

    /// Action name, for logging
    pub fn action(&self) -> &'static str {
        match self {
            ServerCommand::ServerInfo => "serverinfo",
            ServerCommand::AuthCookie { .. } => "authcookie",
            ServerCommand::ServerAuth => "serverAuth",
            ServerCommand::Close(_) => "close",
            ServerCommand::Nodes(_) => "nodes",
        }
    }
}

fn take_string(
    object: &mut Map<String, Value>,
    action: &'static str,
    field: &'static str,
) -> Result<String, ProtocolError> {
    match object.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ProtocolError::InvalidField {
            action,
            field,
            reason: format!("expected string, got {}", other),
        }),
        None => Err(ProtocolError::MissingField { action, field }),
    }
}

/// Command sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action")]
pub enum ClientCommand {
    /// Request a fresh authorization cookie
    #[serde(rename = "authcookie")]
    AuthCookie,

    /// Request the node directory
    #[serde(rename = "nodes")]
    Nodes,

    /// Authenticate in response to `serverAuth`
    #[serde(rename = "userAuth")]
    UserAuth {
        /// Login cookie, when logging in by cookie
        #[serde(skip_serializing_if = "Option::is_none")]
        auth: Option<String>,
        /// Base64 username, when logging in by password
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        /// Base64 password, when logging in by password
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        /// One-time token or delivery sentinel
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl ClientCommand {
    /// Encode as a text frame payload
    pub fn encode(&self) -> String {
        // Serializing a derive-only enum with string fields cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
