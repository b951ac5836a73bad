//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding control-channel messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Message was not valid JSON
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Message had no `action` discriminator
    #[error("Missing action field")]
    MissingAction,

    /// Action is not one this client understands
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A required field was absent
    #[error("Missing field `{field}` in {action} command")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    /// A field was present but had the wrong shape
    #[error("Invalid field `{field}` in {action} command: {reason}")]
    InvalidField {
        action: &'static str,
        field: &'static str,
        reason: String,
    },

    /// Server URL could not be turned into an endpoint
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl ProtocolError {
    /// Whether the error only means "ignore this message"
    ///
    /// Unknown actions are expected as the server grows new commands.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, ProtocolError::UnknownAction(_))
    }
}
