//! Core error types for mcc

use mcc_protocol::{AuthFailure, ProtocolError};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the mcc crates
#[derive(Error, Debug)]
pub enum McError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bind address error
    #[error("Bind address error: {0}")]
    BindAddress(#[from] BindAddressError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Server refused the login
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(AuthFailure),

    /// Could not open the transport session
    #[error("Unable to connect to server: {0}")]
    ConnectFailed(String),

    /// Transport session ended
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Server did not answer in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Local listener could not be bound
    #[error("Unable to bind to local TCP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Named profile does not exist
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Profile name already taken
    #[error("Profile already exists: {0}")]
    ProfileExists(String),
}

/// Bind address parse errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BindAddressError {
    /// Input did not match `[localport[:target]:]remoteport`
    #[error("invalid bind address format: {0:?}")]
    Format(String),

    /// A port component was not a valid port number
    #[error("invalid port {0:?}")]
    Port(String),
}
