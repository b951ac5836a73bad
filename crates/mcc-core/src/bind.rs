//! Port-forward bind addresses
//!
//! Format: `[localport[:target]:]remoteport`. `target` is an address as
//! seen from the remote node; omitted (or loopback) means the node itself.
//! A missing local port means "let the OS pick one".

use std::fmt;
use std::str::FromStr;

use crate::error::BindAddressError;

/// Loopback target, treated the same as no target at all
const LOOPBACK: &str = "127.0.0.1";

/// Parsed bind address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindAddress {
    /// Local port to listen on (0 = OS-assigned)
    pub local_port: u16,
    /// Address reachable from the node, `None` for the node itself
    pub target: Option<String>,
    /// Port on the remote side
    pub remote_port: u16,
}

impl BindAddress {
    /// Parse `[localport[:target]:]remoteport`
    pub fn parse(s: &str) -> Result<Self, BindAddressError> {
        let parts: Vec<&str> = s.trim().split(':').collect();

        let (local, target, remote) = match parts.as_slice() {
            [remote] => (None, None, *remote),
            [local, remote] => (Some(*local), None, *remote),
            [local, target, remote] => (Some(*local), Some(*target), *remote),
            _ => return Err(BindAddressError::Format(s.to_string())),
        };

        let local_port = match local {
            Some(local) => parse_port(local)?,
            None => 0,
        };
        let remote_port = parse_port(remote)?;

        let target = match target {
            Some(t) if !is_host(t) => return Err(BindAddressError::Format(s.to_string())),
            Some(LOOPBACK) | None => None,
            Some(t) => Some(t.to_string()),
        };

        Ok(Self {
            local_port,
            target,
            remote_port,
        })
    }
}

impl FromStr for BindAddress {
    type Err = BindAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}:{}:{}", self.local_port, target, self.remote_port),
            None => write!(f, "{}:{}", self.local_port, self.remote_port),
        }
    }
}

fn parse_port(s: &str) -> Result<u16, BindAddressError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BindAddressError::Port(s.to_string()));
    }
    s.parse().map_err(|_| BindAddressError::Port(s.to_string()))
}

fn is_host(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
