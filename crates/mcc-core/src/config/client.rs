//! Client tuning

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Timeouts and intervals for the relay client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Time allowed to open a control or tunnel session
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Time allowed for a node directory answer
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// TCP keep-alive period on accepted local sockets
    #[serde(with = "duration_secs")]
    pub keepalive: Duration,

    /// How often the auth cookie is refreshed
    #[serde(with = "duration_secs")]
    pub cookie_renewal: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            keepalive: Duration::from_secs(30),
            cookie_renewal: Duration::from_secs(10 * 60),
        }
    }
}
