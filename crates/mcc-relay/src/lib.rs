//! mcc-relay: Relay client for mcc
//!
//! Maintains the control channel to the management server, answers node
//! directory queries over it, and bridges local TCP connections (or this
//! process's stdio) to per-connection tunnel sessions on remote nodes.

pub mod control;
pub mod directory;
pub mod transport;
pub mod tunnel;

pub use control::{ControlChannel, ControlEvent};
pub use directory::{Directory, QueryState};
pub use tunnel::{open_tunnel, proxy_stdio, start_router, Router, TunnelTarget};
