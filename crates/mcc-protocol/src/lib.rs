//! mcc-protocol: Control-channel vocabulary for the mcc relay client
//!
//! This crate defines the JSON commands exchanged with the management
//! server over the control channel, the normalization of node records into
//! [`Device`] snapshots, and construction of the control and tunnel
//! endpoint URLs.

pub mod close;
pub mod command;
pub mod device;
pub mod endpoint;
pub mod error;

pub use close::{AuthFailure, CloseNotice};
pub use command::{ClientCommand, ServerCommand};
pub use device::{parse_nodes, Device, NodeRecord};
pub use endpoint::{auth_header, RelayEndpoint, TunnelParams};
pub use error::ProtocolError;
