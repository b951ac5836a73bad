//! Control channel to the management server

mod channel;
mod dispatch;
mod renewal;

pub use channel::ControlChannel;
pub use dispatch::{Action, Dispatcher};
pub use renewal::spawn_renewal;

use mcc_protocol::{AuthFailure, ClientCommand};

/// Channel capacity for outgoing control frames
const OUTGOING_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events delivered to the caller
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Close reason sent with the normal-closure frame
const NORMAL_CLOSE_REASON: &str = "all done";

/// Frames queued for the control channel writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A JSON command
    Command(ClientCommand),
    /// Normal closure, then stop writing
    Close,
}

/// Events surfaced to the owner of the control channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// A tunnel cookie was issued; `first` is set on the initial issue
    CookieIssued { first: bool },
    /// Server rejected the login
    AuthFailed(AuthFailure),
    /// Channel ended
    Disconnected { reason: Option<String> },
}
