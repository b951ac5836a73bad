//! Server command dispatch
//!
//! The dispatcher owns no socket. It turns decoded server commands into
//! session updates plus a list of actions for the read loop to carry out.

use std::sync::Arc;

use mcc_core::{AuthCookies, Session};
use mcc_protocol::{ClientCommand, ServerCommand};

use super::ControlEvent;
use crate::directory::Directory;

/// Work the read loop performs after a command is dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write a command to the server
    Send(ClientCommand),
    /// Start the periodic cookie renewal
    ArmRenewal,
    /// Report an event to the channel owner
    Notify(ControlEvent),
}

/// Control-channel state machine
pub struct Dispatcher {
    session: Arc<Session>,
    directory: Directory,
    renewal_armed: bool,
    close_reason: Option<String>,
}

impl Dispatcher {
    pub fn new(session: Arc<Session>, directory: Directory) -> Self {
        Self {
            session,
            directory,
            renewal_armed: false,
            close_reason: None,
        }
    }

    /// Whether the renewal timer has been requested
    pub fn renewal_armed(&self) -> bool {
        self.renewal_armed
    }

    /// Message from the last non-fatal `close`, if any
    pub fn take_close_reason(&mut self) -> Option<String> {
        self.close_reason.take()
    }

    pub async fn dispatch(&mut self, command: ServerCommand) -> Vec<Action> {
        tracing::trace!("Dispatching {}", command.action());

        match command {
            ServerCommand::ServerInfo => vec![Action::Send(ClientCommand::AuthCookie)],

            ServerCommand::AuthCookie { cookie, rcookie } => {
                self.session.set_cookies(AuthCookies { cookie, rcookie });

                if self.renewal_armed {
                    tracing::debug!("Auth cookie renewed");
                    return vec![Action::Notify(ControlEvent::CookieIssued { first: false })];
                }

                tracing::debug!("Auth cookie received");
                self.renewal_armed = true;
                vec![
                    Action::ArmRenewal,
                    Action::Notify(ControlEvent::CookieIssued { first: true }),
                ]
            }

            ServerCommand::ServerAuth => {
                tracing::debug!("Server requested TLS-hash authentication");
                vec![Action::Send(self.session.apply_server_auth().await)]
            }

            ServerCommand::Close(notice) => match notice.auth_failure() {
                Some(failure) => vec![Action::Notify(ControlEvent::AuthFailed(failure))],
                None => {
                    tracing::debug!(
                        "Server disconnected: {}",
                        notice.msg.as_deref().unwrap_or("no reason")
                    );
                    self.close_reason = notice.msg;
                    vec![]
                }
            },

            ServerCommand::Nodes(devices) => {
                tracing::debug!("Received {} nodes", devices.len());
                self.directory.handle_nodes(devices).await;
                vec![]
            }
        }
    }
}
