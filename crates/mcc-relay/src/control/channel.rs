//! Control channel connection and its read/write tasks

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::{CancellationToken, DropGuard};

use mcc_core::config::ClientConfig;
use mcc_core::{ConnectionError, Session};
use mcc_protocol::ServerCommand;

use super::dispatch::{Action, Dispatcher};
use super::renewal::spawn_renewal;
use super::{
    ControlEvent, Outgoing, EVENT_CHANNEL_CAPACITY, NORMAL_CLOSE_REASON,
    OUTGOING_CHANNEL_CAPACITY,
};
use crate::directory::Directory;
use crate::transport::{self, is_normal_close, is_normal_error, WsStream};

/// The single long-lived session to the server
pub struct ControlChannel {
    session: Arc<Session>,
    commands: mpsc::Sender<Outgoing>,
    events: mpsc::Receiver<ControlEvent>,
    directory: Directory,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    /// Stops the read loop and renewal timer when dropped
    shutdown: DropGuard,
}

impl ControlChannel {
    /// Connect, log in and start dispatching server commands
    ///
    /// Login failures reported by the server after the upgrade arrive as
    /// [`ControlEvent::AuthFailed`].
    pub async fn connect(
        session: Arc<Session>,
        config: &ClientConfig,
    ) -> Result<Self, ConnectionError> {
        let login = session.control_login().await;
        let connection =
            transport::connect(&login.url, login.header.as_deref(), config.connect_timeout)
                .await?;
        session.record_tls_hash(connection.tls_hash).await;
        tracing::debug!("Connected to server {}", session.endpoint().host());

        let (sink, stream) = connection.stream.split();
        let (commands, outgoing) = mpsc::channel(OUTGOING_CHANNEL_CAPACITY);
        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let directory = Directory::new(commands.clone(), config.request_timeout);
        let shutdown = CancellationToken::new();

        let writer = tokio::spawn(write_loop(sink, outgoing));
        let reader = tokio::spawn(read_loop(
            stream,
            Dispatcher::new(Arc::clone(&session), directory.clone()),
            directory.clone(),
            commands.clone(),
            event_tx,
            config.cookie_renewal,
            shutdown.clone(),
        ));

        Ok(Self {
            session,
            commands,
            events,
            directory,
            reader,
            writer,
            shutdown: shutdown.drop_guard(),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Node directory bound to this channel
    pub fn directory(&self) -> Directory {
        self.directory.clone()
    }

    /// Next event from the server; `None` once the channel is gone
    pub async fn next_event(&mut self) -> Option<ControlEvent> {
        self.events.recv().await
    }

    /// Send a normal closure and stop the channel
    ///
    /// Waits for the close frame to be written, not for the server's reply,
    /// then ends the read loop, which cancels renewal and fails pending
    /// directory requests. Open tunnel sessions are unaffected.
    pub async fn stop(self) {
        let Self {
            commands,
            events,
            directory,
            reader,
            writer,
            shutdown,
            ..
        } = self;

        if commands.send(Outgoing::Close).await.is_err() {
            tracing::debug!("Control channel already closed");
        }
        drop(commands);
        drop(directory);
        drop(events);

        if let Err(e) = writer.await {
            tracing::warn!("Control writer task failed: {}", e);
        }

        drop(shutdown);
        if let Err(e) = reader.await {
            tracing::warn!("Control reader task failed: {}", e);
        }
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outgoing: mpsc::Receiver<Outgoing>,
) {
    while let Some(frame) = outgoing.recv().await {
        let message = match frame {
            Outgoing::Command(command) => Message::Text(command.encode()),
            Outgoing::Close => {
                let close = CloseFrame {
                    code: CloseCode::Normal,
                    reason: NORMAL_CLOSE_REASON.into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(close))).await {
                    tracing::debug!("Failed to send close frame: {}", e);
                }
                break;
            }
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!("Control channel write failed: {}", e);
            break;
        }
    }

    tracing::trace!("Control writer stopped");
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    mut dispatcher: Dispatcher,
    directory: Directory,
    commands: mpsc::Sender<Outgoing>,
    events: mpsc::Sender<ControlEvent>,
    renewal_period: Duration,
    shutdown: CancellationToken,
) {
    let renewal = shutdown.child_token();

    let reason = loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break None,
            next = stream.next() => next,
        };

        let text = match next {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                if is_normal_close(frame.as_ref()) {
                    tracing::debug!("Server closed connection");
                } else {
                    tracing::warn!("Server closed connection: {:?}", frame);
                }
                break frame.map(|f| f.reason.into_owned()).filter(|r| !r.is_empty());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                if is_normal_error(&e) {
                    tracing::debug!("Server closed connection");
                } else {
                    tracing::error!("Server connection error: {}", e);
                }
                break Some(e.to_string());
            }
            None => break None,
        };

        let command = match ServerCommand::decode(&text) {
            Ok(command) => command,
            Err(e) if e.is_ignorable() => {
                tracing::trace!("{}", e);
                continue;
            }
            Err(e) => {
                tracing::warn!("Error parsing command: {}", e);
                continue;
            }
        };

        for action in dispatcher.dispatch(command).await {
            match action {
                Action::Send(command) => {
                    if commands.send(Outgoing::Command(command)).await.is_err() {
                        tracing::debug!("Control writer gone");
                    }
                }
                Action::ArmRenewal => {
                    spawn_renewal(renewal_period, commands.clone(), renewal.clone());
                }
                Action::Notify(event @ ControlEvent::CookieIssued { .. }) => {
                    // Cookie notices are dropped when nobody is listening
                    let _ = events.try_send(event);
                }
                Action::Notify(event) => {
                    let _ = events.send(event).await;
                }
            }
        }
    };

    renewal.cancel();
    directory.close().await;

    let reason = dispatcher.take_close_reason().or(reason);
    let _ = events.send(ControlEvent::Disconnected { reason }).await;
}
