//! Node directory over the control channel
//!
//! `nodes` responses are pushed by the server in request order. Each request
//! registers a oneshot in a FIFO; a response completes the oldest request
//! and refreshes the cached list. Responses nobody asked for only refresh
//! the cache.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use mcc_core::ConnectionError;
use mcc_protocol::{ClientCommand, Device};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::control::Outgoing;

/// Whether a directory request is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Pending,
}

#[derive(Default)]
struct DirectoryState {
    pending: VecDeque<oneshot::Sender<Vec<Device>>>,
    devices: Vec<Device>,
    closed: bool,
}

/// Request/response facade for the node list
#[derive(Clone)]
pub struct Directory {
    state: Arc<Mutex<DirectoryState>>,
    commands: mpsc::Sender<Outgoing>,
    request_timeout: Duration,
}

impl Directory {
    pub fn new(commands: mpsc::Sender<Outgoing>, request_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(DirectoryState::default())),
            commands,
            request_timeout,
        }
    }

    /// Fetch the current node list from the server
    ///
    /// Safe to call concurrently; every caller receives one complete response.
    pub async fn get_devices(&self) -> Result<Vec<Device>, ConnectionError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ConnectionError::ConnectionLost(
                    "control channel closed".to_string(),
                ));
            }
            state.pending.push_back(tx);
        }

        self.commands
            .send(Outgoing::Command(ClientCommand::Nodes))
            .await
            .map_err(|_| ConnectionError::ConnectionLost("control channel closed".to_string()))?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(devices)) => Ok(devices),
            Ok(Err(_)) => Err(ConnectionError::ConnectionLost(
                "control channel closed before the node list arrived".to_string(),
            )),
            Err(_) => Err(ConnectionError::Timeout("node list".to_string())),
        }
    }

    /// Handle a `nodes` response from the server
    ///
    /// Each response belongs to the oldest outstanding request, even one
    /// whose caller has given up; that slot absorbs its own late reply.
    pub async fn handle_nodes(&self, devices: Vec<Device>) {
        let mut state = self.state.lock().await;
        state.devices = devices.clone();

        match state.pending.pop_front() {
            Some(waiter) => {
                if waiter.send(devices).is_err() {
                    tracing::debug!("Late node list for an abandoned request, cache updated");
                }
            }
            None => tracing::debug!("Unsolicited node list, cache updated"),
        }
    }

    /// `Pending` while any live request awaits a response
    ///
    /// Abandoned slots stay queued so replies keep pairing with requests.
    pub async fn query_state(&self) -> QueryState {
        let state = self.state.lock().await;
        if state.pending.iter().any(|waiter| !waiter.is_closed()) {
            QueryState::Pending
        } else {
            QueryState::Idle
        }
    }

    /// Last received node list
    pub async fn devices(&self) -> Vec<Device> {
        self.state.lock().await.devices.clone()
    }

    /// Fail outstanding requests and refuse new ones
    pub(crate) async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        // Dropping the senders wakes every waiter with an error
        state.pending.clear();
    }
}
