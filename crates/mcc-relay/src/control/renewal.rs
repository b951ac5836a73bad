//! Periodic auth cookie renewal

use std::time::Duration;

use mcc_protocol::ClientCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::Outgoing;

/// Request a fresh auth cookie every `period` until `cancel` fires
///
/// The first request goes out one full period after arming.
pub fn spawn_renewal(
    period: Duration,
    commands: mpsc::Sender<Outgoing>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tracing::debug!("Renewing auth cookie");
                    if commands
                        .send(Outgoing::Command(ClientCommand::AuthCookie))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }

        tracing::trace!("Cookie renewal stopped");
    })
}
