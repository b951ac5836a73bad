//! Shell command implementation

use anyhow::Result;

use crate::client::{self, ClientOptions};

/// Open a shell on a node
///
/// Only logs in and resolves the node for now; the terminal session itself
/// is not available yet.
pub async fn shell_command(opts: &ClientOptions, node_id: Option<&str>) -> Result<()> {
    let mut connected = client::connect(opts).await?;
    let node_id = client::resolve_node(&mut connected, node_id, opts.node.as_deref()).await?;
    tracing::debug!("Shell requested for {}", node_id);

    println!("not implemented yet");

    connected.channel.stop().await;
    Ok(())
}
