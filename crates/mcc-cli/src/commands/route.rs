//! Route command implementation

use anyhow::{bail, Context, Result};
use tokio::sync::oneshot;

use crate::client::{self, ClientOptions};
use mcc_core::BindAddress;
use mcc_relay::{start_router, TunnelTarget};

/// Forward a local port to a port on (or reachable from) a node
pub async fn route_command(
    opts: &ClientOptions,
    node_id: Option<&str>,
    bind: &str,
) -> Result<()> {
    let bind = BindAddress::parse(bind)
        .with_context(|| format!("Error parsing bind address {:?}", bind))?;

    let mut connected = client::connect(opts).await?;
    let node_id = client::resolve_node(&mut connected, node_id, opts.node.as_deref()).await?;
    let target = TunnelTarget::from_bind(node_id, &bind);
    let remote_port = target.port;

    let (ready_tx, ready_rx) = oneshot::channel();
    let mut router = tokio::spawn(start_router(
        connected.session(),
        target,
        bind.local_port,
        connected.config.clone(),
        ready_tx,
    ));

    let local_port = match client::drive(&mut connected.channel, ready_rx).await {
        Ok(Some(Ok(port))) => port,
        Ok(Some(Err(_))) => {
            // The ready signal is only dropped when the bind failed
            let outcome = (&mut router).await;
            connected.channel.stop().await;
            return match outcome {
                Ok(Err(e)) => Err(e.into()),
                Ok(Ok(())) => bail!("Router stopped before it was ready"),
                Err(e) => Err(e.into()),
            };
        }
        Ok(None) => {
            router.abort();
            connected.channel.stop().await;
            return Ok(());
        }
        Err(e) => {
            router.abort();
            return Err(e);
        }
    };

    println!(
        "Redirecting local port {} to remote port {}.",
        local_port, remote_port
    );
    println!("Press ctrl-c to exit.");

    let outcome = client::drive(&mut connected.channel, &mut router).await;
    router.abort();
    connected.channel.stop().await;

    match outcome? {
        None => Ok(()),
        Some(Ok(Ok(()))) => Ok(()),
        Some(Ok(Err(e))) => Err(e.into()),
        Some(Err(e)) => Err(e.into()),
    }
}
