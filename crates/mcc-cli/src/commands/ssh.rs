//! SSH command implementation

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::client::{self, ClientOptions};
use crate::output::{print_error, print_info, print_warning};
use mcc_relay::{open_tunnel, proxy_stdio, Router, TunnelTarget};

/// User when the destination does not name one
const DEFAULT_USER: &str = "root";

/// Options for the ssh command
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// `[user][@target]`
    pub destination: Option<String>,
    pub node_id: Option<String>,
    /// Remote SSH port
    pub port: u16,
    /// Pipe the tunnel to stdio instead of running the ssh client
    pub proxy: bool,
}

/// Split `[user][@target]` into a user and an optional target address
///
/// A loopback target is the node itself, same as no target.
pub fn parse_destination(destination: Option<&str>) -> (String, Option<String>) {
    let Some(destination) = destination else {
        return (DEFAULT_USER.to_string(), None);
    };

    let (user, target) = match destination.split_once('@') {
        Some((user, target)) => (user, Some(target)),
        None => (destination, None),
    };

    let user = if user.is_empty() { DEFAULT_USER } else { user };
    let target = target
        .filter(|t| !t.is_empty() && *t != "127.0.0.1")
        .map(str::to_string);

    (user.to_string(), target)
}

/// Open an SSH session to a node through a tunnel
pub async fn ssh_command(opts: &ClientOptions, ssh: SshOptions) -> Result<()> {
    let (user, target) = parse_destination(ssh.destination.as_deref());

    let mut connected = client::connect(opts).await?;
    let node_id = client::resolve_node(
        &mut connected,
        ssh.node_id.as_deref(),
        opts.node.as_deref(),
    )
    .await?;
    let tunnel = TunnelTarget {
        node_id,
        port: ssh.port,
        target,
    };

    if ssh.proxy {
        let session = connected.session();
        let timeout = connected.config.connect_timeout;
        let work = async {
            let ws = open_tunnel(&session, &tunnel, timeout).await?;
            Ok::<_, anyhow::Error>(proxy_stdio(ws).await)
        };
        let outcome = client::drive(&mut connected.channel, work).await;
        connected.channel.stop().await;

        if let Some(stats) = outcome?.transpose()? {
            tracing::debug!(
                "Proxy finished ({} bytes in, {} bytes out)",
                stats.received,
                stats.sent
            );
        }
        return Ok(());
    }

    let router = Router::bind(
        connected.session(),
        tunnel.clone(),
        0,
        connected.config.clone(),
    )
    .await?;
    let local_port = router.local_port();
    let serving = tokio::spawn(router.serve());

    print_info(&format!(
        "SSH into {}:{} via 127.0.0.1:{}",
        tunnel.target.as_deref().unwrap_or("localhost"),
        tunnel.port,
        local_port
    ));

    let mut child = Command::new("ssh");
    child
        .args([
            "-o",
            "ServerAliveInterval=60",
            "-o",
            "ServerAliveCountMax=3",
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
        ])
        .arg(format!("-p{}", local_port))
        .arg(format!("{}@127.0.0.1", user))
        .kill_on_drop(true);

    let outcome = client::drive(&mut connected.channel, child.status()).await;
    serving.abort();
    connected.channel.stop().await;

    match outcome.context("SSH session aborted")? {
        Some(Ok(status)) if !status.success() => {
            print_warning(&format!("ssh exited with {}", status));
        }
        Some(Ok(_)) | None => {}
        Some(Err(e)) => print_error(&format!("Unable to start SSH client: {}", e)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user() {
        assert_eq!(parse_destination(None), ("root".to_string(), None));
        assert_eq!(
            parse_destination(Some("@10.0.0.5")),
            ("root".to_string(), Some("10.0.0.5".to_string()))
        );
    }

    #[test]
    fn test_user_and_target() {
        assert_eq!(
            parse_destination(Some("admin@10.0.0.5")),
            ("admin".to_string(), Some("10.0.0.5".to_string()))
        );
        assert_eq!(parse_destination(Some("admin")), ("admin".to_string(), None));
    }

    #[test]
    fn test_loopback_target_is_the_node() {
        assert_eq!(
            parse_destination(Some("admin@127.0.0.1")),
            ("admin".to_string(), None)
        );
    }
}
