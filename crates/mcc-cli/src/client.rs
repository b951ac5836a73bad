//! Connecting to the server and driving the control channel
//!
//! Every network command follows the same shape: load the profile, open the
//! control channel, wait for the first auth cookie, do its work while
//! watching for control events, then stop the channel.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use thiserror::Error;

use mcc_core::config::{self, ClientConfig, ConfigFile};
use mcc_core::{Credentials, Session};
use mcc_protocol::Device;
use mcc_relay::{ControlChannel, ControlEvent};

/// Per-invocation connection options from the global flags
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
    pub token: Option<String>,
    pub email_token: bool,
    pub sms_token: bool,
    pub login_cookie: Option<String>,
    pub node: Option<String>,
}

impl ClientOptions {
    /// Config file path, falling back to the default location
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(config::default_config_path)
    }
}

/// A logged-in control channel and the tuning it was opened with
pub struct Connected {
    pub channel: ControlChannel,
    pub config: ClientConfig,
}

impl Connected {
    pub fn session(&self) -> Arc<Session> {
        Arc::clone(self.channel.session())
    }
}

/// Open the control channel for the selected profile and wait for login
pub async fn connect(opts: &ClientOptions) -> Result<Connected> {
    let path = opts.config_path();
    let file: ConfigFile = config::load_config(&path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;
    let profile = file.resolve(opts.profile.as_deref())?;

    let mut credentials = Credentials::from_profile(profile);
    credentials.token = opts.token.clone();
    credentials.email_token = opts.email_token;
    credentials.sms_token = opts.sms_token;
    credentials.login_cookie = opts.login_cookie.clone();

    let session = Session::for_server(&profile.server, credentials)
        .with_context(|| format!("Invalid server address: {}", profile.server))?;
    let session = Arc::new(session);
    tracing::info!("Connecting to {} as {}", profile.server, profile.username);

    let mut channel = ControlChannel::connect(Arc::clone(&session), &file.client).await?;
    wait_for_login(&mut channel, &session).await?;

    Ok(Connected {
        channel,
        config: file.client,
    })
}

/// Wait for the first auth cookie
///
/// Unlike [`drive`], any disconnect here is fatal: without a cookie no
/// tunnel can be opened.
async fn wait_for_login(channel: &mut ControlChannel, session: &Session) -> Result<()> {
    let cookie = session.wait_for_cookie();
    tokio::pin!(cookie);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;

            event = channel.next_event() => match event {
                Some(ControlEvent::AuthFailed(failure)) => bail!("{}", failure),
                Some(ControlEvent::CookieIssued { .. }) => {}
                Some(ControlEvent::Disconnected { reason }) => match reason {
                    Some(reason) => bail!("Server closed the connection before login: {}", reason),
                    None => bail!("Server closed the connection before login"),
                },
                None => bail!("Server closed the connection before login"),
            },
            cookie = &mut cookie => {
                cookie?;
                tracing::debug!("Logged in");
                return Ok(());
            }
            _ = &mut ctrl_c => bail!("Interrupted"),
        }
    }
}

/// Run `work` while watching control events and ctrl-c
///
/// Returns `Some` with the work's output, or `None` on ctrl-c. An
/// authentication failure aborts with its diagnostic.
pub async fn drive<F>(channel: &mut ControlChannel, work: F) -> Result<Option<F::Output>>
where
    F: Future,
{
    tokio::pin!(work);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut listening = true;

    loop {
        tokio::select! {
            biased;

            event = channel.next_event(), if listening => match event {
                Some(ControlEvent::AuthFailed(failure)) => bail!("{}", failure),
                Some(ControlEvent::CookieIssued { first }) => {
                    tracing::debug!("Auth cookie issued (first: {})", first);
                }
                Some(ControlEvent::Disconnected { reason }) => {
                    tracing::debug!("Control channel closed: {:?}", reason);
                }
                None => listening = false,
            },
            out = &mut work => return Ok(Some(out)),
            _ = &mut ctrl_c => return Ok(None),
        }
    }
}

/// Node lookup failures
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NodeMatchError {
    #[error("No node matches {0:?}")]
    NotFound(String),

    #[error("{query:?} matches several nodes:\n{candidates}")]
    Ambiguous { query: String, candidates: String },
}

/// Pick one node for `query`
///
/// An exact id wins, then an exact name (case-insensitive), then a unique
/// substring of the name.
pub fn match_node<'a>(devices: &'a [Device], query: &str) -> Result<&'a Device, NodeMatchError> {
    if let Some(device) = devices.iter().find(|d| d.id == query) {
        return Ok(device);
    }

    let exact: Vec<&Device> = devices
        .iter()
        .filter(|d| d.name.eq_ignore_ascii_case(query))
        .collect();
    let candidates = if exact.is_empty() {
        let needle = query.to_lowercase();
        devices
            .iter()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .collect()
    } else {
        exact
    };

    match candidates.as_slice() {
        [] => Err(NodeMatchError::NotFound(query.to_string())),
        [one] => Ok(*one),
        many => Err(NodeMatchError::Ambiguous {
            query: query.to_string(),
            candidates: many
                .iter()
                .map(|d| format!("  {}  {}", d.name, d.id))
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    }
}

/// Node id from `-i`, or looked up by `--node` in the directory
pub async fn resolve_node(
    connected: &mut Connected,
    node_id: Option<&str>,
    node: Option<&str>,
) -> Result<String> {
    if let Some(id) = node_id {
        return Ok(id.to_string());
    }
    let Some(query) = node else {
        bail!("No node given, use -i <nodeid> or --node <name>");
    };

    let directory = connected.channel.directory();
    let devices = match drive(&mut connected.channel, directory.get_devices()).await? {
        Some(devices) => devices.context("Failed to fetch node list")?,
        None => bail!("Interrupted"),
    };

    let device = match_node(&devices, query)?;
    tracing::info!("Resolved {:?} to {}", query, device.id);
    Ok(device.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<Device> {
        ["web01", "web02", "db01", "Backup"]
            .iter()
            .map(|name| Device {
                id: format!("node//{}", name),
                name: name.to_string(),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_match_by_id() {
        let devices = devices();
        assert_eq!(match_node(&devices, "node//db01").unwrap().name, "db01");
    }

    #[test]
    fn test_exact_name_beats_substring() {
        let mut devices = devices();
        devices.push(Device {
            id: "node//db011".to_string(),
            name: "db011".to_string(),
            ..Default::default()
        });
        assert_eq!(match_node(&devices, "DB01").unwrap().id, "node//db01");
        assert_eq!(match_node(&devices, "backup").unwrap().id, "node//Backup");
    }

    #[test]
    fn test_ambiguous_lists_candidates() {
        let devices = devices();
        match match_node(&devices, "web") {
            Err(NodeMatchError::Ambiguous { candidates, .. }) => {
                assert!(candidates.contains("node//web01"));
                assert!(candidates.contains("node//web02"));
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_no_match() {
        let devices = devices();
        assert_eq!(
            match_node(&devices, "mail").unwrap_err(),
            NodeMatchError::NotFound("mail".to_string())
        );
    }

    #[test]
    fn test_config_path_override() {
        let opts = ClientOptions {
            config: Some(PathBuf::from("/tmp/mcc.toml")),
            ..Default::default()
        };
        assert_eq!(opts.config_path(), PathBuf::from("/tmp/mcc.toml"));
    }
}
