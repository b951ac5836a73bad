//! Session state shared by the control channel, directory and tunnels
//!
//! Fields are split by writer: credentials are fixed once the session is
//! built, cookies and trust state are written by the control channel only.
//! Tunnel construction reads the current cookie.

use mcc_protocol::endpoint::encode_field;
use mcc_protocol::{auth_header, ClientCommand, RelayEndpoint};
use tokio::sync::{watch, RwLock};
use url::Url;

use crate::config::Profile;
use crate::error::{ConnectionError, McError};

/// Token sentinel asking the server to email a one-time code
pub const EMAIL_TOKEN: &str = "**email**";

/// Token sentinel asking the server to text a one-time code
pub const SMS_TOKEN: &str = "**sms**";

/// Header value sent when the server identity is already trusted
const TRUSTED_HEADER: &str = "*";

/// Login material supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Explicit one-time token
    pub token: Option<String>,
    /// Ask for a token by email
    pub email_token: bool,
    /// Ask for a token by SMS
    pub sms_token: bool,
    /// Long-lived login cookie used instead of username/password
    pub login_cookie: Option<String>,
}

impl Credentials {
    /// Password credentials with no token
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Username and password of a saved profile
    pub fn from_profile(profile: &Profile) -> Self {
        Self::password(&profile.username, &profile.password)
    }

    /// Token value to present, by priority: email, SMS, explicit token
    pub fn effective_token(&self) -> Option<&str> {
        if self.email_token {
            Some(EMAIL_TOKEN)
        } else if self.sms_token {
            Some(SMS_TOKEN)
        } else {
            self.token.as_deref().filter(|t| !t.is_empty())
        }
    }

    /// `userAuth` command answering a `serverAuth` challenge
    pub fn user_auth(&self) -> ClientCommand {
        let token = self.effective_token().map(str::to_string);
        match &self.login_cookie {
            Some(cookie) => ClientCommand::UserAuth {
                auth: Some(cookie.clone()),
                username: None,
                password: None,
                token,
            },
            None => ClientCommand::UserAuth {
                auth: None,
                username: Some(encode_field(&self.username)),
                password: Some(encode_field(&self.password)),
                token,
            },
        }
    }
}

/// Cookies issued by the server over the control channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCookies {
    /// Authorizes tunnel sessions
    pub cookie: String,
    /// Refreshes `cookie`
    pub rcookie: String,
}

/// Server trust material
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustState {
    /// Trusted server identity; `None` means the TLS-hash path is in use
    pub server_id: Option<String>,
    /// SHA-384 of the certificate seen on the last control connect
    pub observed_tls_hash: Option<String>,
    /// Hash confirmed by a `serverAuth` exchange
    pub confirmed_https_hash: Option<String>,
}

impl TrustState {
    /// Switch to TLS-hash pinning after a `serverAuth` challenge
    pub fn apply_server_auth(&mut self) {
        self.server_id = None;
        self.confirmed_https_hash = self.observed_tls_hash.take();
    }
}

/// How the control connection presents the login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLogin {
    pub url: Url,
    /// `x-meshauth` header value, if any
    pub header: Option<String>,
}

/// One client session against one server
#[derive(Debug)]
pub struct Session {
    endpoint: RelayEndpoint,
    credentials: Credentials,
    cookies: watch::Sender<Option<AuthCookies>>,
    trust: RwLock<TrustState>,
}

impl Session {
    pub fn new(endpoint: RelayEndpoint, credentials: Credentials) -> Self {
        let (cookies, _) = watch::channel(None);
        Self {
            endpoint,
            credentials,
            cookies,
            trust: RwLock::new(TrustState::default()),
        }
    }

    /// Session against a configured server address
    pub fn for_server(server: &str, credentials: Credentials) -> Result<Self, McError> {
        let endpoint = RelayEndpoint::from_server(server)?;
        Ok(Self::new(endpoint, credentials))
    }

    /// Start from a known trusted server identity
    pub fn with_server_id(self, server_id: impl Into<String>) -> Self {
        let trust = TrustState {
            server_id: Some(server_id.into()),
            ..Default::default()
        };
        Self {
            trust: RwLock::new(trust),
            ..self
        }
    }

    pub fn endpoint(&self) -> &RelayEndpoint {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Control URL and header for the next control connect
    ///
    /// A trusted server identity sends the wildcard header. Otherwise a
    /// login cookie goes in the query string and a password login goes in
    /// the `x-meshauth` header.
    pub async fn control_login(&self) -> ControlLogin {
        let token = self.credentials.effective_token();

        if self.trust.read().await.server_id.is_some() {
            return ControlLogin {
                url: self.endpoint.control_url(),
                header: Some(TRUSTED_HEADER.to_string()),
            };
        }

        match &self.credentials.login_cookie {
            Some(cookie) => ControlLogin {
                url: self.endpoint.control_url_with_cookie(cookie, token),
                header: None,
            },
            None => ControlLogin {
                url: self.endpoint.control_url(),
                header: Some(auth_header(
                    &self.credentials.username,
                    &self.credentials.password,
                    token,
                )),
            },
        }
    }

    /// Store freshly issued cookies, returning `true` on the first issue
    pub fn set_cookies(&self, cookies: AuthCookies) -> bool {
        self.cookies.send_replace(Some(cookies)).is_none()
    }

    /// Current cookies, if any were issued
    pub fn cookies(&self) -> Option<AuthCookies> {
        self.cookies.borrow().clone()
    }

    /// Wait until the control channel has obtained a tunnel cookie
    pub async fn wait_for_cookie(&self) -> Result<String, ConnectionError> {
        let mut rx = self.cookies.subscribe();
        let cookies = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ConnectionError::ConnectionLost("session closed".to_string()))?;
        Ok(cookies
            .as_ref()
            .map(|c| c.cookie.clone())
            .unwrap_or_default())
    }

    /// Snapshot of the trust state
    pub async fn trust(&self) -> TrustState {
        self.trust.read().await.clone()
    }

    /// Remember the certificate hash seen on connect
    pub async fn record_tls_hash(&self, hash: Option<String>) {
        if let Some(hash) = &hash {
            tracing::debug!("Server certificate hash {}", hash);
        }
        self.trust.write().await.observed_tls_hash = hash;
    }

    /// Handle `serverAuth`: pin the TLS hash and build the reply
    pub async fn apply_server_auth(&self) -> ClientCommand {
        self.trust.write().await.apply_server_auth();
        self.credentials.user_auth()
    }
}
