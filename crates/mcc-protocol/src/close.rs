//! Server-initiated close notices
//!
//! A `close` command with cause `noauth` means the login was refused; the
//! `msg` code and token flags select the diagnostic shown to the user.
//! Any other cause is an ordinary disconnect.

use serde::Deserialize;

/// Payload of a `close` command
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CloseNotice {
    #[serde(default)]
    pub cause: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub email2fa: bool,
    #[serde(default)]
    pub sms2fa: bool,
    #[serde(default)]
    pub email2fasent: bool,
}

/// Why the server refused authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// A login token was emailed to the user
    TokenEmailSent,
    /// A second factor is required; flags say which delivery methods exist
    TokenRequired { email: bool, sms: bool },
    /// The server's TLS certificate did not match
    BadTlsCert,
    /// The server rejected the login arguments
    BadArgs,
    /// Username or password was wrong
    BadCredentials,
}

impl CloseNotice {
    /// Classify the close as an authentication failure, if it is one
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        if self.cause.as_deref() != Some("noauth") {
            return None;
        }

        let failure = match self.msg.as_deref() {
            Some("tokenrequired") if self.email2fasent => AuthFailure::TokenEmailSent,
            Some("tokenrequired") => AuthFailure::TokenRequired {
                email: self.email2fa,
                sms: self.sms2fa,
            },
            Some("badtlscert") => AuthFailure::BadTlsCert,
            Some("badargs") => AuthFailure::BadArgs,
            _ => AuthFailure::BadCredentials,
        };
        Some(failure)
    }
}

impl AuthFailure {
    /// One-line diagnostic for the user
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthFailure::TokenEmailSent => "Login token email sent.",
            AuthFailure::TokenRequired {
                email: true,
                sms: true,
            } => "Login token required, use --token [token], or --email-token, --sms-token to get a token.",
            AuthFailure::TokenRequired {
                email: false,
                sms: true,
            } => "Login token required, use --token [token], or --sms-token to get a token.",
            AuthFailure::TokenRequired {
                email: true,
                sms: false,
            } => "Login token required, use --token [token], or --email-token to get a token.",
            AuthFailure::TokenRequired { .. } => "Login token required, use --token [token].",
            AuthFailure::BadTlsCert => "Invalid TLS certificate detected.",
            AuthFailure::BadArgs => "Invalid protocol arguments.",
            AuthFailure::BadCredentials => "Invalid username/password.",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noauth(msg: &str) -> CloseNotice {
        CloseNotice {
            cause: Some("noauth".to_string()),
            msg: Some(msg.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_other_causes_are_not_auth_failures() {
        let notice = CloseNotice {
            cause: Some("serverrestart".to_string()),
            ..Default::default()
        };
        assert_eq!(notice.auth_failure(), None);
        assert_eq!(CloseNotice::default().auth_failure(), None);
    }

    #[test]
    fn test_email_token_required() {
        let notice = CloseNotice {
            email2fa: true,
            ..noauth("tokenrequired")
        };
        let failure = notice.auth_failure().unwrap();
        assert_eq!(
            failure,
            AuthFailure::TokenRequired {
                email: true,
                sms: false
            }
        );
        assert!(failure.user_message().contains("--email-token"));
        assert!(!failure.user_message().contains("--sms-token"));
    }

    #[test]
    fn test_email_sent_takes_priority() {
        let notice = CloseNotice {
            email2fa: true,
            sms2fa: true,
            email2fasent: true,
            ..noauth("tokenrequired")
        };
        assert_eq!(notice.auth_failure(), Some(AuthFailure::TokenEmailSent));
    }

    #[test]
    fn test_msg_codes() {
        assert_eq!(
            noauth("badtlscert").auth_failure(),
            Some(AuthFailure::BadTlsCert)
        );
        assert_eq!(noauth("badargs").auth_failure(), Some(AuthFailure::BadArgs));
        assert_eq!(
            noauth("whatever").auth_failure(),
            Some(AuthFailure::BadCredentials)
        );
        assert_eq!(
            AuthFailure::BadCredentials.to_string(),
            "Invalid username/password."
        );
    }
}
