//! mcc-core: Session state, configuration and shared errors for mcc
//!
//! This crate provides the session object shared by the control channel,
//! node directory and tunnel engine, the on-disk profile configuration,
//! and the parsing of port-forward bind addresses.

pub mod bind;
pub mod config;
pub mod error;
pub mod session;

pub use bind::BindAddress;
pub use error::{ConnectionError, McError};
pub use session::{AuthCookies, Credentials, Session, TrustState};
