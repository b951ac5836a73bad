//! mcc-cli: Command-line interface for mcc
//!
//! Provides the `mcc` binary: node listing, port forwarding and SSH over
//! relay tunnels, plus profile management.

pub mod client;
pub mod commands;
pub mod output;
