//! CLI command implementations

mod config;
mod list;
mod route;
mod shell;
mod ssh;

pub use config::{config_add, config_default, config_path, config_remove, config_show};
pub use list::list_command;
pub use route::route_command;
pub use shell::shell_command;
pub use ssh::{parse_destination, ssh_command, SshOptions};
