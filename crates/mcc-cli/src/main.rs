//! mcc CLI
//!
//! Command-line client for MeshCentral-style management servers:
//! - List managed nodes
//! - Forward local TCP ports to nodes over relay tunnels
//! - SSH into nodes through a tunnel (or act as an ssh ProxyCommand)
//! - Manage saved server profiles

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcc::client::ClientOptions;
use mcc::commands::{self, SshOptions};
use mcc::output::print_error;
use mcc_core::config::Profile;

#[derive(Parser)]
#[command(name = "mcc")]
#[command(author, version, about = "MeshCentral command-line client")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server profile to use (defaults to the configured default)
    #[arg(short = 'P', long, global = true, env = "MCC_PROFILE")]
    profile: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Login token (2FA)
    #[arg(long, global = true, env = "MCC_TOKEN")]
    token: Option<String>,

    /// Ask the server to email a login token
    #[arg(long, global = true)]
    email_token: bool,

    /// Ask the server to text a login token
    #[arg(long, global = true)]
    sms_token: bool,

    /// Log in with a login cookie instead of the profile password
    #[arg(long, global = true)]
    login_cookie: Option<String>,

    /// Node name or id, looked up when -i is not given
    #[arg(long, global = true)]
    node: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward TCP traffic to a node
    #[command(alias = "r")]
    Route {
        /// Node ID
        #[arg(short = 'i', long = "nodeid")]
        node_id: Option<String>,
        /// localport:[target:]remoteport
        #[arg(short = 'L', long = "bind-address")]
        bind_address: String,
        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// SSH into a node with the OpenSSH client
    Ssh {
        /// [user][@target]
        destination: Option<String>,
        /// Node ID
        #[arg(short = 'i', long = "nodeid")]
        node_id: Option<String>,
        /// Remote ssh port
        #[arg(short, long, default_value_t = 22)]
        port: u16,
        /// Pipe the tunnel to stdin/stdout (for ssh -o ProxyCommand)
        #[arg(long)]
        proxy: bool,
        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// Open a shell on a node
    Shell {
        /// Node ID
        #[arg(short = 'i', long = "nodeid")]
        node_id: Option<String>,
        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// List managed nodes
    #[command(alias = "ls")]
    List {
        /// Only show nodes whose name, id or address contains this text
        #[arg(short, long)]
        filter: Option<String>,
        /// Show detailed information
        #[arg(short, long)]
        long: bool,
        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// Manage configuration
    #[command(alias = "c")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show config file path
    Path,
    /// Show saved profiles and client settings
    Show,
    /// Add a server profile
    Add {
        /// Profile name
        name: String,
        /// Server host or URL
        #[arg(long)]
        server: String,
        /// Login user
        #[arg(short, long)]
        username: String,
        /// Login password
        #[arg(long, env = "MCC_PASSWORD", hide_env_values = true, default_value = "")]
        password: String,
        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },
    /// Remove a server profile
    Remove {
        /// Profile name
        name: String,
    },
    /// Set the default profile
    Default {
        /// Profile name
        name: String,
    },
}

impl Commands {
    fn debug(&self) -> bool {
        match self {
            Commands::Route { debug, .. }
            | Commands::Ssh { debug, .. }
            | Commands::Shell { debug, .. }
            | Commands::List { debug, .. } => *debug,
            Commands::Config { .. } => false,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity; --debug means at least debug
    let log_level = match (cli.quiet, cli.verbose, cli.command.debug()) {
        (true, _, _) => "error",
        (false, 0, false) => "warn",
        (false, 1, false) => "info",
        (false, 0..=2, _) => "debug",
        (false, _, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let opts = ClientOptions {
        config: cli.config,
        profile: cli.profile,
        token: cli.token,
        email_token: cli.email_token,
        sms_token: cli.sms_token,
        login_cookie: cli.login_cookie,
        node: cli.node,
    };

    match cli.command {
        Commands::Route {
            node_id,
            bind_address,
            ..
        } => commands::route_command(&opts, node_id.as_deref(), &bind_address).await,

        Commands::Ssh {
            destination,
            node_id,
            port,
            proxy,
            ..
        } => {
            commands::ssh_command(
                &opts,
                SshOptions {
                    destination,
                    node_id,
                    port,
                    proxy,
                },
            )
            .await
        }

        Commands::Shell { node_id, .. } => {
            commands::shell_command(&opts, node_id.as_deref()).await
        }

        Commands::List {
            filter,
            long,
            ..
        } => commands::list_command(&opts, filter.as_deref(), long).await,

        Commands::Config { action } => {
            let path = opts.config_path();
            match action.unwrap_or(ConfigAction::Path) {
                ConfigAction::Path => commands::config_path(&path),
                ConfigAction::Show => commands::config_show(&path),
                ConfigAction::Add {
                    name,
                    server,
                    username,
                    password,
                    default,
                } => commands::config_add(
                    &path,
                    Profile {
                        name,
                        server,
                        username,
                        password,
                    },
                    default,
                ),
                ConfigAction::Remove { name } => commands::config_remove(&path, &name),
                ConfigAction::Default { name } => commands::config_default(&path, &name),
            }
        }
    }
}
