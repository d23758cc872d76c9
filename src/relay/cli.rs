// CLI commands for the relay

use crate::logging::LogProfile;
use crate::relay::config::{DeliveryPolicy, DEFAULT_ADDR};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;

/// Relay CLI
#[derive(Debug, Parser)]
#[command(name = "mudrelay")]
#[command(about = "Minimal authenticated chat relay")]
pub struct RelayCli {
    /// Logging profile (development, production, skip)
    #[arg(long, global = true, env = "MUDRELAY_ENV", value_enum, default_value = "development")]
    pub log_profile: LogProfile,

    #[command(subcommand)]
    pub command: RelayCommand,
}

/// Relay subcommands
#[derive(Debug, Subcommand)]
pub enum RelayCommand {
    /// Run the relay server
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = DEFAULT_ADDR)]
        addr: SocketAddr,

        /// Interval at which open streams drain their mailbox
        #[arg(long, default_value = "300")]
        poll_interval_ms: u64,

        /// Which sessions receive a posted message
        #[arg(long, value_enum, default_value = "room")]
        delivery: DeliveryPolicy,

        /// Token signing secret (defaults to the compiled-in secret)
        #[arg(long, env = "MUDRELAY_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },

    /// Join a relay interactively
    Client {
        /// Relay address
        #[arg(short, long, default_value = DEFAULT_ADDR)]
        addr: SocketAddr,

        /// Display name
        #[arg(short, long, env = "USER", default_value = "guest")]
        name: String,
    },
}

impl RelayCli {
    /// Parse from command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
