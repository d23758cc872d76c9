// Relay server configuration

use anyhow::Result;
use clap::ValueEnum;
use std::net::SocketAddr;
use std::time::Duration;

use crate::relay::token::DEFAULT_SECRET;

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:5555";

/// Interval at which an open stream drains its mailbox
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Which mailboxes a posted message lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeliveryPolicy {
    /// Every session, the sender's own included
    #[default]
    Room,
    /// Every session except the sender's
    Others,
}

impl DeliveryPolicy {
    /// Whether a message posted by `sender` should land in `recipient`'s mailbox
    pub fn delivers_to(&self, sender: &str, recipient: &str) -> bool {
        match self {
            DeliveryPolicy::Room => true,
            DeliveryPolicy::Others => sender != recipient,
        }
    }
}

/// Settings for a relay server instance
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub addr: SocketAddr,
    pub poll_interval: Duration,
    pub delivery: DeliveryPolicy,
    pub secret: String,
}

impl RelayConfig {
    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("Poll interval must be greater than zero");
        }
        if self.secret.is_empty() {
            anyhow::bail!("Signing secret must not be empty");
        }
        Ok(())
    }

    /// Whether the compiled-in signing secret is in use
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 5555)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            delivery: DeliveryPolicy::Room,
            secret: DEFAULT_SECRET.to_string(),
        }
    }
}
