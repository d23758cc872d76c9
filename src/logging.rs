// Structured logging setup

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging profile, selected per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogProfile {
    /// Human-readable output, debug level for this crate
    #[default]
    Development,
    /// JSON lines at info level
    Production,
    /// No subscriber installed
    #[value(name = "skip", alias = "silent")]
    Silent,
}

impl LogProfile {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_directives(&self) -> &'static str {
        match self {
            LogProfile::Development => "mudrelay=debug,info",
            LogProfile::Production => "mudrelay=info,warn",
            LogProfile::Silent => "off",
        }
    }
}

/// Install the global tracing subscriber for `profile`.
///
/// `RUST_LOG` overrides the profile's default filter.
pub fn init_logging(profile: LogProfile) -> Result<()> {
    if profile == LogProfile::Silent {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| profile.default_directives().into());
    let registry = tracing_subscriber::registry().with(filter);

    match profile {
        LogProfile::Production => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
    .context("Failed to initialize logging")
}
