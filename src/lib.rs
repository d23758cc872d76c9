//! mudrelay - Minimal authenticated chat relay
//!
//! This library provides the session store, token codec and handlers behind
//! the relay, plus the TCP server, client and interactive front end built on
//! top of them.

pub mod logging;
pub mod relay;

pub use relay::{Broker, RelayConfig, RelayServer, SessionStore, TokenCodec};
