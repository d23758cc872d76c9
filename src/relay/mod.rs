// Chat relay
//
// Clients obtain a session-bound signed token through a handshake, post text
// into a shared room, and open a push stream that delivers the messages
// accumulated in their session's mailbox at a fixed poll interval.

pub mod error;
pub mod mailbox;
pub mod store;
pub mod token;
pub mod config;
pub mod handshake;
pub mod post;
pub mod stream;
pub mod broker;
pub mod message;
pub mod server;
pub mod client;
pub mod repl;
pub mod cli;
pub mod commands;

pub use error::{ErrorKind, RelayError};
pub use mailbox::Mailbox;
pub use store::SessionStore;
pub use token::{Claims, TokenCodec, DEFAULT_SECRET};
pub use config::{DeliveryPolicy, RelayConfig};
pub use handshake::{HandshakeHandler, HandshakeReply};
pub use post::PostHandler;
pub use stream::{FrameSink, OpenStream, StreamHandler};
pub use broker::Broker;
pub use message::{Request, Response};
pub use server::RelayServer;
pub use client::{RelayClient, RemoteError, Subscription};
pub use repl::{CommandTable, OpCode};
pub use cli::{RelayCli, RelayCommand};
pub use commands::execute_command;
