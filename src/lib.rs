#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Constellation HTTP: long-poll client for Constellation hubs
//!
//! This crate lets a small device take part in a Constellation hub using nothing
//! but plain HTTP/1.1 GET and POST cycles over a byte-stream transport.
//!
//! ## Overview
//!
//! A device identifies itself by sentinel name, package name and access key, then:
//!
//! 1. **Messages** - subscribes to messages addressed to it (directly, through
//!    groups, or as replies to its own sagas) and receives them by long-polling
//! 2. **StateObjects** - subscribes to StateObjects published by other packages,
//!    selected by `sentinel/package/name/type` filters with `*` wildcards
//! 3. **Publishing** - pushes its own StateObjects, sends messages and saga
//!    responses, and writes log lines to the hub
//!
//! When the hub loses a subscription (status 500 on a long-poll), the client
//! replays every subscription it made: message, groups, then StateObject filters.
//!
//! ## Key Features
//!
//! - **Non-blocking ticks**: one outstanding long-poll per channel, checked without blocking
//! - **Incremental response parsing**: chunked and `Content-Length` bodies, any fragmentation
//! - **Pluggable transport**: [`transport::Transport`] over TCP, TLS or a test double
//! - **Saga support**: one-shot reply callbacks keyed by a fresh UUID
//! - **HTTP Status Codes**:
//!   - `200 OK` - subscribe/query answers and long-poll batches
//!   - `204 No Content` - accepted commands
//!   - `500 Internal Server Error` - subscription lost, renew everything
//!
//! ## Client Usage
//!
//! ```no_run
//! use constellation_http::client::{
//!     ClientConfig, ConstellationClient, MessageHandler, StateObjectPush,
//! };
//!
//! # fn main() -> constellation_http::Result<()> {
//! let config = ClientConfig::from_url("http://192.168.0.10:8088")?
//!     .with_identity("ESP8266", "Thermostat", "secret");
//! let mut client = ConstellationClient::with_tcp(config);
//!
//! client.register_message_callback(
//!     "SetTarget",
//!     MessageHandler::with_context(|item, ctx| {
//!         println!("{} asks for {}", ctx.sender.friendly_name, item["Data"]);
//!     }),
//! )?;
//! client.push_state_object(&StateObjectPush::new("Temperature", 21.5))?;
//!
//! loop {
//!     if let Err(e) = client.poll() {
//!         eprintln!("tick failed: {}", e);
//!     }
//! }
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - **[types]** - Protocol data model (message context, scopes, StateObject filters)
//! - **[error]** - Error types and result handling
//! - **[client]** - The engine, response parser, subscriptions and dispatch
//! - **[transport]** - The byte-stream seam and its TCP implementation
//! - **[descriptor]** - Package descriptor advertised to the hub
//! - **[protocol]** - Endpoint names, identity headers and request building

pub mod client;
pub mod descriptor;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;

pub use client::{ClientConfig, ConstellationClient, MessageHandler, StateObjectPush};
pub use error::{ConstellationError, Result};
pub use transport::{TcpTransport, Transport};
pub use types::{LogLevel, MessageContext, ScopeType, StateObjectFilter};
