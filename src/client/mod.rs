//! Constellation long-poll client.
//!
//! This module provides a blocking, single-threaded client that lets a device:
//!
//! - **Subscribe to messages** (directly, through groups, or as saga replies)
//! - **Subscribe to StateObjects** through `sentinel/package/name/type` filters
//! - **Publish** StateObjects, messages, saga responses and log lines
//! - **Recover** from hub-side subscription loss by replaying every subscription
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── engine       - ConstellationClient, the tick-driven engine
//! ├── channel      - Control and long-poll connections
//! ├── parser       - Incremental HTTP/1.1 response parser
//! ├── subscription - Subscription ids, groups, filters and renewal
//! ├── dispatch     - Callback registry and routing
//! ├── outbound     - JSON bodies of POST requests
//! ├── config       - Client configuration
//! └── utils        - Utility functions
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConstellationClient`] | The engine |
//! | [`ClientConfig`] | Hub address, identity, timeouts |
//! | [`ResponseParser`] | Incremental response parser |
//! | [`SubscriptionManager`] | Subscription ids and renewal |
//! | [`DispatchRegistry`] | Callback routing |
//!
//! # Examples
//!
//! ## Parsing a Response
//!
//! ```
//! use constellation_http::client::{ParseState, ResponseParser};
//!
//! let mut parser = ResponseParser::new();
//! assert_eq!(parser.state(), ParseState::StatusLine);
//!
//! // Feed data incrementally
//! assert!(!parser.feed(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\n[]").unwrap());
//! assert!(parser.feed(b"\r\n0\r\n\r\n").unwrap());
//! assert_eq!(parser.finish().unwrap().text(), "[]");
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use constellation_http::client::{is_renewal_status, parse_subscription_id};
//!
//! assert!(is_renewal_status(500));
//! assert_eq!(
//!     parse_subscription_id("\"0f8fad5b-d9cb-469f-a165-70867728950e\"").unwrap(),
//!     "0f8fad5b-d9cb-469f-a165-70867728950e"
//! );
//! ```

mod channel;
mod config;
mod dispatch;
mod engine;
mod outbound;
mod parser;
mod subscription;
mod utils;

pub use channel::ConnectHook;
pub use config::ClientConfig;
pub use dispatch::{
    DispatchRegistry, MessageEntry, MessageHandler, MessageRoute, StateObjectHandler,
};
pub use engine::ConstellationClient;
pub use outbound::StateObjectPush;
pub use parser::{read_response, HttpResponse, ParseState, ResponseParser};
pub use subscription::{Requester, Subscription, SubscriptionManager};
pub use utils::*;
