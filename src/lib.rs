//! # wspush
//!
//! `wspush` is a WebSocket push server. Subscribers open a WebSocket and
//! register a token and a topic; publishers push a message to an identity
//! (and topic) over HTTP or through the library API, and the server fans it
//! out to every matching connection.
//!
//! ## Core Modules
//!
//! - `connection`: one upgraded WebSocket stream, its read loop and write path.
//! - `registry`: identity/topic → connection bindings.
//! - `fanout`: push and drop over a registry snapshot.
//! - `auth`: injected token and push-request authorizers.
//! - `transport`: wire records, ingress handler, WebSocket listener, HTTP API.
//! - `server`: wires one instance together.
//! - `config`: layered settings.
//! - `utils`: error taxonomy and logging.

pub mod auth;
pub mod config;
pub mod connection;
pub mod fanout;
pub mod registry;
pub mod server;
pub mod transport;
pub mod utils;

pub use server::{Server, ServerHandle};
