//! The `transport` module is responsible for network communication.
//!
//! It defines the records exchanged with subscribers and publishers, accepts
//! WebSocket connections and hands them to the [`Ingress`] handler, and
//! serves the push/drop HTTP API.

pub mod http;
pub mod ingress;
pub mod message;
pub mod websocket;

pub use ingress::Ingress;
pub use message::{DropMessage, PushMessage, RegisterMessage};
