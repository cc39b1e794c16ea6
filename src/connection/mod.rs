//! The `connection` module wraps a single upgraded WebSocket stream.
//!
//! A [`Connection`] owns the read half through its `listen` loop and
//! arbitrates the write half between concurrent pushers. It knows nothing
//! about identities or topics; lifecycle events are reported through the
//! [`ConnHandler`] passed to `listen`.

pub mod conn;

pub use conn::{ConnHandler, ConnId, ConnState, Connection};

#[cfg(test)]
pub(crate) mod test_support;
