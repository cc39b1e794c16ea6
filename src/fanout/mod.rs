//! The `fanout` module delivers one payload to every connection bound to an
//! `(identity, topic)` pair, and forcibly drops subscriptions.

pub mod service;

pub use service::{FanOut, PushReport};

#[cfg(test)]
mod tests;
