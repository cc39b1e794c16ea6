//! The `utils` module provides shared definitions used across the `wspush`
//! server: the error taxonomy returned by the core, and logging setup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
