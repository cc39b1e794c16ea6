//! The `registry` module is the single source of truth for routing: which
//! connections are bound under which subscriber identity and topic.

pub mod binder;
pub mod binding;

pub use binder::Registry;
pub use binding::Binding;
