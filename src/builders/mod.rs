//! Builders to construct dispatcher components from configuration.

pub mod dispatcher_builder;

pub use dispatcher_builder::{build_dispatcher, Dispatcher};
