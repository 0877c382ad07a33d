//! Durable state of the sync engine
//!
//! The only state that must survive a restart is which report belongs to
//! which endpoint; see [`bindings`].

pub mod bindings;

pub use bindings::{BindingStore, LoadWarning};
