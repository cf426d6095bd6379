//! The `message` module defines the data exchanged with the edge hub.
//!
//! `ModuleMessage` is the unit routed between input and output channels and
//! `TwinPatch` carries desired-property changes pushed from the cloud.

pub mod module_message;
pub mod twin;

pub use module_message::ModuleMessage;
pub use twin::TwinPatch;
