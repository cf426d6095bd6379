//! The `client` module is the transport seam between the relay and the edge hub.
//!
//! `ModuleClient` is the capability the relay core depends on: sending a message
//! to a named output and subscribing one handler per event category. The
//! concrete `WebSocketModuleClient` speaks JSON frames to the local edge hub.

pub mod environment;
pub mod frame;
pub mod module_client;
pub mod subscription;
pub mod websocket;

#[cfg(test)]
pub(crate) mod memory;

pub use environment::ModuleIdentity;
pub use module_client::{MessageHandler, ModuleClient, TwinPatchHandler};
pub use subscription::Subscription;
pub use websocket::WebSocketModuleClient;
