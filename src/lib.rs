//! # Edge Relay
//!
//! `edge-relay` is an IoT edge module that relays messages between the local
//! edge hub and the cloud. Messages arriving on the `input1` channel are
//! forwarded verbatim to `output1`, application payloads placed on the
//! outbound queue are serialized to JSON and sent to `output1`, and twin
//! patches pushed from the cloud are logged.
//!
//! ## Core Modules
//!
//! - `client`: the transport capability (`ModuleClient`), handler registration and
//!   the WebSocket hub transport.
//! - `config`: settings loading and log level / format resolution.
//! - `message`: module messages and twin patches.
//! - `relay`: the outbound queue, the outbound relay loop and the inbound handler.
//! - `runtime`: process lifecycle, from handler registration to client shutdown.
//! - `utils`: error types and logging setup.

pub mod client;
pub mod config;
pub mod message;
pub mod relay;
pub mod runtime;
pub mod utils;
