//! The `relay` module moves payloads onto the `output1` channel.
//!
//! Two independent paths share the output channel:
//! - the outbound relay loop drains the `OutboundQueue`, serializes each item
//!   to JSON and sends it;
//! - the `InboundHandler` forwards messages received on `input1` unchanged and
//!   logs twin patches.
//!
//! No ordering is guaranteed between the two paths.

pub mod inbound;
pub mod ingest;
pub mod outbound;
pub mod queue;

pub use inbound::InboundHandler;
pub use ingest::ingest_json_lines;
pub use outbound::run_relay_loop;
pub use queue::{OutboundQueue, QueueClosed, QueueProducer, outbound_queue};

/// The only input channel the module acts on.
pub const INPUT_CHANNEL: &str = "input1";

/// Destination for both relayed and forwarded messages.
pub const OUTPUT_CHANNEL: &str = "output1";

#[cfg(test)]
mod tests;
