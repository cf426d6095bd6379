use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::client::{MessageHandler, ModuleClient, TwinPatchHandler};
use crate::message::{ModuleMessage, TwinPatch};
use crate::relay::{INPUT_CHANNEL, OUTPUT_CHANNEL};

/// Handles events pushed by the edge hub.
///
/// Messages on `input1` are forwarded unchanged to `output1`; messages on any
/// other input are discarded. Twin patches are logged and nothing else.
///
/// The handler holds the client weakly: the client owns the handler through
/// its subscription, and this keeps that from becoming a cycle.
pub struct InboundHandler {
    client: Weak<dyn ModuleClient>,
}

impl InboundHandler {
    pub fn new(client: &Arc<dyn ModuleClient>) -> Self {
        Self {
            client: Arc::downgrade(client),
        }
    }
}

#[async_trait]
impl MessageHandler for InboundHandler {
    async fn handle_message(&self, message: ModuleMessage) {
        if message.input_name.as_deref() != Some(INPUT_CHANNEL) {
            debug!(input = ?message.input_name, "discarding message from unhandled input");
            return;
        }

        info!(
            body = ?message.body_text(),
            properties = ?message.custom_properties,
            "message received on {}, forwarding to {}",
            INPUT_CHANNEL,
            OUTPUT_CHANNEL
        );

        let Some(client) = self.client.upgrade() else {
            warn!("client released, dropping message");
            return;
        };

        if let Err(e) = client.send_message_to_output(message, OUTPUT_CHANNEL).await {
            error!(error = %e, output = OUTPUT_CHANNEL, "failed to forward message");
        }
    }
}

#[async_trait]
impl TwinPatchHandler for InboundHandler {
    async fn handle_twin_patch(&self, patch: TwinPatch) {
        info!(version = ?patch.version(), "Twin Patch received");
        info!("{patch}");
    }
}
