use std::sync::Arc;

use async_trait::async_trait;

use crate::client::Subscription;
use crate::message::{ModuleMessage, TwinPatch};
use crate::utils::ClientError;

/// Receives messages delivered to any input channel of this module.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: ModuleMessage);
}

/// Receives desired-property patches pushed from the cloud.
#[async_trait]
pub trait TwinPatchHandler: Send + Sync {
    async fn handle_twin_patch(&self, patch: TwinPatch);
}

/// An authenticated session with the edge hub.
///
/// Implementations serialize concurrent sends internally, so the relay loop and
/// the inbound handler may send through the same client at the same time.
#[async_trait]
pub trait ModuleClient: Send + Sync {
    /// Sends `message` to `output_name` and resolves once the hub has accepted it.
    async fn send_message_to_output(
        &self,
        message: ModuleMessage,
        output_name: &str,
    ) -> Result<(), ClientError>;

    /// Subscribes the message handler. Only one may be active at a time.
    fn on_message_received(
        &self,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, ClientError>;

    /// Subscribes the twin patch handler. Only one may be active at a time.
    fn on_twin_patch_received(
        &self,
        handler: Arc<dyn TwinPatchHandler>,
    ) -> Result<Subscription, ClientError>;

    /// Releases the session. Calls after the first are no-ops.
    async fn shutdown(&self) -> Result<(), ClientError>;
}
