//! Module lifecycle
//!
//! `RelayModule` owns the client from handler registration to shutdown:
//! - `attach` subscribes the inbound handler; a registration failure shuts the
//!   client down and is returned as a setup error
//! - `run` drives the outbound relay loop on its own task and, however the loop
//!   ends (cancellation, send error, panic), shuts the client down exactly once

pub mod signal;

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::client::{ModuleClient, Subscription};
use crate::config::RelaySettings;
use crate::relay::{InboundHandler, OutboundQueue, run_relay_loop};
use crate::utils::{ClientError, ModuleError};

pub use signal::spawn_termination_listener;

pub struct RelayModule {
    client: Arc<dyn ModuleClient>,
    subscriptions: Vec<Subscription>,
}

impl RelayModule {
    pub async fn attach(client: Arc<dyn ModuleClient>) -> Result<Self, ModuleError> {
        let handler = Arc::new(InboundHandler::new(&client));

        match register_handlers(client.as_ref(), handler) {
            Ok(subscriptions) => Ok(Self {
                client,
                subscriptions,
            }),
            Err(e) => {
                error!(error = %e, "handler registration failed, shutting down client");
                if let Err(shutdown_err) = client.shutdown().await {
                    warn!(error = %shutdown_err, "client shutdown after setup failure failed");
                }
                Err(ModuleError::Setup(e))
            }
        }
    }

    /// Relays queued payloads until `cancel` fires or the loop fails, then
    /// releases the client. Returns how the loop ended.
    pub async fn run<T>(
        self,
        queue: OutboundQueue<T>,
        cancel: CancellationToken,
        settings: RelaySettings,
    ) -> Result<(), ModuleError>
    where
        T: Serialize + Send + 'static,
    {
        let relay = tokio::spawn(run_relay_loop(
            Arc::clone(&self.client),
            queue,
            cancel,
            settings,
        ));

        let outcome = match relay.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ModuleError::Relay(e)),
            Err(e) => Err(ModuleError::Join(e)),
        };

        self.shutdown().await;
        outcome
    }

    async fn shutdown(self) {
        info!("Shutting down edge hub client...");
        for subscription in self.subscriptions {
            subscription.revoke();
        }
        if let Err(e) = self.client.shutdown().await {
            error!(error = %e, "client shutdown failed");
        }
    }
}

fn register_handlers(
    client: &dyn ModuleClient,
    handler: Arc<InboundHandler>,
) -> Result<Vec<Subscription>, ClientError> {
    let messages = client.on_message_received(handler.clone())?;
    let twin_patches = client.on_twin_patch_received(handler)?;
    Ok(vec![messages, twin_patches])
}
