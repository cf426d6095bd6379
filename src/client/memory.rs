//! In-memory `ModuleClient` that records everything it is asked to do.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::subscription::{HandlerSlot, lock};
use crate::client::{MessageHandler, ModuleClient, Subscription, TwinPatchHandler};
use crate::message::{ModuleMessage, TwinPatch};
use crate::utils::{ClientError, EventKind};

pub(crate) struct MemoryModuleClient {
    sent: Mutex<Vec<ModuleMessage>>,
    messages: HandlerSlot<dyn MessageHandler>,
    twin_patches: HandlerSlot<dyn TwinPatchHandler>,
    fail_sends: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
    reject_registration: Mutex<Option<EventKind>>,
    shutdown_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryModuleClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            messages: HandlerSlot::new(EventKind::Message),
            twin_patches: HandlerSlot::new(EventKind::TwinPatch),
            fail_sends: AtomicBool::new(false),
            send_delay: Mutex::new(None),
            reject_registration: Mutex::new(None),
            shutdown_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn sent(&self) -> Vec<ModuleMessage> {
        lock(&self.sent).clone()
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn delay_sends(&self, delay: Duration) {
        *lock(&self.send_delay) = Some(delay);
    }

    pub(crate) fn reject_registration(&self, kind: EventKind) {
        *lock(&self.reject_registration) = Some(kind);
    }

    pub(crate) fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn has_message_handler(&self) -> bool {
        self.messages.current().is_some()
    }

    pub(crate) fn has_twin_patch_handler(&self) -> bool {
        self.twin_patches.current().is_some()
    }

    /// Invokes the message handler the way the transport would. Returns
    /// whether a handler was subscribed.
    pub(crate) async fn deliver_message(&self, message: ModuleMessage) -> bool {
        match self.messages.current() {
            Some(handler) => {
                handler.handle_message(message).await;
                true
            }
            None => false,
        }
    }

    pub(crate) async fn deliver_twin_patch(&self, patch: TwinPatch) -> bool {
        match self.twin_patches.current() {
            Some(handler) => {
                handler.handle_twin_patch(patch).await;
                true
            }
            None => false,
        }
    }

    /// Polls until at least `count` sends were recorded or `timeout` elapses.
    pub(crate) async fn wait_for_sends(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if lock(&self.sent).len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn check_registration(&self, kind: EventKind) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        if *lock(&self.reject_registration) == Some(kind) {
            return Err(ClientError::Registration {
                kind,
                reason: "rejected by test".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleClient for MemoryModuleClient {
    async fn send_message_to_output(
        &self,
        message: ModuleMessage,
        output_name: &str,
    ) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        let delay = *lock(&self.send_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionClosed);
        }
        lock(&self.sent).push(message.routed_to(output_name));
        Ok(())
    }

    fn on_message_received(
        &self,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, ClientError> {
        self.check_registration(EventKind::Message)?;
        self.messages.register(handler)
    }

    fn on_twin_patch_received(
        &self,
        handler: Arc<dyn TwinPatchHandler>,
    ) -> Result<Subscription, ClientError> {
        self.check_registration(EventKind::TwinPatch)?;
        self.twin_patches.register(handler)
    }

    async fn shutdown(&self) -> Result<(), ClientError> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        self.messages.clear();
        self.twin_patches.clear();
        Ok(())
    }
}
