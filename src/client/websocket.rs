//! WebSocket edge hub transport
//!
//! `WebSocketModuleClient` keeps one connection to the edge hub for the life
//! of the process. Responsibilities:
//! - Announce the module identity with a `hello` frame
//! - Correlate each `send_to_output` with the hub's `send_ack` / `send_rejected`
//! - Dispatch `input_message` and `twin_patch` frames to the subscribed handlers,
//!   each on its own task
//! - Flush queued frames and close the socket exactly once on shutdown
//!
//! There is no reconnection: when the hub goes away, pending and future sends fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;
use url::Url;

use crate::client::frame::{HubFrame, ModuleFrame};
use crate::client::subscription::{HandlerSlot, lock};
use crate::client::{
    MessageHandler, ModuleClient, ModuleIdentity, Subscription, TwinPatchHandler,
};
use crate::config::HubSettings;
use crate::message::ModuleMessage;
use crate::utils::{ClientError, EventKind};

/// How long shutdown waits for the hub to answer our close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

type SendOutcome = oneshot::Sender<Result<(), ClientError>>;

/// State shared between the client and its reader task.
pub(super) struct Shared {
    pending: Mutex<HashMap<u64, SendOutcome>>,
    messages: HandlerSlot<dyn MessageHandler>,
    twin_patches: HandlerSlot<dyn TwinPatchHandler>,
}

impl Shared {
    pub(super) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            messages: HandlerSlot::new(EventKind::Message),
            twin_patches: HandlerSlot::new(EventKind::TwinPatch),
        }
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<HubFrame>(text) {
            Ok(HubFrame::InputMessage { input, message }) => {
                let message = message.with_input_name(input);
                match self.messages.current() {
                    Some(handler) => {
                        tokio::spawn(async move { handler.handle_message(message).await });
                    }
                    None => debug!(input = ?message.input_name, "no message handler, dropping"),
                }
            }
            Ok(HubFrame::TwinPatch { patch }) => match self.twin_patches.current() {
                Some(handler) => {
                    tokio::spawn(async move { handler.handle_twin_patch(patch).await });
                }
                None => debug!("no twin patch handler, dropping"),
            },
            Ok(HubFrame::SendAck { seq }) => self.complete(seq, Ok(())),
            Ok(HubFrame::SendRejected { seq, reason }) => {
                self.complete(seq, Err(ClientError::Rejected { seq, reason }))
            }
            Err(err) => warn!(
                error = %err,
                frame = %text.chars().take(100).collect::<String>(),
                "invalid frame from edge hub"
            ),
        }
    }

    fn complete(&self, seq: u64, outcome: Result<(), ClientError>) {
        match lock(&self.pending).remove(&seq) {
            Some(waiter) => {
                let _ = waiter.send(outcome);
            }
            None => warn!(seq, "outcome received for unknown send"),
        }
    }

    /// Registers the outcome waiter for `seq`.
    ///
    /// `stop` is cancelled before pending sends are failed, so a waiter
    /// inserted after that sweep is caught here instead of waiting out the
    /// send timeout.
    pub(super) fn track(
        &self,
        seq: u64,
        stop: &CancellationToken,
    ) -> Result<oneshot::Receiver<Result<(), ClientError>>, ClientError> {
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(seq, tx);
        if stop.is_cancelled() {
            lock(&self.pending).remove(&seq);
            return Err(ClientError::ConnectionClosed);
        }
        Ok(rx)
    }

    pub(super) fn fail_pending(&self) {
        for (_, waiter) in lock(&self.pending).drain() {
            let _ = waiter.send(Err(ClientError::ConnectionClosed));
        }
    }
}

/// Module client connected to the edge hub over a WebSocket.
pub struct WebSocketModuleClient {
    identity: ModuleIdentity,
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<WsMessage>,
    next_seq: AtomicU64,
    send_timeout: Duration,
    closed: AtomicBool,
    stop: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketModuleClient {
    /// Connects using the identity the edge runtime publishes in the environment.
    pub async fn create_from_environment(settings: &HubSettings) -> Result<Arc<Self>, ClientError> {
        let identity = ModuleIdentity::from_env()?;
        let url = identity.hub_url(settings)?;
        Self::connect(identity, url, settings).await
    }

    pub async fn connect(
        identity: ModuleIdentity,
        url: Url,
        settings: &HubSettings,
    ) -> Result<Arc<Self>, ClientError> {
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(ClientError::Connect)?;

        info!(
            url = %url,
            device_id = %identity.device_id,
            module_id = %identity.module_id,
            "connected to edge hub"
        );

        let (ws_sender, ws_receiver) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
        let shared = Arc::new(Shared::new());
        let stop = CancellationToken::new();

        let writer = tokio::spawn(write_loop(ws_sender, rx, stop.clone()));
        let reader = tokio::spawn(read_loop(ws_receiver, shared.clone(), stop.clone()));

        let client = Arc::new(Self {
            identity,
            shared,
            outgoing: tx,
            next_seq: AtomicU64::new(1),
            send_timeout: Duration::from_millis(settings.send_timeout_ms),
            closed: AtomicBool::new(false),
            stop,
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
        });

        client.push_frame(&ModuleFrame::Hello {
            device_id: client.identity.device_id.clone(),
            module_id: client.identity.module_id.clone(),
        })?;

        Ok(client)
    }

    fn push_frame(&self, frame: &ModuleFrame) -> Result<(), ClientError> {
        let text = serde_json::to_string(frame)?;
        self.outgoing
            .send(WsMessage::text(text))
            .map_err(|_| ClientError::ConnectionClosed)
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ClientError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ModuleClient for WebSocketModuleClient {
    async fn send_message_to_output(
        &self,
        message: ModuleMessage,
        output_name: &str,
    ) -> Result<(), ClientError> {
        self.ensure_open()?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let rx = self.shared.track(seq, &self.stop)?;

        let frame = ModuleFrame::SendToOutput {
            seq,
            output: output_name.to_string(),
            message: message.routed_to(output_name),
        };
        if let Err(e) = self.push_frame(&frame) {
            lock(&self.shared.pending).remove(&seq);
            return Err(e);
        }
        debug!(seq, output = output_name, "send queued for edge hub");

        match tokio::time::timeout(self.send_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                lock(&self.shared.pending).remove(&seq);
                Err(ClientError::SendTimeout {
                    seq,
                    timeout_ms: self.send_timeout.as_millis() as u64,
                })
            }
        }
    }

    fn on_message_received(
        &self,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, ClientError> {
        self.ensure_open()?;
        self.shared.messages.register(handler)
    }

    fn on_twin_patch_received(
        &self,
        handler: Arc<dyn TwinPatchHandler>,
    ) -> Result<Subscription, ClientError> {
        self.ensure_open()?;
        self.shared.twin_patches.register(handler)
    }

    async fn shutdown(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(module_id = %self.identity.module_id, "closing edge hub connection");

        self.shared.messages.clear();
        self.shared.twin_patches.clear();

        if let Err(e) = self.push_frame(&ModuleFrame::Goodbye {}) {
            debug!(error = %e, "goodbye not sent");
        }
        self.stop.cancel();

        let writer = lock(&self.writer).take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "edge hub writer task failed");
            }
        }

        let reader = lock(&self.reader).take();
        if let Some(mut reader) = reader {
            if tokio::time::timeout(CLOSE_GRACE, &mut reader).await.is_err() {
                warn!("edge hub did not close the connection in time");
                reader.abort();
            }
        }

        self.shared.fail_pending();
        Ok(())
    }
}

impl Drop for WebSocketModuleClient {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Owns the socket sink. Frames queued before `stop` fires are still written.
async fn write_loop<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<WsMessage>, stop: CancellationToken)
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        error!(error = %e, "failed to write to edge hub");
                        stop.cancel();
                        return;
                    }
                }
                None => break,
            },
            _ = stop.cancelled() => break,
        }
    }

    while let Ok(frame) = rx.try_recv() {
        if let Err(e) = sink.send(frame).await {
            warn!(error = %e, "failed to flush frame to edge hub");
            return;
        }
    }

    if let Err(e) = sink.close().await {
        debug!(error = %e, "edge hub socket close failed");
    }
}

async fn read_loop<S>(mut stream: S, shared: Arc<Shared>, stop: CancellationToken)
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => shared.dispatch(text.as_str()),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "edge hub connection failed");
                break;
            }
        }
    }

    info!("edge hub connection closed");
    stop.cancel();
    shared.fail_pending();
}
