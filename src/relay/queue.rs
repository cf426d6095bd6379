//! Outbound queue
//!
//! An unbounded FIFO with any number of producers and exactly one consumer.
//! Enqueueing never blocks, so producers may live on any thread or runtime.
//! The consumer's wait is interruptible through a `CancellationToken`.

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Creates a connected producer/consumer pair.
pub fn outbound_queue<T>() -> (QueueProducer<T>, OutboundQueue<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueProducer { tx }, OutboundQueue { rx })
}

/// Returned when the consumer is gone. Carries the rejected item back.
pub struct QueueClosed<T>(pub T);

impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueClosed(..)")
    }
}

impl<T> fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("outbound queue is closed")
    }
}

impl<T> std::error::Error for QueueClosed<T> {}

pub struct QueueProducer<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for QueueProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueProducer")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<T> QueueProducer<T> {
    pub fn enqueue(&self, item: T) -> Result<(), QueueClosed<T>> {
        self.tx.send(item).map_err(|mpsc::error::SendError(item)| QueueClosed(item))
    }
}

pub struct OutboundQueue<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> fmt::Debug for OutboundQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundQueue")
            .field("len", &self.rx.len())
            .finish()
    }
}

impl<T> OutboundQueue<T> {
    /// Waits for the next item.
    ///
    /// Returns `None` once `cancel` fires or every producer has been dropped.
    /// Cancellation takes priority over items that are already queued.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Option<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    /// Takes an already-queued item without waiting.
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
