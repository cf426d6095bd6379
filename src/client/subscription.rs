//! Handler registration
//!
//! A `HandlerSlot` holds at most one handler for an event category. Registering
//! hands back a `Subscription`; revoking it (explicitly or by dropping it)
//! empties the slot, unless a newer registration has replaced it meanwhile.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::utils::{ClientError, EventKind};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Slot<H> = Arc<Mutex<Option<(u64, Arc<H>)>>>;

/// Revocable handle returned by handler registration.
pub struct Subscription {
    kind: EventKind,
    revoke: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(kind: EventKind, revoke: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            kind,
            revoke: Some(Box::new(revoke)),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Removes the handler from the client.
    pub fn revoke(mut self) {
        self.run_revoke();
    }

    fn run_revoke(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_revoke();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.revoke.is_some())
            .finish()
    }
}

pub(crate) struct HandlerSlot<H: ?Sized> {
    kind: EventKind,
    slot: Slot<H>,
    next_id: AtomicU64,
}

impl<H: ?Sized + Send + Sync + 'static> HandlerSlot<H> {
    pub(crate) fn new(kind: EventKind) -> Self {
        Self {
            kind,
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn register(&self, handler: Arc<H>) -> Result<Subscription, ClientError> {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return Err(ClientError::HandlerAlreadyRegistered(self.kind));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some((id, handler));

        let shared = Arc::clone(&self.slot);
        Ok(Subscription::new(self.kind, move || {
            let mut slot = lock(&shared);
            if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
                *slot = None;
            }
        }))
    }

    pub(crate) fn current(&self) -> Option<Arc<H>> {
        lock(&self.slot).as_ref().map(|(_, handler)| Arc::clone(handler))
    }

    pub(crate) fn clear(&self) {
        *lock(&self.slot) = None;
    }
}
