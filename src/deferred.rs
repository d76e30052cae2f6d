// src/deferred.rs

//! Single-resolution deferred results.
//!
//! A [`Deferred`] is the write side: whoever owns it may `resolve` or
//! `reject` exactly once. Every [`Promise`] cloned from it observes the same
//! settlement, no matter how many waiters there are or when they arrive.
//!
//! Built on `tokio::sync::watch`, so settling does not need a runtime and
//! waiters are woken without polling.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

static NEXT_DEFERRED_ID: AtomicU64 = AtomicU64::new(1);

/// Marker error: the deferred was dropped while still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abandoned;

/// Observable state of a deferred result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

impl<T: Clone, E: Clone> Settlement<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Settlement::Pending)
    }

    fn to_result(&self) -> Option<Result<T, E>> {
        match self {
            Settlement::Pending => None,
            Settlement::Resolved(v) => Some(Ok(v.clone())),
            Settlement::Rejected(e) => Some(Err(e.clone())),
        }
    }
}

/// Write side of a single-resolution result.
pub struct Deferred<T, E> {
    id: u64,
    tx: watch::Sender<Settlement<T, E>>,
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<T: Clone, E: Clone> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, E: Clone> Deferred<T, E> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Settlement::Pending);
        Self {
            id: NEXT_DEFERRED_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }

    /// A read handle sharing this deferred's identity.
    pub fn promise(&self) -> Promise<T, E> {
        Promise {
            id: self.id,
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.tx.borrow().is_pending()
    }

    /// Settle successfully. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Settlement::Resolved(value))
    }

    /// Settle with an error. Returns `false` if already settled.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Settlement::Rejected(error))
    }

    fn settle(&self, settlement: Settlement<T, E>) -> bool {
        self.tx.send_if_modified(move |state| {
            if state.is_pending() {
                *state = settlement;
                true
            } else {
                false
            }
        })
    }
}

/// Read side of a [`Deferred`]. Cheap to clone; clones share identity.
pub struct Promise<T, E> {
    id: u64,
    rx: watch::Receiver<Settlement<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            rx: self.rx.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<T: Clone, E: Clone> Promise<T, E> {
    /// Stable identity of the underlying deferred.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True when both promises come from the same deferred.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Current settlement, without waiting.
    pub fn peek(&self) -> Option<Result<T, E>> {
        self.rx.borrow().to_result()
    }

    pub fn is_settled(&self) -> bool {
        !self.rx.borrow().is_pending()
    }

    /// Wait for the settlement.
    ///
    /// If the deferred is dropped while pending, this yields
    /// `E::from(Abandoned)` instead of waiting forever.
    pub async fn wait(&self) -> Result<T, E>
    where
        E: From<Abandoned>,
    {
        let mut rx = self.rx.clone();
        loop {
            let current = rx.borrow_and_update().to_result();
            if let Some(result) = current {
                return result;
            }
            if rx.changed().await.is_err() {
                let last = rx.borrow().to_result();
                return last.unwrap_or_else(|| Err(E::from(Abandoned)));
            }
        }
    }
}
