//! The shared set of outstanding busy tickets.
//!
//! A [`BusyRegistry`] holds one entry per in-flight tracked operation and
//! publishes a single derived boolean, "is anything loading", through a
//! `tokio::sync::watch` channel. Every insert and remove republishes the
//! boolean while the ticket map is still locked, so a subscriber can never
//! observe a value that disagrees with the map it was derived from.
//!
//! Public API: [`BusyRegistry`], [`BusyGuard`], [`Ticket`], [`TicketKind`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

/// Opaque handle for one in-flight tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(Uuid);

impl Ticket {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a ticket stands for. Only used for diagnostics; both kinds count
/// equally towards the busy signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    /// A wrapped asynchronous operation.
    Operation,
    /// A time-boxed window opened by a navigation start.
    Navigation,
}

struct Inner {
    tickets: Mutex<HashMap<Ticket, TicketKind>>,
    busy_tx: watch::Sender<bool>,
}

/// Shared registry of outstanding [`Ticket`]s.
///
/// `Clone` is cheap: all clones share the same map and watch channel.
/// Construct one per application and hand clones to every consumer.
#[derive(Clone)]
pub struct BusyRegistry {
    inner: Arc<Inner>,
}

impl fmt::Debug for BusyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusyRegistry")
            .field("outstanding", &self.len())
            .finish()
    }
}

impl Default for BusyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyRegistry {
    /// Create an empty registry. The busy signal starts out `false`.
    pub fn new() -> Self {
        let (busy_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                tickets: Mutex::new(HashMap::new()),
                busy_tx,
            }),
        }
    }

    // The map stays consistent across a panicking holder (every critical
    // section is a single insert or remove), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<Ticket, TicketKind>> {
        self.inner.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a fresh ticket and republish the busy signal.
    ///
    /// # Returns
    ///
    /// The newly created [`Ticket`]. The caller owns it and is responsible
    /// for removing it; prefer [`acquire`](BusyRegistry::acquire) which
    /// does so automatically.
    pub fn insert(&self, kind: TicketKind) -> Ticket {
        let ticket = Ticket::new();
        let mut tickets = self.lock();
        tickets.insert(ticket, kind);
        let outstanding = tickets.len();
        self.inner.busy_tx.send_replace(outstanding > 0);
        drop(tickets);

        tracing::trace!(%ticket, ?kind, outstanding, "busy ticket inserted");
        ticket
    }

    /// Remove a ticket and republish the busy signal.
    ///
    /// Removing a ticket that is not present is a no-op.
    ///
    /// # Returns
    ///
    /// `true` if the ticket was present and has been removed.
    pub fn remove(&self, ticket: Ticket) -> bool {
        let mut tickets = self.lock();
        let removed = tickets.remove(&ticket).is_some();
        let outstanding = tickets.len();
        self.inner.busy_tx.send_replace(outstanding > 0);
        drop(tickets);

        if removed {
            tracing::trace!(%ticket, outstanding, "busy ticket removed");
        }
        removed
    }

    /// Insert a ticket owned by the returned guard.
    ///
    /// The ticket is removed when the guard is dropped or released,
    /// whichever happens first, and never more than once.
    pub fn acquire(&self, kind: TicketKind) -> BusyGuard {
        BusyGuard {
            registry: self.clone(),
            ticket: self.insert(kind),
        }
    }

    /// Whether any ticket is outstanding.
    pub fn is_busy(&self) -> bool {
        *self.inner.busy_tx.borrow()
    }

    /// Number of outstanding tickets.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if no ticket is outstanding.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `ticket` is still outstanding.
    pub fn contains(&self, ticket: Ticket) -> bool {
        self.lock().contains_key(&ticket)
    }

    /// Number of outstanding tickets of the given kind.
    pub fn count(&self, kind: TicketKind) -> usize {
        self.lock().values().filter(|k| **k == kind).count()
    }

    /// Subscribe to the derived busy signal.
    ///
    /// The receiver sees the current value immediately and is notified on
    /// every subsequent insert or remove.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.busy_tx.subscribe()
    }

    /// The busy signal as a `Stream`, starting with the current value.
    pub fn busy_stream(&self) -> WatchStream<bool> {
        WatchStream::new(self.subscribe())
    }
}

/// Owner of exactly one outstanding [`Ticket`].
///
/// Dropping the guard removes the ticket. This is what makes cleanup run
/// on every exit path of a wrapped operation, including cancellation.
#[must_use = "dropping a BusyGuard immediately releases its ticket"]
#[derive(Debug)]
pub struct BusyGuard {
    registry: BusyRegistry,
    ticket: Ticket,
}

impl BusyGuard {
    /// The ticket held by this guard.
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Release the ticket now. Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.registry.remove(self.ticket);
    }
}
