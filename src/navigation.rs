//! Busy windows for route transitions.
//!
//! Every navigation start raises the busy signal for a fixed window
//! ([`LoadingConfig::navigation_window`](crate::LoadingConfig::navigation_window)),
//! whether the navigation finishes sooner, later, or never. Overlapping
//! navigations get independent tickets.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};

use crate::error::WatchError;
use crate::loading::LoadingService;
use crate::registry::{Ticket, TicketKind};

/// A router lifecycle event.
///
/// Only [`Started`](NavigationEvent::Started) affects the busy signal; the
/// other variants are logged and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NavigationEvent {
    /// A navigation to `url` has begun. Opens a busy window.
    Started { id: u64, url: String },
    /// The navigation reached `url` successfully.
    Ended { id: u64, url: String },
    /// The navigation was abandoned, usually superseded by a newer one.
    Cancelled { id: u64, reason: String },
    /// The navigation failed with `error`.
    Failed { id: u64, error: String },
}

impl NavigationEvent {
    /// The navigation id this event belongs to.
    pub fn id(&self) -> u64 {
        match self {
            Self::Started { id, .. }
            | Self::Ended { id, .. }
            | Self::Cancelled { id, .. }
            | Self::Failed { id, .. } => *id,
        }
    }
}

impl LoadingService {
    /// Open a navigation busy window.
    ///
    /// Inserts a ticket immediately, so [`is_loading`](LoadingService::is_loading)
    /// is `true` by the time this returns, and schedules its removal after
    /// the configured window. The timer is never cancelled.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// The ticket for this window, for diagnostics.
    pub fn navigation_started(&self) -> Ticket {
        let guard = self.registry.acquire(TicketKind::Navigation);
        let ticket = guard.ticket();
        let window = self.config.navigation_window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            drop(guard);
        });
        ticket
    }

    /// Follow a stream of router events in a background task.
    ///
    /// Each [`NavigationEvent::Started`] opens a busy window as by
    /// [`navigation_started`](LoadingService::navigation_started). The task
    /// stops when the event stream ends, when
    /// [`NavigationHandle::shutdown`] is called, or when every clone of the
    /// returned handle has been dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch_navigation<St>(&self, events: St) -> NavigationHandle
    where
        St: Stream<Item = NavigationEvent> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_navigation_loop(self.clone(), events, shutdown_rx));

        NavigationHandle {
            shutdown_tx,
            task: Arc::new(tokio::sync::Mutex::new(Some(task))),
        }
    }
}

async fn run_navigation_loop<St>(
    service: LoadingService,
    events: St,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    St: Stream<Item = NavigationEvent>,
{
    tokio::pin!(events);
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(NavigationEvent::Started { id, url }) => {
                    let ticket = service.navigation_started();
                    tracing::debug!(id, %url, %ticket, "navigation started");
                }
                Some(other) => tracing::trace!(id = other.id(), ?other, "navigation event"),
                None => {
                    tracing::debug!("navigation event stream ended");
                    return;
                }
            },
            // Either an explicit shutdown or every handle dropped.
            _ = shutdown_rx.changed() => {
                tracing::debug!("navigation watcher stopping");
                return;
            }
        }
    }
}

/// Handle for a running navigation watcher.
///
/// `Clone` is cheap. Dropping the last clone stops the watcher.
#[must_use = "dropping the handle stops the navigation watcher"]
#[derive(Clone)]
pub struct NavigationHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl std::fmt::Debug for NavigationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationHandle")
            .field("running", &self.is_running())
            .finish()
    }
}

impl NavigationHandle {
    /// Whether the watcher task is still running.
    ///
    /// Reports `true` while a concurrent [`shutdown`](NavigationHandle::shutdown)
    /// is in progress.
    pub fn is_running(&self) -> bool {
        match self.task.try_lock() {
            Ok(task) => task.as_ref().is_some_and(|handle| !handle.is_finished()),
            Err(_) => true,
        }
    }

    /// Stop the watcher and wait for its task to exit.
    ///
    /// Windows that are already open still close on their own timers.
    /// Calling `shutdown` more than once is safe; later calls return
    /// `Ok(())` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Join`] if the watcher task panicked.
    pub async fn shutdown(&self) -> Result<(), WatchError> {
        // The task may already have exited on its own.
        let _ = self.shutdown_tx.send(true);

        let task = self.task.lock().await.take();
        if let Some(join_handle) = task {
            join_handle.await?;
        }
        Ok(())
    }
}
