//! Stream adapter that holds a busy ticket for the lifetime of a stream.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::FusedStream;
use tokio_stream::Stream;

use crate::loading::report;
use crate::notify::NotificationSink;
use crate::policy::OutcomePolicy;
use crate::registry::{BusyGuard, BusyRegistry, Ticket, TicketKind};

/// A stream of results tracked by the busy registry.
///
/// Created by
/// [`LoadingService::observable_with_loading`](crate::LoadingService::observable_with_loading).
/// The ticket is taken on the first poll and released exactly once: when
/// the source ends, when it yields an `Err`, or when this stream is
/// dropped, whichever comes first.
///
/// Success is only reported once the source has been polled to its end.
/// Taking one item with `next()` and then dropping the stream counts as a
/// cancellation: the ticket is released and nothing is notified. For a
/// single value use [`LoadingService::with_loading`](crate::LoadingService::with_loading).
#[must_use = "streams do nothing unless polled"]
pub struct WithLoading<S> {
    /// `None` once a terminal signal has been seen.
    source: Option<Pin<Box<S>>>,
    registry: BusyRegistry,
    sink: Arc<dyn NotificationSink>,
    policy: OutcomePolicy,
    guard: Option<BusyGuard>,
}

impl<S> fmt::Debug for WithLoading<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithLoading")
            .field("terminated", &self.source.is_none())
            .field("ticket", &self.ticket())
            .field("policy", &self.policy)
            .finish()
    }
}

impl<S> WithLoading<S> {
    pub(crate) fn new(
        source: S,
        registry: BusyRegistry,
        sink: Arc<dyn NotificationSink>,
        policy: OutcomePolicy,
    ) -> Self {
        Self {
            source: Some(Box::pin(source)),
            registry,
            sink,
            policy,
            guard: None,
        }
    }

    /// The ticket currently held, if the stream has started and not yet
    /// terminated.
    pub fn ticket(&self) -> Option<Ticket> {
        self.guard.as_ref().map(BusyGuard::ticket)
    }

    fn finish(&mut self, succeeded: bool) {
        self.source = None;
        report(self.sink.as_ref(), &self.policy, succeeded);
        if let Some(guard) = self.guard.take() {
            tracing::debug!(ticket = %guard.ticket(), succeeded, "tracked stream finished");
        }
    }
}

impl<S, T, E> Stream for WithLoading<S>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(source) = this.source.as_mut() else {
            return Poll::Ready(None);
        };

        // First poll: register before the source can produce anything.
        if this.guard.is_none() {
            let guard = this.registry.acquire(TicketKind::Operation);
            tracing::debug!(ticket = %guard.ticket(), "tracked stream started");
            this.guard = Some(guard);
        }

        match source.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Err(e))) => {
                this.finish(false);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish(true);
                Poll::Ready(None)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.source {
            Some(source) => source.size_hint(),
            None => (0, Some(0)),
        }
    }
}

impl<S, T, E> FusedStream for WithLoading<S>
where
    S: Stream<Item = Result<T, E>>,
{
    fn is_terminated(&self) -> bool {
        self.source.is_none()
    }
}
