//! Switch-latest composition with busy tracking.
//!
//! [`SwitchWithLoading`] maps every value of a source stream to a tracked
//! result stream. A new source value drops whatever projection is still in
//! flight, which releases its busy ticket through the usual guard, and
//! only the newest projection's items are forwarded.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::FusedStream;
use tokio_stream::Stream;

use crate::loading::LoadingService;
use crate::policy::OutcomePolicy;
use crate::tracked::WithLoading;

/// Stream returned by
/// [`LoadingService::switch_map_with_loading`](LoadingService::switch_map_with_loading).
#[must_use = "streams do nothing unless polled"]
pub struct SwitchWithLoading<Src, P, S> {
    source: Option<Pin<Box<Src>>>,
    project: P,
    active: Option<WithLoading<S>>,
    service: LoadingService,
    policy: OutcomePolicy,
    generation: u64,
    terminated: bool,
}

// No field is structurally pinned: the source is boxed and the active
// projection is itself `Unpin`.
impl<Src, P, S> Unpin for SwitchWithLoading<Src, P, S> {}

impl<Src, P, S> fmt::Debug for SwitchWithLoading<Src, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchWithLoading")
            .field("generation", &self.generation)
            .field("source_done", &self.source.is_none())
            .field("active", &self.active.is_some())
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl<Src, P, S> SwitchWithLoading<Src, P, S> {
    /// Number of source values seen so far. The active projection, if
    /// any, belongs to this generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.source = None;
        self.active = None;
    }
}

impl<Src, P, S, T, E> Stream for SwitchWithLoading<Src, P, S>
where
    Src: Stream,
    P: FnMut(Src::Item) -> S,
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        // Drain every value the source has ready; only the last survives.
        while let Some(source) = this.source.as_mut() {
            match source.as_mut().poll_next(cx) {
                Poll::Ready(Some(value)) => {
                    this.generation += 1;
                    if let Some(stale) = this.active.take() {
                        tracing::debug!(
                            generation = this.generation,
                            stale_ticket = ?stale.ticket(),
                            "superseding in-flight projection"
                        );
                    }
                    let projected = (this.project)(value);
                    this.active = Some(
                        this.service
                            .observable_with_loading(projected, this.policy.clone()),
                    );
                }
                Poll::Ready(None) => this.source = None,
                Poll::Pending => break,
            }
        }

        if let Some(active) = this.active.as_mut() {
            match Pin::new(active).poll_next(cx) {
                Poll::Ready(Some(Ok(value))) => return Poll::Ready(Some(Ok(value))),
                Poll::Ready(Some(Err(e))) => {
                    this.terminate();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => this.active = None,
                Poll::Pending => return Poll::Pending,
            }
        }

        if this.source.is_none() {
            this.terminated = true;
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}

impl<Src, P, S, T, E> FusedStream for SwitchWithLoading<Src, P, S>
where
    Src: Stream,
    P: FnMut(Src::Item) -> S,
    S: Stream<Item = Result<T, E>>,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl LoadingService {
    /// Map each source value to a tracked result stream, keeping only the
    /// latest.
    ///
    /// Every projection is wrapped as by
    /// [`observable_with_loading`](LoadingService::observable_with_loading)
    /// with the same `policy`. When the source produces a new value while a
    /// projection is still running, that projection is dropped (its ticket
    /// is released, no notification is shown) and none of its later items
    /// are delivered. An `Err` from the active projection is forwarded and
    /// ends the composed stream. The composed stream ends once the source
    /// has ended and the last projection has completed.
    ///
    /// # Arguments
    ///
    /// * `source` - Stream of trigger values (search terms, page numbers).
    /// * `project` - Builds the result stream for one trigger value.
    /// * `policy` - Notification policy applied to every projection.
    pub fn switch_map_with_loading<Src, P, S, T, E>(
        &self,
        source: Src,
        project: P,
        policy: OutcomePolicy,
    ) -> SwitchWithLoading<Src, P, S>
    where
        Src: Stream,
        P: FnMut(Src::Item) -> S,
        S: Stream<Item = Result<T, E>>,
    {
        SwitchWithLoading {
            source: Some(Box::pin(source)),
            project,
            active: None,
            service: self.clone(),
            policy,
            generation: 0,
            terminated: false,
        }
    }
}
