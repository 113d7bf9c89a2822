//! Crate-level error types for notification delivery and watcher shutdown.
//!
//! Errors produced by wrapped operations are never represented here: they
//! are generic over the caller's own error type and pass through the
//! loading layer untouched.

/// Error returned by a [`NotificationSink`](crate::NotificationSink) when a
/// notification could not be delivered.
///
/// The loading layer never propagates this error to the caller of a wrapped
/// operation; it is logged and discarded so that a broken presenter cannot
/// change the outcome of the operation it reports on.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The presenter on the other end of the sink has gone away.
    ///
    /// Returned by [`ChannelSink`](crate::ChannelSink) once its receiver
    /// has been dropped.
    #[error("notification channel closed")]
    Closed,

    /// The sink refused the notification for a sink-specific reason.
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Error returned when stopping a navigation watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The watcher task panicked or was aborted.
    #[error("navigation watcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
