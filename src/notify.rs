//! Notification sinks: where success and error toasts end up.
//!
//! The loading layer only ever talks to the [`NotificationSink`] trait.
//! Two implementations ship with the crate: [`TracingSink`], which turns
//! notifications into log records, and [`ChannelSink`], which hands them to
//! a presenter task over an unbounded channel.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::NotifyError;

/// Text shown for a success notification that carries no message.
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Operation completed successfully";

/// Text shown for an error notification that carries no message.
pub const DEFAULT_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Presenter of transient success and error messages.
///
/// `message` is `None` when the caller asked for the default text. The sink
/// decides what that default looks like.
pub trait NotificationSink: Send + Sync {
    /// Show a success message.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the message could not be delivered.
    fn notify_application_success(&self, message: Option<&str>) -> Result<(), NotifyError>;

    /// Show an error message.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the message could not be delivered.
    fn notify_application_error(&self, message: Option<&str>) -> Result<(), NotifyError>;
}

/// Sink that writes notifications to `tracing`.
///
/// Success is logged at `info`, errors at `warn`. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify_application_success(&self, message: Option<&str>) -> Result<(), NotifyError> {
        tracing::info!(
            text = message.unwrap_or(DEFAULT_SUCCESS_MESSAGE),
            "application success"
        );
        Ok(())
    }

    fn notify_application_error(&self, message: Option<&str>) -> Result<(), NotifyError> {
        tracing::warn!(
            text = message.unwrap_or(DEFAULT_ERROR_MESSAGE),
            "application error"
        );
        Ok(())
    }
}

/// Which outcome a [`Notification`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// The operation completed successfully.
    Success,
    /// The operation failed.
    Error,
}

/// A notification as delivered by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Which outcome is being reported.
    pub kind: NotificationKind,
    /// The literal message, or `None` for the presenter's default text.
    pub message: Option<String>,
}

impl Notification {
    /// The text to display, falling back to the crate defaults.
    pub fn text(&self) -> &str {
        match (&self.message, self.kind) {
            (Some(message), _) => message.as_str(),
            (None, NotificationKind::Success) => DEFAULT_SUCCESS_MESSAGE,
            (None, NotificationKind::Error) => DEFAULT_ERROR_MESSAGE,
        }
    }
}

/// Sink that forwards every notification to a presenter task.
///
/// Create with [`ChannelSink::new`], keep the receiver in whatever renders
/// toasts, and hand the sink to the
/// [`LoadingServiceBuilder`](crate::LoadingServiceBuilder).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver its notifications arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, kind: NotificationKind, message: Option<&str>) -> Result<(), NotifyError> {
        self.tx
            .send(Notification {
                kind,
                message: message.map(str::to_owned),
            })
            .map_err(|_| NotifyError::Closed)
    }
}

impl NotificationSink for ChannelSink {
    fn notify_application_success(&self, message: Option<&str>) -> Result<(), NotifyError> {
        self.send(NotificationKind::Success, message)
    }

    fn notify_application_error(&self, message: Option<&str>) -> Result<(), NotifyError> {
        self.send(NotificationKind::Error, message)
    }
}
