//! Per-call configuration for success and error notifications.

use serde::{Deserialize, Serialize};

/// Whether, and with what text, one kind of notification is shown.
///
/// Serializes to the compact form used by option objects: `false` for
/// [`Off`](NotificationSetting::Off), `true` for
/// [`Default`](NotificationSetting::Default), a string for
/// [`Message`](NotificationSetting::Message).
///
/// # Examples
///
/// ```
/// use busyline::NotificationSetting;
///
/// let setting: NotificationSetting = serde_json::from_str("\"Saved\"").unwrap();
/// assert_eq!(setting, NotificationSetting::Message("Saved".into()));
/// assert_eq!(setting.message(), Some(Some("Saved")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSetting", into = "RawSetting")]
pub enum NotificationSetting {
    /// Suppress the notification.
    Off,
    /// Show the sink's default message.
    Default,
    /// Show this literal message.
    Message(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawSetting {
    Flag(bool),
    Message(String),
}

impl From<RawSetting> for NotificationSetting {
    fn from(raw: RawSetting) -> Self {
        match raw {
            RawSetting::Flag(flag) => flag.into(),
            RawSetting::Message(message) => Self::Message(message),
        }
    }
}

impl From<NotificationSetting> for RawSetting {
    fn from(setting: NotificationSetting) -> Self {
        match setting {
            NotificationSetting::Off => Self::Flag(false),
            NotificationSetting::Default => Self::Flag(true),
            NotificationSetting::Message(message) => Self::Message(message),
        }
    }
}

impl From<bool> for NotificationSetting {
    fn from(flag: bool) -> Self {
        if flag { Self::Default } else { Self::Off }
    }
}

impl From<&str> for NotificationSetting {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}

impl From<String> for NotificationSetting {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl NotificationSetting {
    /// Resolve the setting into the argument a sink receives.
    ///
    /// # Returns
    ///
    /// `None` when the notification is suppressed, `Some(None)` when the
    /// sink should use its default text, `Some(Some(text))` otherwise.
    pub fn message(&self) -> Option<Option<&str>> {
        match self {
            Self::Off => None,
            Self::Default => Some(None),
            Self::Message(message) => Some(Some(message.as_str())),
        }
    }

    /// `true` unless the setting is [`Off`](NotificationSetting::Off).
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Notification behaviour attached to one wrapped operation.
///
/// Defaults to showing the default error message on failure and nothing on
/// success. Missing fields take those defaults when deserializing.
///
/// # Examples
///
/// ```
/// use busyline::{NotificationSetting, OutcomePolicy};
///
/// let policy: OutcomePolicy =
///     serde_json::from_str(r#"{"successNotification": "Saved"}"#).unwrap();
/// assert_eq!(policy.error_notification, NotificationSetting::Default);
/// assert_eq!(policy.success_notification, NotificationSetting::Message("Saved".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutcomePolicy {
    /// What to show when the operation fails.
    pub error_notification: NotificationSetting,
    /// What to show when the operation completes successfully.
    pub success_notification: NotificationSetting,
}

impl Default for OutcomePolicy {
    fn default() -> Self {
        Self {
            error_notification: NotificationSetting::Default,
            success_notification: NotificationSetting::Off,
        }
    }
}

impl OutcomePolicy {
    /// A policy that shows nothing on either outcome.
    pub fn silent() -> Self {
        Self {
            error_notification: NotificationSetting::Off,
            success_notification: NotificationSetting::Off,
        }
    }

    /// Set the error notification.
    ///
    /// # Arguments
    ///
    /// * `setting` - `bool`, `&str`, `String` or a [`NotificationSetting`].
    ///
    /// # Returns
    ///
    /// The updated policy.
    pub fn with_error(mut self, setting: impl Into<NotificationSetting>) -> Self {
        self.error_notification = setting.into();
        self
    }

    /// Set the success notification.
    ///
    /// # Arguments
    ///
    /// * `setting` - `bool`, `&str`, `String` or a [`NotificationSetting`].
    ///
    /// # Returns
    ///
    /// The updated policy.
    pub fn with_success(mut self, setting: impl Into<NotificationSetting>) -> Self {
        self.success_notification = setting.into();
        self
    }
}
