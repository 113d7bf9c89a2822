//! Reference-counted loading signal and outcome notifications for async
//! operations.
//!
//! A [`LoadingService`] wraps futures and streams so that an
//! application-wide "is anything loading" signal stays raised while any of
//! them is in flight, and reports success or failure to a
//! [`NotificationSink`] according to a per-call [`OutcomePolicy`].

mod error;
mod loading;
mod navigation;
mod notify;
mod policy;
mod registry;
mod switch;
mod tracked;

pub use error::{NotifyError, WatchError};
pub use loading::{DEFAULT_NAVIGATION_WINDOW, LoadingConfig, LoadingService, LoadingServiceBuilder};
pub use navigation::{NavigationEvent, NavigationHandle};
pub use notify::{
    ChannelSink, DEFAULT_ERROR_MESSAGE, DEFAULT_SUCCESS_MESSAGE, Notification, NotificationKind,
    NotificationSink, TracingSink,
};
pub use policy::{NotificationSetting, OutcomePolicy};
pub use registry::{BusyGuard, BusyRegistry, Ticket, TicketKind};
pub use switch::SwitchWithLoading;
pub use tracked::WithLoading;
