//! The loading service: shared busy signal plus outcome notifications.
//!
//! [`LoadingService`] is the context object every consumer receives. It
//! owns the [`BusyRegistry`], the [`NotificationSink`] and the
//! [`LoadingConfig`], and exposes the wrapping primitives:
//!
//! * [`with_loading`](LoadingService::with_loading) for a single future,
//! * [`observable_with_loading`](LoadingService::observable_with_loading)
//!   for a stream of results,
//! * [`switch_map_with_loading`](LoadingService::switch_map_with_loading)
//!   for switch-latest composition (see [`SwitchWithLoading`](crate::SwitchWithLoading)),
//! * [`navigation_started`](LoadingService::navigation_started) and
//!   [`watch_navigation`](LoadingService::watch_navigation) for route
//!   transitions (see [`NavigationHandle`](crate::NavigationHandle)).

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::notify::{NotificationSink, TracingSink};
use crate::policy::OutcomePolicy;
use crate::registry::{BusyRegistry, TicketKind};
use crate::tracked::WithLoading;

/// Default length of the busy window opened by a navigation start.
pub const DEFAULT_NAVIGATION_WINDOW: Duration = Duration::from_millis(300);

/// Tunables for a [`LoadingService`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use busyline::LoadingConfig;
///
/// let config = LoadingConfig {
///     navigation_window: Duration::from_millis(500),
///     ..LoadingConfig::default()
/// };
/// assert_eq!(config.navigation_window, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct LoadingConfig {
    /// How long a navigation start keeps the busy signal raised,
    /// regardless of when the navigation itself finishes.
    ///
    /// Default: 300 milliseconds.
    pub navigation_window: Duration,

    /// Policy used by the `*_default` wrapping helpers.
    ///
    /// Default: error notification on, success notification off.
    pub default_policy: OutcomePolicy,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            navigation_window: DEFAULT_NAVIGATION_WINDOW,
            default_policy: OutcomePolicy::default(),
        }
    }
}

/// Coordinates the application-wide loading signal.
///
/// `Clone` is cheap: the registry and sink are shared.
#[derive(Clone)]
pub struct LoadingService {
    pub(crate) registry: BusyRegistry,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) config: LoadingConfig,
}

impl fmt::Debug for LoadingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingService")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for LoadingService {
    fn default() -> Self {
        LoadingServiceBuilder::new().build()
    }
}

impl LoadingService {
    /// Create a service with default configuration around `sink`.
    pub fn new(sink: impl NotificationSink + 'static) -> Self {
        LoadingServiceBuilder::new().sink(sink).build()
    }

    /// Create a builder for configuring a service.
    pub fn builder() -> LoadingServiceBuilder {
        LoadingServiceBuilder::new()
    }

    /// The registry backing this service.
    pub fn registry(&self) -> &BusyRegistry {
        &self.registry
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &LoadingConfig {
        &self.config
    }

    /// Whether any tracked operation or navigation window is outstanding.
    pub fn is_loading(&self) -> bool {
        self.registry.is_busy()
    }

    /// Subscribe to the "is anything loading" signal.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.registry.subscribe()
    }

    /// The "is anything loading" signal as a stream, for UI binding.
    pub fn loading_stream(&self) -> WatchStream<bool> {
        self.registry.busy_stream()
    }

    /// Wrap a single asynchronous operation.
    ///
    /// The returned future raises the busy signal when first polled,
    /// reports the outcome to the sink according to `policy`, and yields
    /// the operation's result unchanged. The busy ticket is released when
    /// the operation finishes or when the future is dropped early.
    ///
    /// A future that is never polled never touches the registry.
    ///
    /// # Arguments
    ///
    /// * `operation` - The future to track.
    /// * `policy` - Which notifications to show for this call.
    ///
    /// # Returns
    ///
    /// A future resolving to exactly what `operation` resolves to.
    pub fn with_loading<F, T, E>(
        &self,
        operation: F,
        policy: OutcomePolicy,
    ) -> impl Future<Output = Result<T, E>> + use<F, T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let registry = self.registry.clone();
        let sink = Arc::clone(&self.sink);
        async move {
            let guard = registry.acquire(TicketKind::Operation);
            tracing::debug!(ticket = %guard.ticket(), "tracked operation started");

            let outcome = operation.await;
            report(sink.as_ref(), &policy, outcome.is_ok());

            tracing::debug!(
                ticket = %guard.ticket(),
                succeeded = outcome.is_ok(),
                "tracked operation finished"
            );
            drop(guard);
            outcome
        }
    }

    /// [`with_loading`](LoadingService::with_loading) with the configured
    /// default policy.
    pub fn with_loading_default<F, T, E>(
        &self,
        operation: F,
    ) -> impl Future<Output = Result<T, E>> + use<F, T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.with_loading(operation, self.config.default_policy.clone())
    }

    /// Wrap a stream of results.
    ///
    /// Items pass through unmodified. The busy ticket is taken on the
    /// first poll, before any item is observed. End of stream reports
    /// success; an `Err` item reports failure, is yielded unchanged, and
    /// ends the stream. Dropping the stream early releases the ticket.
    ///
    /// Drain the stream to its end for success to be reported; a stream
    /// dropped after its last item but before yielding `None` is treated
    /// as cancelled. Single-value operations should use
    /// [`with_loading`](LoadingService::with_loading) instead.
    ///
    /// # Arguments
    ///
    /// * `source` - Stream of `Result` items to track.
    /// * `policy` - Which notifications to show for this call.
    pub fn observable_with_loading<S, T, E>(
        &self,
        source: S,
        policy: OutcomePolicy,
    ) -> WithLoading<S>
    where
        S: tokio_stream::Stream<Item = Result<T, E>>,
    {
        WithLoading::new(source, self.registry.clone(), Arc::clone(&self.sink), policy)
    }
}

/// Deliver the notification `policy` asks for, if any.
///
/// Sink failures are logged and discarded; they never alter the outcome
/// of the operation being reported.
pub(crate) fn report(sink: &dyn NotificationSink, policy: &OutcomePolicy, succeeded: bool) {
    let setting = if succeeded {
        &policy.success_notification
    } else {
        &policy.error_notification
    };
    let Some(message) = setting.message() else {
        return;
    };

    let delivered = if succeeded {
        sink.notify_application_success(message)
    } else {
        sink.notify_application_error(message)
    };
    if let Err(e) = delivered {
        tracing::warn!(error = %e, succeeded, "notification sink failed");
    }
}

/// Builder for [`LoadingService`].
///
/// Without a sink, notifications go to [`TracingSink`].
pub struct LoadingServiceBuilder {
    registry: Option<BusyRegistry>,
    sink: Option<Arc<dyn NotificationSink>>,
    config: LoadingConfig,
}

impl Default for LoadingServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingServiceBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            registry: None,
            sink: None,
            config: LoadingConfig::default(),
        }
    }

    /// Set the notification sink.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set an already shared notification sink.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn shared_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share an existing registry instead of creating a new one.
    ///
    /// Services built on the same registry raise and lower the same busy
    /// signal.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn registry(mut self, registry: BusyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the navigation busy window.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn navigation_window(mut self, window: Duration) -> Self {
        self.config.navigation_window = window;
        self
    }

    /// Set the policy used by the `*_default` helpers.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn default_policy(mut self, policy: OutcomePolicy) -> Self {
        self.config.default_policy = policy;
        self
    }

    /// Replace the whole configuration.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn config(mut self, config: LoadingConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the service.
    pub fn build(self) -> LoadingService {
        LoadingService {
            registry: self.registry.unwrap_or_default(),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            config: self.config,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use std::sync::Mutex;

    use crate::error::NotifyError;
    use crate::notify::NotificationSink;

    /// Sink that records every call, optionally failing each one.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub successes: Mutex<Vec<Option<String>>>,
        pub errors: Mutex<Vec<Option<String>>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn successes(&self) -> Vec<Option<String>> {
            self.successes.lock().expect("lock").clone()
        }

        pub fn errors(&self) -> Vec<Option<String>> {
            self.errors.lock().expect("lock").clone()
        }

        fn outcome(&self) -> Result<(), NotifyError> {
            if self.fail {
                Err(NotifyError::Rejected("test sink".into()))
            } else {
                Ok(())
            }
        }
    }

    impl NotificationSink for RecordingSink {
        fn notify_application_success(&self, message: Option<&str>) -> Result<(), NotifyError> {
            self.successes
                .lock()
                .expect("lock")
                .push(message.map(str::to_owned));
            self.outcome()
        }

        fn notify_application_error(&self, message: Option<&str>) -> Result<(), NotifyError> {
            self.errors
                .lock()
                .expect("lock")
                .push(message.map(str::to_owned));
            self.outcome()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::test_fixtures::RecordingSink;
    use super::*;

    fn service_with(sink: Arc<RecordingSink>) -> LoadingService {
        LoadingService::builder().shared_sink(sink).build()
    }

    #[tokio::test]
    async fn success_passes_value_and_notifies_literal_message() {
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(Arc::clone(&sink));
        let policy = OutcomePolicy::default().with_success("Operation completed successfully");

        let value = service
            .with_loading(async { Ok::<_, String>(vec![1, 2, 3]) }, policy)
            .await
            .expect("operation should succeed");

        assert_eq!(value, vec![1, 2, 3]);
        assert_eq!(
            sink.successes(),
            vec![Some("Operation completed successfully".to_string())]
        );
        assert!(sink.errors().is_empty());
        assert!(!service.is_loading());
    }

    #[tokio::test]
    async fn error_is_rethrown_unchanged_after_notification() {
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(Arc::clone(&sink));
        let policy = OutcomePolicy::default().with_error(true).with_success("ok");

        let result = service
            .with_loading(async { Err::<(), _>("boom") }, policy)
            .await;

        assert_eq!(result, Err("boom"));
        assert!(sink.successes().is_empty(), "success must not be notified");
        assert_eq!(sink.errors(), vec![None]);
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn silent_policy_never_touches_sink() {
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(Arc::clone(&sink));

        let _ = service
            .with_loading(async { Err::<(), _>("boom") }, OutcomePolicy::silent())
            .await;
        let _ = service
            .with_loading(async { Ok::<_, ()>(1) }, OutcomePolicy::silent())
            .await;

        assert!(sink.successes().is_empty());
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn ticket_is_held_while_operation_runs() {
        let service = LoadingService::default();
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();

        let task = tokio::spawn(
            service.with_loading(async move { rx.await.map_err(|_| "dropped") }, OutcomePolicy::silent()),
        );
        tokio::task::yield_now().await;
        while !service.is_loading() {
            tokio::task::yield_now().await;
        }
        assert_eq!(service.registry().count(TicketKind::Operation), 1);

        tx.send(7).expect("receiver alive");
        let value = task.await.expect("task should not panic");
        assert_eq!(value, Ok(7));
        assert!(!service.is_loading());
    }

    #[tokio::test]
    async fn unpolled_operation_takes_no_ticket() {
        let service = LoadingService::default();
        let pending = service.with_loading(async { Ok::<_, ()>(()) }, OutcomePolicy::default());
        assert!(!service.is_loading());
        drop(pending);
        assert!(service.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_operation_releases_ticket() {
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(Arc::clone(&sink));
        let slow = service.with_loading(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, ()>(())
            },
            OutcomePolicy::default().with_success(true),
        );

        let timed_out = tokio::time::timeout(Duration::from_millis(50), slow).await;
        assert!(timed_out.is_err(), "operation should have been cut off");
        assert!(!service.is_loading(), "cancellation must release the ticket");
        assert!(sink.successes().is_empty());
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_does_not_alter_outcome() {
        let sink = Arc::new(RecordingSink::failing());
        let service = service_with(Arc::clone(&sink));

        let ok = service
            .with_loading(async { Ok::<_, &str>(5) }, OutcomePolicy::default().with_success(true))
            .await;
        let err = service
            .with_loading(async { Err::<u8, _>("boom") }, OutcomePolicy::default())
            .await;

        assert_eq!(ok, Ok(5));
        assert_eq!(err, Err("boom"));
        assert_eq!(sink.successes().len(), 1);
        assert_eq!(sink.errors().len(), 1);
        assert!(!service.is_loading());
    }

    #[tokio::test]
    async fn default_helper_uses_configured_policy() {
        let sink = Arc::new(RecordingSink::default());
        let service = LoadingService::builder()
            .shared_sink(Arc::clone(&sink) as Arc<dyn NotificationSink>)
            .default_policy(OutcomePolicy::silent().with_success("done"))
            .build();

        service
            .with_loading_default(async { Ok::<_, ()>(()) })
            .await
            .expect("operation should succeed");
        assert_eq!(sink.successes(), vec![Some("done".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_operations_keep_busy_until_slowest_finishes() {
        let service = LoadingService::default();
        let fast = service.with_loading(
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, ()>(())
            },
            OutcomePolicy::silent(),
        );
        let slow = service.with_loading(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, ()>(())
            },
            OutcomePolicy::silent(),
        );
        let fast = tokio::spawn(fast);
        let slow = tokio::spawn(slow);
        tokio::task::yield_now().await;

        let mut observed = vec![service.is_loading()];
        tokio::time::sleep(Duration::from_millis(150)).await;
        observed.push(service.is_loading());
        tokio::time::sleep(Duration::from_millis(100)).await;
        observed.push(service.is_loading());

        assert_eq!(observed, vec![true, true, false]);
        fast.await.expect("fast task").expect("fast op");
        slow.await.expect("slow task").expect("slow op");
    }

    #[test]
    fn builder_shares_registry() {
        let registry = BusyRegistry::new();
        let a = LoadingService::builder().registry(registry.clone()).build();
        let b = LoadingService::builder().registry(registry.clone()).build();
        let _ticket = a.registry().acquire(TicketKind::Operation);
        assert!(b.is_loading());
    }

    #[test]
    fn builder_sets_navigation_window() {
        let service = LoadingService::builder()
            .navigation_window(Duration::from_millis(50))
            .build();
        assert_eq!(service.config().navigation_window, Duration::from_millis(50));
        assert_eq!(
            LoadingService::default().config().navigation_window,
            DEFAULT_NAVIGATION_WINDOW
        );
    }
}
