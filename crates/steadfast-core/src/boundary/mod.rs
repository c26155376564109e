//! Fault boundary with bounded automatic recovery.
//!
//! A [`FaultBoundary`] wraps a rendering closure. A fault raised by the
//! closure (an `Err` or a panic) or handed in through
//! [`FaultBoundary::capture`] swaps the output for a fallback, is reported
//! through the telemetry [`Dispatcher`], and, when it looks network-related,
//! schedules an automatic recovery with exponential backoff.
//!
//! At most one recovery is pending per boundary. Every scheduled recovery
//! carries an epoch; the timer task mutates state only under the state lock,
//! only while its epoch is current and only while the boundary is mounted.

mod fallback;
mod fault;
mod state;

pub use fallback::{AttemptCounter, FallbackAction, FallbackScreen, FaultDetails, Rendered};
pub use fault::{classify, Fault, FaultKind, FaultRecord, NETWORK_ERROR_NAME};
pub use state::{BoundaryState, Phase, RecoveryPolicy};

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::json;
use steadfast_telemetry::Dispatcher;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument, Span};

use crate::metrics::METRICS;
use crate::obs::{self, BoundarySpan};

type FaultHook = Arc<dyn Fn(&FaultRecord) + Send + Sync>;
type HomeHook = Arc<dyn Fn() + Send + Sync>;

/// Reusable boundary settings. Mount any number of boundaries from one preset.
pub struct BoundaryOptions<V> {
    name: String,
    policy: RecoveryPolicy,
    fallback: Option<V>,
    on_fault: Option<FaultHook>,
    on_go_home: Option<HomeHook>,
    dispatcher: Option<Arc<Dispatcher>>,
    subject_id: Option<String>,
}

impl<V> Default for BoundaryOptions<V> {
    fn default() -> Self {
        BoundaryOptions {
            name: "boundary".to_string(),
            policy: RecoveryPolicy::default(),
            fallback: None,
            on_fault: None,
            on_go_home: None,
            dispatcher: None,
            subject_id: None,
        }
    }
}

impl<V: Clone> Clone for BoundaryOptions<V> {
    fn clone(&self) -> Self {
        BoundaryOptions {
            name: self.name.clone(),
            policy: self.policy.clone(),
            fallback: self.fallback.clone(),
            on_fault: self.on_fault.clone(),
            on_go_home: self.on_go_home.clone(),
            dispatcher: self.dispatcher.clone(),
            subject_id: self.subject_id.clone(),
        }
    }
}

impl<V> fmt::Debug for BoundaryOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryOptions")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("has_fallback", &self.fallback.is_some())
            .field("has_on_fault", &self.on_fault.is_some())
            .field("has_on_go_home", &self.on_go_home.is_some())
            .field("subject_id", &self.subject_id)
            .finish()
    }
}

impl<V> BoundaryOptions<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label used in logs and error report context.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Render `fallback` instead of the default screen while faulted.
    pub fn fallback(mut self, fallback: V) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Called once per captured fault, after it has been reported.
    pub fn on_fault(mut self, hook: impl Fn(&FaultRecord) + Send + Sync + 'static) -> Self {
        self.on_fault = Some(Arc::new(hook));
        self
    }

    pub fn on_go_home(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_go_home = Some(Arc::new(hook));
        self
    }

    /// Defaults to [`Dispatcher::global`].
    pub fn dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Identity attached to error reports.
    pub fn subject_id(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Mount a boundary from these options, consuming them.
    pub fn build(self) -> FaultBoundary<V> {
        FaultBoundary::mount(self)
    }

    /// Mount a boundary from a copy of these options.
    pub fn mount(&self) -> FaultBoundary<V>
    where
        V: Clone,
    {
        self.clone().build()
    }
}

struct Inner {
    state: BoundaryState,
    epoch: u64,
    pending: Option<JoinHandle<()>>,
    mounted: bool,
}

impl Inner {
    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.epoch += 1;
    }
}

struct Shared {
    name: String,
    inner: Mutex<Inner>,
    tx: watch::Sender<BoundaryState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &BoundaryState) {
        self.tx.send_replace(state.clone());
    }

    /// Timer body: recover if this epoch is still the current one.
    fn recover(&self, epoch: u64) {
        let retry_count = {
            let mut inner = self.lock();
            if !inner.mounted || inner.epoch != epoch || !inner.state.is_faulted() {
                return;
            }
            inner.pending = None;
            inner.state.phase = Phase::Healthy;
            inner.state.fault = None;
            inner.state.retry_count += 1;
            self.publish(&inner.state);
            inner.state.retry_count
        };

        METRICS.inc_recoveries_completed();
        obs::emit_recovered(&self.name, retry_count);
    }
}

/// Arm the recovery timer. Caller holds the state lock.
fn schedule(shared: &Arc<Shared>, inner: &mut Inner, delay: Duration) -> bool {
    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(_) => {
            warn!(
                boundary = %shared.name,
                "no async runtime; automatic recovery unavailable"
            );
            return false;
        }
    };

    inner.epoch += 1;
    let epoch = inner.epoch;
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let timer = async move {
        tokio::time::sleep(delay).await;
        if let Some(shared) = weak.upgrade() {
            shared.recover(epoch);
        }
    };
    inner.pending = Some(runtime.spawn(timer.instrument(Span::current())));
    true
}

/// Isolates faults in a rendering closure and recovers from transient ones.
pub struct FaultBoundary<V> {
    shared: Arc<Shared>,
    policy: RecoveryPolicy,
    fallback: Option<V>,
    on_fault: Option<FaultHook>,
    on_go_home: Option<HomeHook>,
    dispatcher: Arc<Dispatcher>,
    subject_id: Option<String>,
}

impl<V> fmt::Debug for FaultBoundary<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultBoundary")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("policy", &self.policy)
            .finish()
    }
}

impl<V> FaultBoundary<V> {
    pub fn builder() -> BoundaryOptions<V> {
        BoundaryOptions::default()
    }

    fn mount(options: BoundaryOptions<V>) -> Self {
        let state = BoundaryState::healthy();
        let (tx, _rx) = watch::channel(state.clone());
        let shared = Arc::new(Shared {
            name: options.name,
            inner: Mutex::new(Inner {
                state,
                epoch: 0,
                pending: None,
                mounted: true,
            }),
            tx,
        });

        FaultBoundary {
            shared,
            policy: options.policy,
            fallback: options.fallback,
            on_fault: options.on_fault,
            on_go_home: options.on_go_home,
            dispatcher: options.dispatcher.unwrap_or_else(Dispatcher::global),
            subject_id: options.subject_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    pub fn state(&self) -> BoundaryState {
        self.shared.lock().state.clone()
    }

    /// Receiver that observes every transition, including automatic recoveries.
    pub fn subscribe(&self) -> watch::Receiver<BoundaryState> {
        self.shared.tx.subscribe()
    }

    /// Whether an automatic recovery is armed.
    pub fn recovery_pending(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// Record a fault raised outside of [`render`](Self::render).
    pub fn capture(&self, fault: Fault) {
        let record = FaultRecord::capture(fault);
        let retry_count = self.state().retry_count;

        METRICS.inc_faults_captured();
        obs::emit_fault_captured(self.name(), &record, retry_count);
        self.report(&record, retry_count);
        self.notify(&record);

        let mut inner = self.shared.lock();
        inner.cancel_pending();
        inner.state.phase = Phase::Faulted;
        inner.state.fault = Some(record.clone());

        let retry_count = inner.state.retry_count;
        if record.kind == FaultKind::NetworkLike && self.policy.allows(retry_count) {
            let delay = self.policy.delay_for(retry_count);
            if schedule(&self.shared, &mut inner, delay) {
                METRICS.inc_recoveries_scheduled();
                obs::emit_recovery_scheduled(self.name(), retry_count, delay);
            }
        }
        self.shared.publish(&inner.state);
    }

    /// Manual recovery: back to healthy with a fresh retry budget.
    pub fn retry(&self) {
        {
            let mut inner = self.shared.lock();
            inner.cancel_pending();
            inner.state = BoundaryState::healthy();
            self.shared.publish(&inner.state);
        }
        METRICS.inc_manual_retries();
        obs::emit_manual_retry(self.name());
    }

    /// Invoke the home action. Boundary state is left untouched.
    pub fn go_home(&self) {
        obs::emit_go_home(self.name());
        match &self.on_go_home {
            Some(hook) => {
                if panic::catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
                    error!(boundary = %self.name(), "home action panicked");
                }
            }
            None => info!(boundary = %self.name(), "no home action configured"),
        }
    }

    fn report(&self, record: &FaultRecord, retry_count: u32) {
        let context = json!({
            "boundary": self.name(),
            "kind": record.kind,
            "retryCount": retry_count,
        });
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatcher
                .report_error(record, Some(context), self.subject_id.as_deref())
        }));
        if outcome.is_err() {
            error!(boundary = %self.name(), "error reporting panicked");
        }
    }

    fn notify(&self, record: &FaultRecord) {
        if let Some(hook) = &self.on_fault {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(record))).is_err() {
                error!(boundary = %self.name(), "fault callback panicked");
            }
        }
    }
}

impl<V: Clone> FaultBoundary<V> {
    /// Render the protected subtree, or the fallback while faulted.
    ///
    /// `children` is not invoked while the boundary is faulted.
    pub fn render<F>(&self, children: F) -> Rendered<V>
    where
        F: FnOnce() -> Result<V, Fault>,
    {
        let _span = BoundarySpan::enter(self.name());

        let state = self.state();
        if state.is_faulted() {
            return self.fallback_for(&state);
        }

        let fault = match panic::catch_unwind(AssertUnwindSafe(children)) {
            Ok(Ok(view)) => return Rendered::Children(view),
            Ok(Err(fault)) => fault,
            Err(payload) => Fault::from_panic(payload),
        };
        self.capture(fault);
        self.fallback_for(&self.state())
    }

    fn fallback_for(&self, state: &BoundaryState) -> Rendered<V> {
        match &self.fallback {
            Some(fallback) => Rendered::Fallback(fallback.clone()),
            None => Rendered::Faulted(FallbackScreen::build(
                state.fault.as_ref(),
                state.retry_count,
                self.policy.max_retries,
            )),
        }
    }
}

impl<V> Drop for FaultBoundary<V> {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.mounted = false;
        inner.cancel_pending();
    }
}
