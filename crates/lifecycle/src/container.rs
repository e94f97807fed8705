//! Delegating container that can run `start`/`stop` on worker threads and
//! blocks the caller until the wrapped lifecycle converges.
//!
//! Convergence is signalled, not polled. The container registers a listener
//! on the wrapped lifecycle that wakes waiters on every commit, and each
//! worker posts its terminal outcome to the same watch before exiting. A
//! waiter returns once its worker has reported and the wrapped stage equals
//! the operation's target (or was committed since the wait began). It fails
//! with the worker's error, a [`LifecycleError::Timeout`], or a
//! [`LifecycleError::Cancelled`] when the [`CancelToken`] passed to that
//! particular wait is cancelled. Other waits on the same container are not
//! affected.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::engine::Lifecycle;
use crate::error::{LifecycleError, ListenerError};
use crate::listener::{ListenerId, StateListener};
use crate::stage::{Operation, Stage};

const CONTAINER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::container");

/// Default bound on how long `start`/`stop` wait for convergence.
pub const DEFAULT_CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the container runs the wrapped `start` and `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the calling thread.
    Inline,
    /// On a dedicated worker thread per call.
    #[default]
    SeparateThreads,
}

/// Construction options for [`Container`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Where `start` and `stop` execute.
    pub mode: ExecutionMode,
    /// Upper bound on each convergence wait.
    pub convergence_timeout: Duration,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            convergence_timeout: DEFAULT_CONVERGENCE_TIMEOUT,
        }
    }
}

/// Wraps a lifecycle and offers the same operations.
///
/// The container keeps no stage of its own: [`Lifecycle::current_stage`] and
/// listener registration read and write through to the wrapped lifecycle.
/// Clones share the same wrapped lifecycle and watch.
#[derive(Clone)]
pub struct Container {
    shared: Arc<Shared>,
}

struct Shared {
    lifecycle: Arc<dyn Lifecycle>,
    options: ContainerOptions,
    watch: Arc<StageWatch>,
    watch_listener: ListenerId,
    terminated: AtomicBool,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.lifecycle.remove_listener(self.watch_listener);
    }
}

impl Container {
    /// Wraps `lifecycle` using worker threads and the default timeout.
    pub fn new(lifecycle: Arc<dyn Lifecycle>) -> Self {
        Self::with_options(lifecycle, ContainerOptions::default())
    }

    /// Wraps `lifecycle` with explicit options.
    pub fn with_options(lifecycle: Arc<dyn Lifecycle>, options: ContainerOptions) -> Self {
        let watch = Arc::new(StageWatch::default());
        let watch_listener = lifecycle.add_listener(Arc::new(WatchListener {
            watch: Arc::clone(&watch),
        }));
        Self {
            shared: Arc::new(Shared {
                lifecycle,
                options,
                watch,
                watch_listener,
                terminated: AtomicBool::new(false),
            }),
        }
    }

    /// Options the container was built with.
    #[must_use]
    pub fn options(&self) -> ContainerOptions {
        self.shared.options
    }

    /// The wrapped lifecycle.
    #[must_use]
    pub fn managed(&self) -> &Arc<dyn Lifecycle> {
        &self.shared.lifecycle
    }

    /// Blocks until the wrapped lifecycle reaches `operation`'s target stage.
    ///
    /// `None` waits without a deadline.
    pub fn await_completion(
        &self,
        operation: Operation,
        timeout: Option<Duration>,
    ) -> Result<(), LifecycleError> {
        let ticket = self.shared.watch.issue(operation.target());
        self.shared.converge(operation, ticket, false, timeout, None)
    }

    /// Like [`Container::await_completion`], but gives up with
    /// [`LifecycleError::Cancelled`] once `cancel` is cancelled.
    pub fn await_completion_with(
        &self,
        operation: Operation,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<(), LifecycleError> {
        let ticket = self.shared.watch.issue(operation.target());
        self.shared.converge(operation, ticket, false, timeout, Some(cancel))
    }

    /// [`Lifecycle::start`] whose convergence wait ends early when `cancel`
    /// is cancelled. The worker keeps running.
    pub fn start_with(&self, cancel: &CancelToken) -> Result<(), LifecycleError> {
        self.run(Operation::Start, Some(cancel))
    }

    /// [`Lifecycle::stop`] whose convergence wait ends early when `cancel`
    /// is cancelled. The worker keeps running.
    pub fn stop_with(&self, cancel: &CancelToken) -> Result<(), LifecycleError> {
        self.run(Operation::Stop, Some(cancel))
    }

    /// Handle the composition root wires to process termination.
    #[must_use]
    pub fn termination_handle(&self) -> TerminationHandle {
        TerminationHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn run(
        &self,
        operation: Operation,
        cancel: Option<&CancelToken>,
    ) -> Result<(), LifecycleError> {
        let shared = &self.shared;
        let ticket = shared.watch.issue(operation.target());
        let timeout = Some(shared.options.convergence_timeout);
        match shared.options.mode {
            ExecutionMode::Inline => {
                invoke(shared.lifecycle.as_ref(), operation)?;
                shared.converge(operation, ticket, false, timeout, cancel)
            }
            ExecutionMode::SeparateThreads => {
                shared.dispatch(operation, ticket)?;
                shared.converge(operation, ticket, true, timeout, cancel)
            }
        }
    }
}

impl Shared {
    fn dispatch(&self, operation: Operation, ticket: Ticket) -> Result<(), LifecycleError> {
        let lifecycle = Arc::clone(&self.lifecycle);
        let watch = Arc::clone(&self.watch);
        let name = worker_name(operation, lifecycle.name());
        debug!(
            target: CONTAINER_TARGET,
            lifecycle = %lifecycle.name(),
            %operation,
            worker = %name,
            "dispatching lifecycle worker"
        );
        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let report = run_guarded(lifecycle.as_ref(), operation);
                watch.post(ticket, operation, report);
            })
            .map(drop)
            .map_err(|source| LifecycleError::WorkerSpawn { operation, source })
    }

    fn converge(
        &self,
        operation: Operation,
        ticket: Ticket,
        mut awaiting_report: bool,
        timeout: Option<Duration>,
        cancel: Option<&CancelToken>,
    ) -> Result<(), LifecycleError> {
        let target = operation.target();
        let started = Instant::now();
        let deadline = timeout.and_then(|limit| started.checked_add(limit));
        if let Some(cancel) = cancel {
            cancel.attach(&self.watch);
        }
        let mut state = self.watch.lock();
        loop {
            if awaiting_report && let Some(report) = state.take_report(ticket.id) {
                awaiting_report = false;
                match report {
                    WorkerReport::Completed(result) => result?,
                    WorkerReport::Skipped(observed) => {
                        accept_skipped(operation, observed)?;
                    }
                }
            }
            if !awaiting_report
                && (self.lifecycle.current_stage() == target
                    || state.arrivals(target) != ticket.arrivals)
            {
                return Ok(());
            }
            if cancel.is_some_and(CancelToken::is_cancelled) {
                state.abandon(ticket.id, awaiting_report);
                return Err(LifecycleError::Cancelled { operation, target });
            }
            state = match deadline {
                None => self
                    .watch
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    let remaining = deadline.saturating_duration_since(now);
                    if remaining.is_zero() {
                        state.abandon(ticket.id, awaiting_report);
                        return Err(LifecycleError::Timeout {
                            operation,
                            target,
                            waited: now.duration_since(started),
                        });
                    }
                    self.watch
                        .changed
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}

/// A skipped worker is fine when the owner is already at, or on its way to,
/// the target stage; anything else means the operation cannot apply.
fn accept_skipped(operation: Operation, observed: Stage) -> Result<(), LifecycleError> {
    if observed == operation.target() || Some(observed) == operation.intermediate() {
        Ok(())
    } else {
        Err(LifecycleError::IllegalTransition {
            operation,
            expected: operation.precondition(),
            actual: observed,
        })
    }
}

impl Lifecycle for Container {
    fn name(&self) -> &str {
        self.shared.lifecycle.name()
    }

    fn current_stage(&self) -> Stage {
        self.shared.lifecycle.current_stage()
    }

    fn init(&self) -> Result<(), LifecycleError> {
        self.shared.lifecycle.init()
    }

    fn start(&self) -> Result<(), LifecycleError> {
        self.run(Operation::Start, None)
    }

    fn pause(&self) -> Result<(), LifecycleError> {
        self.shared.lifecycle.pause()
    }

    fn resume(&self) -> Result<(), LifecycleError> {
        self.shared.lifecycle.resume()
    }

    fn stop(&self) -> Result<(), LifecycleError> {
        self.run(Operation::Stop, None)
    }

    fn add_listener(&self, listener: Arc<dyn StateListener>) -> ListenerId {
        self.shared.lifecycle.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.lifecycle.remove_listener(id)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("managed", &self.shared.lifecycle.name())
            .field("stage", &self.shared.lifecycle.current_stage())
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

/// One-shot entry point that forces a stop when the process is terminating.
///
/// Only the first [`TerminationHandle::trigger`] across all clones does any
/// work, and it only stops the lifecycle when it is `Running`. The handle
/// does not keep the container alive.
#[derive(Debug, Clone)]
pub struct TerminationHandle {
    shared: Weak<Shared>,
}

impl TerminationHandle {
    /// Runs the guarded stop path; returns whether a stop was performed.
    pub fn trigger(&self) -> Result<bool, LifecycleError> {
        let Some(shared) = self.shared.upgrade() else {
            return Ok(false);
        };
        if shared.terminated.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        let stage = shared.lifecycle.current_stage();
        info!(
            target: CONTAINER_TARGET,
            lifecycle = %shared.lifecycle.name(),
            %stage,
            "termination requested"
        );
        if stage != Stage::Running {
            return Ok(false);
        }
        Container { shared }
            .run(Operation::Stop, None)
            .map(|()| true)
    }

    /// Whether a trigger has already been consumed.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.terminated.load(Ordering::Acquire))
    }
}

/// Cancels the convergence waits it is passed to, and only those.
///
/// Clones share one flag. Cancelling releases the waiting caller with
/// [`LifecycleError::Cancelled`]; the worker running the operation is left
/// alone. A token stays cancelled, so later waits using it fail at once.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    watches: Mutex<Vec<Weak<StageWatch>>>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases every wait using this token.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let watches = self
            .inner
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for watch in watches.iter().filter_map(Weak::upgrade) {
            watch.wake();
        }
    }

    /// Whether [`CancelToken::cancel`] has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    // Registered before the waiter's first flag check so a concurrent
    // cancel either is seen by that check or wakes the condvar.
    fn attach(&self, watch: &Arc<StageWatch>) {
        let mut watches = self
            .inner
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        watches.retain(|known| known.strong_count() > 0);
        let target = Arc::downgrade(watch);
        if !watches.iter().any(|known| known.ptr_eq(&target)) {
            watches.push(target);
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn worker_name(operation: Operation, lifecycle: &str) -> String {
    let prefix = match operation {
        Operation::Stop => "shutdown",
        _ => "bootstrap",
    };
    format!("{prefix}-{lifecycle}")
}

fn invoke(lifecycle: &dyn Lifecycle, operation: Operation) -> Result<(), LifecycleError> {
    match operation {
        Operation::Init => lifecycle.init(),
        Operation::Start => lifecycle.start(),
        Operation::Pause => lifecycle.pause(),
        Operation::Resume => lifecycle.resume(),
        Operation::Stop => lifecycle.stop(),
    }
}

/// Worker body: re-check the precondition, then run the operation and
/// capture panics so the waiter always hears back.
fn run_guarded(lifecycle: &dyn Lifecycle, operation: Operation) -> WorkerReport {
    let observed = lifecycle.current_stage();
    if observed != operation.precondition() {
        return WorkerReport::Skipped(observed);
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| invoke(lifecycle, operation)));
    WorkerReport::Completed(result.unwrap_or(Err(LifecycleError::WorkerPanicked { operation })))
}

#[derive(Debug)]
enum WorkerReport {
    Completed(Result<(), LifecycleError>),
    Skipped(Stage),
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    id: u64,
    /// Commits into the target stage seen when the ticket was issued.
    arrivals: u64,
}

#[derive(Debug, Default)]
struct StageWatch {
    state: Mutex<WatchState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct WatchState {
    next_ticket: u64,
    reports: Vec<(u64, WorkerReport)>,
    abandoned: Vec<u64>,
    arrivals: [u64; Stage::ALL.len()],
}

impl WatchState {
    fn arrivals(&self, stage: Stage) -> u64 {
        self.arrivals
            .get(usize::from(stage.code()))
            .copied()
            .unwrap_or_default()
    }

    fn take_report(&mut self, id: u64) -> Option<WorkerReport> {
        let index = self.reports.iter().position(|(ticket, _)| *ticket == id)?;
        Some(self.reports.swap_remove(index).1)
    }

    fn abandon(&mut self, id: u64, report_pending: bool) {
        if report_pending {
            self.abandoned.push(id);
        }
    }
}

impl StageWatch {
    fn lock(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(&self, target: Stage) -> Ticket {
        let mut state = self.lock();
        let id = state.next_ticket;
        state.next_ticket += 1;
        Ticket {
            id,
            arrivals: state.arrivals(target),
        }
    }

    fn post(&self, ticket: Ticket, operation: Operation, report: WorkerReport) {
        let mut state = self.lock();
        if let Some(index) = state.abandoned.iter().position(|id| *id == ticket.id) {
            state.abandoned.swap_remove(index);
            // Nobody is waiting any more; the caller already saw an unknown outcome.
            warn!(
                target: CONTAINER_TARGET,
                %operation,
                ?report,
                "lifecycle worker finished after its caller stopped waiting"
            );
        } else {
            state.reports.push((ticket.id, report));
        }
        self.changed.notify_all();
    }

    fn wake(&self) {
        let _state = self.lock();
        self.changed.notify_all();
    }

    fn arrive(&self, stage: Stage) {
        let mut state = self.lock();
        if let Some(count) = state.arrivals.get_mut(usize::from(stage.code())) {
            *count += 1;
        }
        self.changed.notify_all();
    }
}

struct WatchListener {
    watch: Arc<StageWatch>,
}

impl StateListener for WatchListener {
    fn state_changed(&self, _from: Stage, to: Stage) -> Result<(), ListenerError> {
        self.watch.arrive(to);
        Ok(())
    }
}
