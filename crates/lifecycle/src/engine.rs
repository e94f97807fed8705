//! The transition engine: one atomic stage cell, guarded operations and
//! synchronous listener fan-out.

use std::any::type_name;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::error::{HookError, LifecycleError};
use crate::hooks::LifecycleHooks;
use crate::listener::{ListenerId, ListenerRegistry, StateListener};
use crate::stage::{Operation, Stage};

const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Suffixes default owner names so owners of one hook type stay distinct.
static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Operation surface shared by the engine and the container.
pub trait Lifecycle: Send + Sync {
    /// Identity used in worker thread names and log fields.
    fn name(&self) -> &str;

    /// Reads the current stage.
    fn current_stage(&self) -> Stage;

    /// `Stopped -> Initialized`; the hook runs before the commit.
    fn init(&self) -> Result<(), LifecycleError>;

    /// `Initialized -> Starting -> Running`; the hook runs while `Starting`.
    fn start(&self) -> Result<(), LifecycleError>;

    /// `Running -> Paused`; the hook runs before the commit.
    fn pause(&self) -> Result<(), LifecycleError>;

    /// `Paused -> Running`; the hook runs before the commit.
    fn resume(&self) -> Result<(), LifecycleError>;

    /// `Running -> Stopping -> Stopped`; the hook runs while `Stopping`.
    fn stop(&self) -> Result<(), LifecycleError>;

    /// Registers a listener for subsequent transitions.
    fn add_listener(&self, listener: Arc<dyn StateListener>) -> ListenerId;

    /// Unregisters a listener; returns whether it was registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

impl<T> Lifecycle for Arc<T>
where
    T: Lifecycle + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn current_stage(&self) -> Stage {
        (**self).current_stage()
    }

    fn init(&self) -> Result<(), LifecycleError> {
        (**self).init()
    }

    fn start(&self) -> Result<(), LifecycleError> {
        (**self).start()
    }

    fn pause(&self) -> Result<(), LifecycleError> {
        (**self).pause()
    }

    fn resume(&self) -> Result<(), LifecycleError> {
        (**self).resume()
    }

    fn stop(&self) -> Result<(), LifecycleError> {
        (**self).stop()
    }

    fn add_listener(&self, listener: Arc<dyn StateListener>) -> ListenerId {
        (**self).add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        (**self).remove_listener(id)
    }
}

/// Owns a managed component's stage and drives its hooks.
///
/// The compare-and-swap on the stage cell is the only synchronisation: when
/// two threads race the same operation exactly one commit succeeds and the
/// other caller receives [`LifecycleError::IllegalTransition`].
///
/// A failing `do_start` or `do_stop` leaves the owner in `Starting` or
/// `Stopping`. That stage is never rolled back; it signals an interrupted
/// transition that needs supervision.
pub struct LifecycleOwner<H> {
    name: String,
    stage: AtomicU8,
    listeners: ListenerRegistry,
    hooks: H,
}

impl<H> LifecycleOwner<H>
where
    H: LifecycleHooks,
{
    /// Builds an owner in `Stopped`, named after the innermost hook type plus
    /// a process-wide sequence number (`Arc<app::Server>` becomes `Server-1`,
    /// the next such owner `Server-2`).
    pub fn new(hooks: H) -> Self {
        let full = type_name::<H>();
        let innermost = full.rsplit('<').next().unwrap_or(full);
        let short = innermost
            .trim_end_matches('>')
            .rsplit("::")
            .next()
            .unwrap_or(innermost);
        let id = NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed);
        Self::named(format!("{short}-{id}"), hooks)
    }

    /// Builds an owner in `Stopped` with an explicit identity.
    pub fn named(name: impl Into<String>, hooks: H) -> Self {
        Self {
            name: name.into(),
            stage: AtomicU8::new(Stage::Stopped.code()),
            listeners: ListenerRegistry::new(),
            hooks,
        }
    }

    /// The managed component.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn load(&self) -> Stage {
        decode(self.stage.load(Ordering::Acquire))
    }

    /// Commits `from -> to` and notifies listeners.
    fn change_stage(
        &self,
        operation: Operation,
        from: Stage,
        to: Stage,
    ) -> Result<(), LifecycleError> {
        debug_assert!(from.can_transition_to(to));
        self.stage
            .compare_exchange(from.code(), to.code(), Ordering::AcqRel, Ordering::Acquire)
            .map_err(|actual| LifecycleError::illegal(operation, from, decode(actual)))?;
        debug!(
            target: ENGINE_TARGET,
            lifecycle = %self.name,
            %operation,
            %from,
            %to,
            "stage committed"
        );
        self.listeners
            .publish(from, to)
            .map_err(|source| LifecycleError::Listener { from, to, source })
    }

    fn hook_failed(&self, operation: Operation, source: HookError) -> LifecycleError {
        let stage = self.load();
        warn!(
            target: ENGINE_TARGET,
            lifecycle = %self.name,
            %operation,
            %stage,
            error = %source,
            "lifecycle hook failed"
        );
        LifecycleError::Hook {
            operation,
            stage,
            source,
        }
    }

    /// Runs the hook first, then commits precondition -> target.
    ///
    /// The hook runs whatever the current stage is; a wrong stage only
    /// surfaces at the commit, leaving the stage unchanged.
    fn hook_then_commit(
        &self,
        operation: Operation,
        hook: impl FnOnce(&H) -> Result<(), HookError>,
    ) -> Result<(), LifecycleError> {
        hook(&self.hooks).map_err(|source| self.hook_failed(operation, source))?;
        self.change_stage(operation, operation.precondition(), operation.target())
    }

    /// Commits precondition -> intermediate, runs the hook, then commits
    /// intermediate -> target.
    fn bracket_hook(
        &self,
        operation: Operation,
        intermediate: Stage,
        hook: impl FnOnce(&H) -> Result<(), HookError>,
    ) -> Result<(), LifecycleError> {
        self.change_stage(operation, operation.precondition(), intermediate)?;
        hook(&self.hooks).map_err(|source| self.hook_failed(operation, source))?;
        self.change_stage(operation, intermediate, operation.target())
    }
}

impl<H> Lifecycle for LifecycleOwner<H>
where
    H: LifecycleHooks,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn current_stage(&self) -> Stage {
        self.load()
    }

    fn init(&self) -> Result<(), LifecycleError> {
        self.hook_then_commit(Operation::Init, H::do_init)
    }

    fn start(&self) -> Result<(), LifecycleError> {
        self.bracket_hook(Operation::Start, Stage::Starting, H::do_start)
    }

    fn pause(&self) -> Result<(), LifecycleError> {
        self.hook_then_commit(Operation::Pause, H::do_pause)
    }

    fn resume(&self) -> Result<(), LifecycleError> {
        self.hook_then_commit(Operation::Resume, H::do_resume)
    }

    fn stop(&self) -> Result<(), LifecycleError> {
        self.bracket_hook(Operation::Stop, Stage::Stopping, H::do_stop)
    }

    fn add_listener(&self, listener: Arc<dyn StateListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl<H> std::fmt::Debug for LifecycleOwner<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleOwner")
            .field("name", &self.name)
            .field("stage", &decode(self.stage.load(Ordering::Acquire)))
            .finish_non_exhaustive()
    }
}

// The cell only ever holds codes produced by `Stage::code`.
fn decode(code: u8) -> Stage {
    Stage::from_code(code).unwrap_or(Stage::Stopped)
}
