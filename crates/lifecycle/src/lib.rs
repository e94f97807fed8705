//! Lifecycle state machine for managed components.
//!
//! A [`LifecycleOwner`] holds a component's [`Stage`] in a single atomic cell
//! and moves it through the fixed graph
//! `Stopped -> Initialized -> Starting -> Running <-> Paused`,
//! `Running -> Stopping -> Stopped`. Each operation checks its precondition
//! with a compare-and-swap, runs the component's [`LifecycleHooks`], commits
//! the new stage and then notifies every registered [`StateListener`] in
//! registration order on the committing thread.
//!
//! A [`Container`] wraps any [`Lifecycle`] and can run `start`/`stop` on
//! named worker threads. Callers block until the wrapped lifecycle converges
//! on the target stage. Waits are bounded, can be cancelled per call through
//! a [`CancelToken`], and relay worker failures instead of losing them. The
//! container's [`TerminationHandle`] is the single force-stop entry point a
//! composition root wires to process termination signals; this crate installs
//! no signal handlers itself.
//!
//! Errors distinguish operations that never ran, operations that failed
//! mid-flight, and waits whose outcome is unknown; see [`Outcome`].

mod container;
mod engine;
mod error;
mod hooks;
mod listener;
mod report;
mod stage;

pub use container::{
    CancelToken, Container, ContainerOptions, DEFAULT_CONVERGENCE_TIMEOUT, ExecutionMode,
    TerminationHandle,
};
pub use engine::{Lifecycle, LifecycleOwner};
pub use error::{HookError, LifecycleError, ListenerError, Outcome};
pub use hooks::LifecycleHooks;
pub use listener::{ListenerId, StateListener};
pub use report::StructuredStageReporter;
pub use stage::{Operation, Stage};

#[cfg(test)]
mod tests;
