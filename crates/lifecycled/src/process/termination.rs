//! Bridges process shutdown signals to a container's termination handle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use lifecycle::{LifecycleError, TerminationHandle};

use crate::health::HealthReporter;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownError, ShutdownSignal};

/// Failures the watcher thread can hit.
#[derive(Debug)]
enum WatchFailure {
    Shutdown(ShutdownError),
    Lifecycle(LifecycleError),
}

impl From<WatchFailure> for LaunchError {
    fn from(failure: WatchFailure) -> Self {
        match failure {
            WatchFailure::Shutdown(source) => Self::Shutdown { source },
            WatchFailure::Lifecycle(source) => Self::Lifecycle { source },
        }
    }
}

/// Thread that waits for a shutdown signal and then forces a stop through a
/// [`TerminationHandle`].
#[derive(Debug)]
pub(crate) struct TerminationWatcher {
    handle: JoinHandle<Result<bool, WatchFailure>>,
}

impl TerminationWatcher {
    /// Spawns the watcher as `termination-<component>`.
    pub(crate) fn spawn<S>(
        component: &str,
        shutdown: S,
        termination: TerminationHandle,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<Self, LaunchError>
    where
        S: ShutdownSignal + 'static,
    {
        let name = component.to_owned();
        let handle = thread::Builder::new()
            .name(format!("termination-{component}"))
            .spawn(move || {
                shutdown.wait().map_err(WatchFailure::Shutdown)?;
                reporter.termination_requested(&name);
                let stopped = termination.trigger().map_err(WatchFailure::Lifecycle)?;
                debug!(
                    target: PROCESS_TARGET,
                    component = %name,
                    stopped,
                    "termination handle consumed"
                );
                Ok(stopped)
            })
            .map_err(|source| LaunchError::WatcherSpawn { source })?;
        Ok(Self { handle })
    }

    /// Waits for the watcher; `Ok(true)` when it performed the stop itself.
    pub(crate) fn join(self) -> Result<bool, LaunchError> {
        let outcome = self
            .handle
            .join()
            .map_err(|_| LaunchError::WatcherPanicked)?;
        Ok(outcome?)
    }
}
