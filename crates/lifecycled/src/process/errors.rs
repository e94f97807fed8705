//! Defines the error surface for daemon launch and supervision.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use lifecycle::LifecycleError;
use lifecycle_config::EnvironmentError;
use ortho_config::OrthoError;

use crate::telemetry::TelemetryError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The application environment could not be resolved.
    #[error("failed to resolve environment: {source}")]
    Environment {
        /// Underlying environment error.
        #[source]
        source: EnvironmentError,
    },
    /// A lifecycle operation on the managed component failed.
    #[error("lifecycle operation failed: {source}")]
    Lifecycle {
        /// Underlying lifecycle error.
        #[source]
        source: LifecycleError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The termination watcher thread could not be spawned.
    #[error("failed to spawn termination watcher: {source}")]
    WatcherSpawn {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The termination watcher thread panicked.
    #[error("termination watcher panicked")]
    WatcherPanicked,
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<EnvironmentError> for LaunchError {
    fn from(source: EnvironmentError) -> Self {
        Self::Environment { source }
    }
}

impl From<LifecycleError> for LaunchError {
    fn from(source: LifecycleError) -> Self {
        Self::Lifecycle { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
