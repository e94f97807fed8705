//! Composition root for a lifecycle-managed daemon.
//!
//! The daemon loads its configuration through [`lifecycle_config`], installs
//! structured telemetry, resolves the application environment and wraps a
//! sample TCP echo service in a [`lifecycle::Container`]. When the shutdown
//! hook is enabled a watcher thread forwards SIGTERM, SIGINT, SIGQUIT and
//! SIGHUP to the container's termination handle so the service is stopped
//! exactly once before the process exits.
//!
//! Health reporting hooks emit a structured event at each step of the launch
//! and shutdown sequence.

mod bootstrap;
mod health;
mod process;
mod service;
mod telemetry;

pub use bootstrap::{
    COMPONENT_NAME, Component, ConfigLoader, EnvironmentLoader, ProcessEnvironmentLoader,
    StaticConfigLoader, StaticEnvironmentLoader, SystemConfigLoader, container_options,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run};
pub use service::{EchoService, ServiceError, resolve_listen_address};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
