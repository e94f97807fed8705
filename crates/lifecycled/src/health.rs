//! Structured health reporting for daemon launch and shutdown events.

use std::net::SocketAddr;
use std::sync::Arc;

use lifecycle_config::Config;

use crate::process::LaunchError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface daemon events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn launch_starting(&self);

    /// Invoked once configuration and telemetry are in place.
    fn configuration_loaded(&self, config: &Config);

    /// Invoked when the managed component reaches `Running`.
    fn component_ready(&self, name: &str, address: Option<SocketAddr>);

    /// Invoked when termination was requested.
    fn termination_requested(&self, name: &str);

    /// Invoked once the managed component has stopped.
    fn shutdown_completed(&self, name: &str);

    /// Invoked when the launch fails at any step.
    fn launch_failed(&self, error: &LaunchError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn launch_starting(&self) {
        (**self).launch_starting();
    }

    fn configuration_loaded(&self, config: &Config) {
        (**self).configuration_loaded(config);
    }

    fn component_ready(&self, name: &str, address: Option<SocketAddr>) {
        (**self).component_ready(name, address);
    }

    fn termination_requested(&self, name: &str) {
        (**self).termination_requested(name);
    }

    fn shutdown_completed(&self, name: &str) {
        (**self).shutdown_completed(name);
    }

    fn launch_failed(&self, error: &LaunchError) {
        (**self).launch_failed(error);
    }
}

/// Default reporter that records daemon events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn launch_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "launch_starting",
            "starting lifecycle daemon"
        );
    }

    fn configuration_loaded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "configuration_loaded",
            separate_threads = config.separate_threads(),
            shutdown_hook = config.shutdown_hook(),
            convergence_timeout_ms = config.convergence_timeout_ms,
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "configuration loaded"
        );
    }

    fn component_ready(&self, name: &str, address: Option<SocketAddr>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "component_ready",
            component = name,
            address = ?address,
            "component running"
        );
    }

    fn termination_requested(&self, name: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "termination_requested",
            component = name,
            "termination requested"
        );
    }

    fn shutdown_completed(&self, name: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_completed",
            component = name,
            "component stopped"
        );
    }

    fn launch_failed(&self, error: &LaunchError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "launch_failed",
            error = %error,
            "daemon launch failed"
        );
    }
}
