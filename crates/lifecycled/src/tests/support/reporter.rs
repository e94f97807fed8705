//! Test double for [`HealthReporter`] that records events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use lifecycle_config::Config;

use crate::health::HealthReporter;
use crate::process::LaunchError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    LaunchStarting,
    ConfigurationLoaded,
    ComponentReady {
        name: String,
        address: Option<SocketAddr>,
    },
    TerminationRequested(String),
    ShutdownCompleted(String),
    LaunchFailed(String),
}

/// Records health events in arrival order.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Polls until the component reports ready, returning its bound address.
    pub fn wait_for_ready(&self, timeout: Duration) -> Result<SocketAddr, String> {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.events();
            if let Some(address) = events.iter().find_map(|event| match event {
                HealthEvent::ComponentReady { address, .. } => Some(*address),
                _ => None,
            }) {
                return address.ok_or_else(|| String::from("component reported no address"));
            }
            if let Some(HealthEvent::LaunchFailed(message)) = events.last() {
                return Err(format!("launch failed: {message}"));
            }
            if Instant::now() >= deadline {
                return Err(format!("component not ready after {timeout:?}: {events:?}"));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn launch_starting(&self) {
        self.record(HealthEvent::LaunchStarting);
    }

    fn configuration_loaded(&self, _config: &Config) {
        self.record(HealthEvent::ConfigurationLoaded);
    }

    fn component_ready(&self, name: &str, address: Option<SocketAddr>) {
        self.record(HealthEvent::ComponentReady {
            name: name.to_owned(),
            address,
        });
    }

    fn termination_requested(&self, name: &str) {
        self.record(HealthEvent::TerminationRequested(name.to_owned()));
    }

    fn shutdown_completed(&self, name: &str) {
        self.record(HealthEvent::ShutdownCompleted(name.to_owned()));
    }

    fn launch_failed(&self, error: &LaunchError) {
        self.record(HealthEvent::LaunchFailed(error.to_string()));
    }
}
