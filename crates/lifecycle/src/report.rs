//! Structured reporting of committed stage transitions.

use crate::error::ListenerError;
use crate::listener::StateListener;
use crate::stage::Stage;

const STAGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::stage");

/// Listener that records every committed transition using `tracing`.
#[derive(Debug, Clone)]
pub struct StructuredStageReporter {
    lifecycle: String,
}

impl StructuredStageReporter {
    /// Builds a reporter that tags events with the lifecycle's name.
    #[must_use]
    pub fn new(lifecycle: impl Into<String>) -> Self {
        Self {
            lifecycle: lifecycle.into(),
        }
    }
}

impl StateListener for StructuredStageReporter {
    fn state_changed(&self, from: Stage, to: Stage) -> Result<(), ListenerError> {
        match to {
            Stage::Running | Stage::Stopped | Stage::Paused | Stage::Initialized => {
                tracing::info!(
                    target: STAGE_TARGET,
                    event = "stage_changed",
                    lifecycle = %self.lifecycle,
                    %from,
                    %to,
                    "lifecycle stage changed"
                );
            }
            Stage::Starting | Stage::Stopping => {
                tracing::debug!(
                    target: STAGE_TARGET,
                    event = "stage_changing",
                    lifecycle = %self.lifecycle,
                    %from,
                    %to,
                    "lifecycle stage transition in progress"
                );
            }
        }
        Ok(())
    }
}
