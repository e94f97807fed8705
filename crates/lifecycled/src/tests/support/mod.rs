//! Test doubles shared by the daemon suites.

mod loaders;
mod reporter;
mod shutdown;

pub use loaders::{echo_environment, failing_config_load, test_config};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use shutdown::TestShutdownSignal;
