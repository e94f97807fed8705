//! Process supervision: signal handling, termination wiring and the launch
//! sequence.

mod errors;
pub(crate) mod launch;
pub(crate) mod shutdown;
pub(crate) mod termination;

pub use errors::LaunchError;
pub use launch::run;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
