use std::time::Duration;

use crate::logging::LogFormat;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default address the sample service binds; port `0` asks the OS for one.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:0";

/// Default bound, in milliseconds, on each container convergence wait.
pub const DEFAULT_CONVERGENCE_TIMEOUT_MS: u64 = 30_000;

/// Whether `start`/`stop` run on worker threads when nothing says otherwise.
pub const DEFAULT_SEPARATE_THREADS: bool = true;

/// Whether termination signals stop the component when nothing says otherwise.
pub const DEFAULT_SHUTDOWN_HOOK: bool = true;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned listen address used where allocation is required.
pub fn default_listen_address_string() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

/// Default convergence timeout as a [`Duration`].
pub fn default_convergence_timeout() -> Duration {
    Duration::from_millis(DEFAULT_CONVERGENCE_TIMEOUT_MS)
}
