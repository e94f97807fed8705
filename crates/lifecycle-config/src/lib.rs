//! Shared configuration for the lifecycle daemon.
//!
//! [`Config`] is layered by `ortho_config`: built-in defaults, then a
//! `lifecycle.toml` file (or the file named by `--config-path` /
//! `LIFECYCLE_CONFIG_PATH`), then `LIFECYCLE_*` environment variables, then
//! CLI flags. [`Environment`] is the separate key/value view a managed
//! application reads its own name, roots and server address from.

mod defaults;
mod environment;
mod logging;
mod runtime_mode;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CONVERGENCE_TIMEOUT_MS, DEFAULT_LISTEN_ADDRESS, DEFAULT_LOG_FILTER,
    DEFAULT_SEPARATE_THREADS, DEFAULT_SHUTDOWN_HOOK,
    default_convergence_timeout, default_listen_address_string, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use environment::{
    APPLICATION_NAME, ENVIRONMENT_FILE, ENVIRONMENT_NAME, Environment, EnvironmentError,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime_mode::RuntimeMode;

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "LIFECYCLE")]
pub struct Config {
    /// Run `start`/`stop` on dedicated worker threads; `true` when unset.
    pub separate_threads: Option<bool>,
    /// Stop the managed component when the process is asked to terminate;
    /// `true` when unset.
    pub shutdown_hook: Option<bool>,
    /// Upper bound on each convergence wait, in milliseconds.
    #[ortho_config(default = DEFAULT_CONVERGENCE_TIMEOUT_MS)]
    pub convergence_timeout_ms: u64,
    /// Fallback address for the sample service.
    #[ortho_config(default = default_listen_address_string())]
    pub listen_address: String,
    /// `tracing` filter directive.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            separate_threads: None,
            shutdown_hook: None,
            convergence_timeout_ms: DEFAULT_CONVERGENCE_TIMEOUT_MS,
            listen_address: default_listen_address_string(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Whether the container runs `start`/`stop` on worker threads.
    #[must_use]
    pub fn separate_threads(&self) -> bool {
        self.separate_threads.unwrap_or(DEFAULT_SEPARATE_THREADS)
    }

    /// Whether termination signals stop the managed component.
    #[must_use]
    pub fn shutdown_hook(&self) -> bool {
        self.shutdown_hook.unwrap_or(DEFAULT_SHUTDOWN_HOOK)
    }

    /// Upper bound on each convergence wait.
    #[must_use]
    pub fn convergence_timeout(&self) -> Duration {
        Duration::from_millis(self.convergence_timeout_ms)
    }

    /// Fallback address for the sample service.
    #[must_use]
    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    /// `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::{Config, LogFormat};

    #[rstest]
    fn default_matches_documented_values() {
        let config = Config::default();
        assert!(config.separate_threads());
        assert!(config.shutdown_hook());
        assert_eq!(config.convergence_timeout(), Duration::from_secs(30));
        assert_eq!(config.listen_address(), "127.0.0.1:0");
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
    }

    #[rstest]
    #[case(Some(false), false)]
    #[case(Some(true), true)]
    #[case(None, true)]
    fn unset_switches_fall_back_to_enabled(#[case] value: Option<bool>, #[case] expected: bool) {
        let config = Config {
            separate_threads: value,
            shutdown_hook: value,
            ..Config::default()
        };
        assert_eq!(config.separate_threads(), expected);
        assert_eq!(config.shutdown_hook(), expected);
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("COMPACT", LogFormat::Compact)]
    fn log_format_parses_case_insensitively(#[case] text: &str, #[case] expected: LogFormat) {
        assert_eq!(text.parse::<LogFormat>().ok(), Some(expected));
    }
}
