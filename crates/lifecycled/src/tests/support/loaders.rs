//! Configuration and environment fixtures for launch tests.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::Arc;

use lifecycle_config::{APPLICATION_NAME, Config, Environment};
use ortho_config::{OrthoConfig, OrthoError};

use crate::bootstrap::COMPONENT_NAME;

/// Configuration binding an ephemeral loopback port.
pub fn test_config(separate_threads: bool, shutdown_hook: bool) -> Config {
    Config {
        separate_threads: Some(separate_threads),
        shutdown_hook: Some(shutdown_hook),
        convergence_timeout_ms: 5_000,
        listen_address: String::from("127.0.0.1:0"),
        ..Config::default()
    }
}

/// Environment naming the echo application, optionally with extra entries.
pub fn echo_environment<const N: usize>(extra: [(&str, &str); N]) -> Environment {
    let mut values = BTreeMap::from([(String::from(APPLICATION_NAME), String::from(COMPONENT_NAME))]);
    values.extend(
        extra
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned())),
    );
    Environment::from_map(values)
}

/// A real loader error produced from an unparsable command-line flag.
pub fn failing_config_load() -> Result<Config, Arc<OrthoError>> {
    Config::load_from_iter([
        OsString::from("lifecycled"),
        OsString::from("--convergence-timeout-ms"),
        OsString::from("soon"),
    ])
}
