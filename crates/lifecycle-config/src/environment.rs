//! Read-only key/value view of the environment an application runs in.
//!
//! Values are layered: a caller-supplied base map, then the process
//! environment, then an optional properties file named by the
//! [`ENVIRONMENT_FILE`] key. Later layers override earlier ones. Application
//! specific keys are derived from [`APPLICATION_NAME`], so an application
//! named `shop` reads its root from `shop.root` and its port from
//! `shop.server.port`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::num::ParseIntError;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::runtime_mode::RuntimeMode;

/// Key naming a properties file whose entries override every other layer.
pub const ENVIRONMENT_FILE: &str = "environment.file";
/// Key naming the environment, e.g. `development` or `production`.
pub const ENVIRONMENT_NAME: &str = "environment.name";
/// Key naming the application.
pub const APPLICATION_NAME: &str = "application.name";

const DEFAULT_ENVIRONMENT_NAME: &str = "development";
const DEFAULT_LOGS_DIRECTORY: &str = "logs";
const ROOT_SUFFIX: &str = ".root";
const LOGS_ROOT_SUFFIX: &str = ".logs.root";
const LOG_FILE_SUFFIX: &str = ".log";
const ACCESS_LOG_FILE_SUFFIX: &str = "-access.log";
const LOG_FILE_ROTATE_PATTERN_SUFFIX: &str = ".%d{yyyy-MM-dd}";
const ACCESS_LOG_FILE_ROTATE_PATTERN: &str = ".yyyy-MM-dd";
const SERVER_HOST_SUFFIX: &str = ".server.host";
const SERVER_PORT_SUFFIX: &str = ".server.port";

/// Errors raised while assembling or reading an [`Environment`].
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The properties file exists but could not be read.
    #[error("cannot load environment from '{path}': {source}")]
    ReadFile {
        /// Path taken from the [`ENVIRONMENT_FILE`] key.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A port value was not a valid TCP port number.
    #[error("invalid port '{value}' for key '{key}': {source}")]
    InvalidPort {
        /// Key the value was read from.
        key: String,
        /// Offending value.
        value: String,
        /// Parse failure.
        #[source]
        source: ParseIntError,
    },
}

/// Immutable key/value environment.
///
/// Paths are made absolute against the working directory when the
/// environment is built; nothing checks that they exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    values: BTreeMap<String, String>,
    application: Option<String>,
    name: Option<String>,
    root: Option<Utf8PathBuf>,
    logs_root: Option<Utf8PathBuf>,
}

impl Environment {
    /// Layers `base`, the process environment and the optional environment
    /// file.
    pub fn load(base: BTreeMap<String, String>) -> Result<Self, EnvironmentError> {
        Self::load_from(base, std::env::vars_os())
    }

    /// Layers `base`, the supplied variables and the optional environment
    /// file. Variables that are not valid UTF-8 are skipped.
    pub fn load_from<I>(
        base: BTreeMap<String, String>,
        variables: I,
    ) -> Result<Self, EnvironmentError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut values = base;
        values.extend(
            variables
                .into_iter()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?))),
        );
        if let Some(path) = values.get(ENVIRONMENT_FILE).map(Utf8PathBuf::from) {
            values.extend(read_properties(&path)?);
        }
        Ok(Self::from_map(values))
    }

    /// Builds an environment from `values` alone, naming the application
    /// after the [`APPLICATION_NAME`] entry.
    #[must_use]
    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        let application = values.get(APPLICATION_NAME).cloned();
        Self::with_application(values, application)
    }

    /// Builds an environment from `values` with an explicit application name.
    #[must_use]
    pub fn with_application(values: BTreeMap<String, String>, application: Option<String>) -> Self {
        let lookup = |suffix: &str| {
            application
                .as_deref()
                .and_then(|app| values.get(&format!("{app}{suffix}")))
                .map(|path| absolute(path))
        };
        let root = lookup(ROOT_SUFFIX);
        let logs_root = lookup(LOGS_ROOT_SUFFIX)
            .or_else(|| root.as_ref().map(|root| root.join(DEFAULT_LOGS_DIRECTORY)));
        Self {
            name: values.get(ENVIRONMENT_NAME).cloned(),
            values,
            application,
            root,
            logs_root,
        }
    }

    /// Environment name, `development` unless configured.
    #[must_use]
    pub fn environment_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_ENVIRONMENT_NAME)
    }

    /// Mode derived from [`Environment::environment_name`].
    #[must_use]
    pub fn runtime_mode(&self) -> RuntimeMode {
        RuntimeMode::from_environment_name(self.environment_name())
    }

    /// Application name, if configured.
    #[must_use]
    pub fn application_name(&self) -> Option<&str> {
        self.application.as_deref()
    }

    /// Absolute application root, from `<app>.root`.
    #[must_use]
    pub fn application_root(&self) -> Option<&Utf8Path> {
        self.root.as_deref()
    }

    /// Absolute log directory, from `<app>.logs.root` or `<root>/logs`.
    #[must_use]
    pub fn application_logs_root(&self) -> Option<&Utf8Path> {
        self.logs_root.as_deref()
    }

    /// `<app>.log`.
    #[must_use]
    pub fn log_file_name(&self) -> Option<String> {
        self.with_app(|app| format!("{app}{LOG_FILE_SUFFIX}"))
    }

    /// `<app>.log` followed by a daily rotation pattern.
    #[must_use]
    pub fn rotating_log_file_pattern(&self) -> Option<String> {
        self.with_app(|app| format!("{app}{LOG_FILE_SUFFIX}{LOG_FILE_ROTATE_PATTERN_SUFFIX}"))
    }

    /// `<app>-access.log`.
    #[must_use]
    pub fn access_log_file_name(&self) -> Option<String> {
        self.with_app(|app| format!("{app}{ACCESS_LOG_FILE_SUFFIX}"))
    }

    /// `<app>-access.log` followed by a daily rotation pattern.
    #[must_use]
    pub fn rotating_access_log_file_name(&self) -> Option<String> {
        self.with_app(|app| format!("{app}{ACCESS_LOG_FILE_SUFFIX}{ACCESS_LOG_FILE_ROTATE_PATTERN}"))
    }

    /// `/<app>`.
    #[must_use]
    pub fn context_path(&self) -> Option<String> {
        self.with_app(|app| format!("/{app}"))
    }

    /// Host from `<app>.server.host`.
    #[must_use]
    pub fn server_host(&self) -> Option<&str> {
        let app = self.application.as_deref()?;
        self.value(&format!("{app}{SERVER_HOST_SUFFIX}"))
    }

    /// Port from `<app>.server.port`; `Ok(None)` when unset.
    pub fn server_port(&self) -> Result<Option<u16>, EnvironmentError> {
        let Some(app) = self.application.as_deref() else {
            return Ok(None);
        };
        let key = format!("{app}{SERVER_PORT_SUFFIX}");
        let Some(value) = self.value(&key) else {
            return Ok(None);
        };
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|source| EnvironmentError::InvalidPort {
                value: value.to_owned(),
                key,
                source,
            })
    }

    /// Raw value for `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Raw value for `key`, or the fallback's result when absent.
    pub fn value_or_else(&self, key: &str, fallback: impl FnOnce() -> String) -> String {
        self.value(key).map_or_else(fallback, ToOwned::to_owned)
    }

    /// Every resolved entry.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Multi-line, right-aligned summary of the environment.
    #[must_use]
    pub fn description(&self) -> String {
        let port = match self.server_port() {
            Ok(Some(port)) => port.to_string(),
            Ok(None) => String::from("-"),
            Err(_) => String::from("invalid"),
        };
        let rows = [
            (
                "OS",
                format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            ),
            ("Environment Ver.", env!("CARGO_PKG_VERSION").to_owned()),
            ("Environment Name", self.environment_name().to_owned()),
            ("Runtime Mode", self.runtime_mode().to_string()),
            ("Application", display(self.application_name())),
            ("Application Root", display(self.application_root())),
            ("Application Logs", display(self.application_logs_root())),
            ("Server Host", display(self.server_host())),
            ("Server Port", port),
        ];
        let mut description = String::from("\n\n");
        for (label, value) in rows {
            // Writing to a String cannot fail.
            let _ = writeln!(description, "{label:>24}     {value}");
        }
        description.push('\n');
        description
    }

    fn with_app(&self, render: impl FnOnce(&str) -> String) -> Option<String> {
        self.application.as_deref().map(render)
    }
}

fn display(value: Option<impl std::fmt::Display>) -> String {
    value.map_or_else(|| String::from("-"), |value| value.to_string())
}

fn absolute(path: &str) -> Utf8PathBuf {
    std::path::absolute(path)
        .ok()
        .and_then(|resolved| Utf8PathBuf::from_path_buf(resolved).ok())
        .unwrap_or_else(|| Utf8PathBuf::from(path))
}

/// Reads `key=value` (or `key: value`) lines. A missing file contributes
/// nothing; any other read failure is an error.
fn read_properties(path: &Utf8Path) -> Result<BTreeMap<String, String>, EnvironmentError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(EnvironmentError::ReadFile {
                path: path.to_owned(),
                source,
            });
        }
    };
    Ok(parse_properties(&contents))
}

fn parse_properties(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['#', '!']))
        .map(|line| match line.split_once(['=', ':']) {
            Some((key, value)) => (key.trim().to_owned(), value.trim().to_owned()),
            None => (line.to_owned(), String::new()),
        })
        .collect()
}
