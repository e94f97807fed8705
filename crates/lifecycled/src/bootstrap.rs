//! Assembles the managed component and its container from configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};

use lifecycle::{
    Container, ContainerOptions, ExecutionMode, Lifecycle, LifecycleOwner,
    StructuredStageReporter,
};
use lifecycle_config::{APPLICATION_NAME, Config, Environment, EnvironmentError};

use crate::service::{EchoService, resolve_listen_address};

/// Name the sample component is registered under.
pub const COMPONENT_NAME: &str = "echo";

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Trait abstracting environment resolution for testability.
pub trait EnvironmentLoader: Send + Sync {
    /// Resolves the application environment.
    fn load(&self) -> Result<Environment, EnvironmentError>;
}

/// Loader layering the process environment over an application name.
#[derive(Debug, Clone)]
pub struct ProcessEnvironmentLoader {
    application: String,
}

impl ProcessEnvironmentLoader {
    /// Resolves keys for `application`, e.g. `<application>.server.port`.
    #[must_use]
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
        }
    }
}

impl EnvironmentLoader for ProcessEnvironmentLoader {
    fn load(&self) -> Result<Environment, EnvironmentError> {
        let base = BTreeMap::from([(String::from(APPLICATION_NAME), self.application.clone())]);
        Environment::load(base)
    }
}

/// Loader that hands out a fixed environment.
#[derive(Debug, Clone)]
pub struct StaticEnvironmentLoader {
    environment: Environment,
}

impl StaticEnvironmentLoader {
    /// Wraps `environment`.
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

impl EnvironmentLoader for StaticEnvironmentLoader {
    fn load(&self) -> Result<Environment, EnvironmentError> {
        Ok(self.environment.clone())
    }
}

/// Container options derived from the daemon configuration.
#[must_use]
pub fn container_options(config: &Config) -> ContainerOptions {
    ContainerOptions {
        mode: if config.separate_threads() {
            ExecutionMode::SeparateThreads
        } else {
            ExecutionMode::Inline
        },
        convergence_timeout: config.convergence_timeout(),
    }
}

/// The sample component wired into its container.
#[derive(Debug)]
pub struct Component {
    owner: Arc<LifecycleOwner<EchoService>>,
    container: Container,
}

impl Component {
    /// Builds the echo service, reports its stage changes through `tracing`
    /// and wraps it according to `config`.
    pub fn assemble(config: &Config, environment: &Environment) -> Result<Self, EnvironmentError> {
        let address = resolve_listen_address(environment, config)?;
        let owner = Arc::new(LifecycleOwner::named(
            COMPONENT_NAME,
            EchoService::new(address),
        ));
        owner.add_listener(Arc::new(StructuredStageReporter::new(owner.name())));
        let managed: Arc<dyn Lifecycle> = owner.clone();
        let container = Container::with_options(managed, container_options(config));
        Ok(Self { owner, container })
    }

    /// The container callers drive.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The wrapped service.
    #[must_use]
    pub fn service(&self) -> &EchoService {
        self.owner.hooks()
    }
}
