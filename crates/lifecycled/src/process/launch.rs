//! Supervises daemon launch sequencing and shutdown.

use std::sync::Arc;

use tracing::{debug, info};

use lifecycle::{Lifecycle, Stage};

use crate::bootstrap::{
    COMPONENT_NAME, Component, ConfigLoader, EnvironmentLoader, ProcessEnvironmentLoader,
    SystemConfigLoader,
};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::telemetry;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::termination::TerminationWatcher;

/// Process-level collaborators needed to control daemon lifecycle.
pub(crate) struct ProcessControl<S> {
    pub(crate) shutdown: S,
}

/// Service dependencies required to construct the managed component.
pub(crate) struct ServiceDeps<L, E> {
    pub(crate) loader: L,
    pub(crate) environment: E,
    pub(crate) reporter: Arc<dyn HealthReporter>,
}

/// Collaborators required to launch the daemon.
pub(crate) struct LaunchPlan<L, E, S> {
    pub(crate) process: ProcessControl<S>,
    pub(crate) services: ServiceDeps<L, E>,
}

/// How the launch sequence learns that it should stop.
enum Supervision<S> {
    /// A watcher thread owns the signal and stops the component itself.
    Watcher(TerminationWatcher),
    /// The launching thread waits for the signal and stops the component.
    Inline(S),
}

/// Runs the daemon using the production collaborators.
pub fn run() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        process: ProcessControl {
            shutdown: SystemShutdownSignal::new(),
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            environment: ProcessEnvironmentLoader::new(COMPONENT_NAME),
            reporter: Arc::new(StructuredHealthReporter::new()),
        },
    };
    run_with(plan)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_with<L, E, S>(plan: LaunchPlan<L, E, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    E: EnvironmentLoader,
    S: ShutdownSignal + 'static,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl { shutdown } = process;
    let ServiceDeps {
        loader,
        environment,
        reporter,
    } = services;

    reporter.launch_starting();
    let result = supervise(&loader, &environment, &reporter, shutdown);
    if let Err(error) = &result {
        reporter.launch_failed(error);
    }
    result
}

fn supervise<L, E, S>(
    loader: &L,
    environment: &E,
    reporter: &Arc<dyn HealthReporter>,
    shutdown: S,
) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    E: EnvironmentLoader,
    S: ShutdownSignal + 'static,
{
    let config = loader.load()?;
    telemetry::initialise(&config)?;
    reporter.configuration_loaded(&config);

    let environment = environment.load()?;
    debug!(
        target: PROCESS_TARGET,
        environment = %environment.description(),
        "environment resolved"
    );

    let component = Component::assemble(&config, &environment)?;
    let container = component.container();
    let name = container.name().to_owned();

    // The watcher must exist before `init` so a signal during startup latches.
    let supervision = if config.shutdown_hook() {
        Supervision::Watcher(TerminationWatcher::spawn(
            &name,
            shutdown,
            container.termination_handle(),
            Arc::clone(reporter),
        )?)
    } else {
        Supervision::Inline(shutdown)
    };

    container.init()?;
    container.start()?;
    reporter.component_ready(&name, component.service().local_addr());

    match supervision {
        Supervision::Watcher(watcher) => {
            let stopped = watcher.join()?;
            // Termination raised before `Running` latches without stopping.
            if !stopped && container.current_stage() == Stage::Running {
                container.stop()?;
            }
        }
        Supervision::Inline(shutdown) => {
            shutdown.wait()?;
            reporter.termination_requested(&name);
            container.stop()?;
        }
    }

    reporter.shutdown_completed(&name);
    info!(
        target: PROCESS_TARGET,
        component = %name,
        "shutdown sequence completed"
    );
    Ok(())
}
