//! Behavioural tests covering daemon launch, echo traffic and termination.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use lifecycle_config::Config;

use crate::bootstrap::{COMPONENT_NAME, StaticConfigLoader, StaticEnvironmentLoader};
use crate::health::HealthReporter;
use crate::process::LaunchError;
use crate::process::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_with};
use crate::tests::support::{
    HealthEvent, RecordingHealthReporter, TestShutdownSignal, echo_environment, test_config,
};

const READY_TIMEOUT: Duration = Duration::from_secs(5);

type StepResult = Result<(), String>;

struct DaemonWorld {
    config: Config,
    reporter: Arc<RecordingHealthReporter>,
    shutdown: TestShutdownSignal,
    occupied: Option<TcpListener>,
    address: Option<SocketAddr>,
    handle: Option<JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
}

impl DaemonWorld {
    fn new() -> Self {
        Self {
            config: test_config(true, true),
            reporter: Arc::new(RecordingHealthReporter::default()),
            shutdown: TestShutdownSignal::new(),
            occupied: None,
            address: None,
            handle: None,
            result: None,
        }
    }

    fn start_background(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err(String::from("daemon already running"));
        }
        let reporter: Arc<dyn HealthReporter> = self.reporter.clone();
        let plan = LaunchPlan {
            process: ProcessControl {
                shutdown: self.shutdown.clone(),
            },
            services: ServiceDeps {
                loader: StaticConfigLoader::new(self.config.clone()),
                environment: StaticEnvironmentLoader::new(echo_environment([])),
                reporter,
            },
        };
        self.handle = Some(thread::spawn(move || run_with(plan)));
        Ok(())
    }

    fn join(&mut self) -> StepResult {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| String::from("daemon not running"))?;
        let result = handle
            .join()
            .map_err(|_| String::from("daemon thread panicked"))?;
        self.result = Some(result);
        Ok(())
    }
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<DaemonWorld> {
    RefCell::new(DaemonWorld::new())
}

#[given("a daemon configured with separate threads and the shutdown hook")]
fn given_threaded_daemon(world: &RefCell<DaemonWorld>) {
    world.borrow_mut().config = test_config(true, true);
}

#[given("a daemon configured inline without the shutdown hook")]
fn given_inline_daemon(world: &RefCell<DaemonWorld>) {
    world.borrow_mut().config = test_config(false, false);
}

#[given("the listen address is already in use")]
fn given_address_in_use(world: &RefCell<DaemonWorld>) -> StepResult {
    let listener = TcpListener::bind("127.0.0.1:0").map_err(|error| error.to_string())?;
    let address = listener.local_addr().map_err(|error| error.to_string())?;
    let mut world = world.borrow_mut();
    world.config.listen_address = address.to_string();
    world.occupied = Some(listener);
    Ok(())
}

#[when("the daemon starts in the background")]
fn when_daemon_starts(world: &RefCell<DaemonWorld>) -> StepResult {
    world.borrow_mut().start_background()
}

#[when("shutdown is signalled")]
fn when_shutdown_signalled(world: &RefCell<DaemonWorld>) {
    world.borrow().shutdown.trigger();
}

#[when("the daemon run completes")]
fn when_daemon_completes(world: &RefCell<DaemonWorld>) -> StepResult {
    world.borrow_mut().join()
}

#[then("the echo service answers {payload}")]
fn then_echo_answers(world: &RefCell<DaemonWorld>, payload: String) -> StepResult {
    let payload = payload.trim_matches('"');
    let address = world.borrow().reporter.wait_for_ready(READY_TIMEOUT)?;
    world.borrow_mut().address = Some(address);

    let mut stream = TcpStream::connect(address).map_err(|error| error.to_string())?;
    stream
        .set_read_timeout(Some(READY_TIMEOUT))
        .map_err(|error| error.to_string())?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|error| error.to_string())?;
    let mut echoed = vec![0; payload.len()];
    stream
        .read_exact(&mut echoed)
        .map_err(|error| error.to_string())?;
    if echoed != payload.as_bytes() {
        return Err(format!("expected '{payload}', got {echoed:?}"));
    }
    Ok(())
}

#[then("the daemon exited cleanly")]
fn then_exited_cleanly(world: &RefCell<DaemonWorld>) -> StepResult {
    match world.borrow().result.as_ref() {
        Some(Ok(())) => Ok(()),
        Some(Err(error)) => Err(format!("daemon failed: {error}")),
        None => Err(String::from("daemon result not recorded")),
    }
}

#[then("termination was reported once")]
fn then_termination_reported_once(world: &RefCell<DaemonWorld>) {
    let events = world.borrow().reporter.events();
    let requested = HealthEvent::TerminationRequested(String::from(COMPONENT_NAME));
    let completed = HealthEvent::ShutdownCompleted(String::from(COMPONENT_NAME));
    assert_eq!(
        events.iter().filter(|event| **event == requested).count(),
        1,
        "events: {events:?}"
    );
    assert_eq!(events.last(), Some(&completed));
}

#[then("the echo service no longer accepts connections")]
fn then_no_longer_accepts(world: &RefCell<DaemonWorld>) -> StepResult {
    let address = world
        .borrow()
        .address
        .ok_or_else(|| String::from("service address not recorded"))?;
    if TcpStream::connect(address).is_ok() {
        return Err(format!("{address} still accepts connections"));
    }
    Ok(())
}

#[then("the launch failed with a lifecycle error")]
fn then_launch_failed(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    let result = world.result.as_ref().expect("daemon result recorded");
    assert!(
        matches!(result, Err(LaunchError::Lifecycle { .. })),
        "unexpected result: {result:?}"
    );
    assert!(matches!(
        world.reporter.events().last(),
        Some(HealthEvent::LaunchFailed(_))
    ));
}

#[then("no component was reported ready")]
fn then_never_ready(world: &RefCell<DaemonWorld>) {
    let events = world.borrow().reporter.events();
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, HealthEvent::ComponentReady { .. })),
        "events: {events:?}"
    );
}

#[scenario(path = "tests/features/daemon.feature")]
fn daemon_launch(#[from(world)] _: RefCell<DaemonWorld>) {}
