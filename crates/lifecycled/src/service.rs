//! Sample managed component: a TCP echo service driven by lifecycle hooks.
//!
//! `init` binds the listener, `start` spawns the accept loop, `pause` stops
//! accepting (connections queue in the backlog), `resume` accepts again and
//! `stop` ends the loop and releases the socket. Each accepted connection is
//! echoed back on its own `echo-conn-<n>` thread until the peer closes it or
//! `stop` shuts it down; `stop` returns only after every such thread exits.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lifecycle::{HookError, LifecycleHooks};
use lifecycle_config::{Config, Environment, EnvironmentError};
use thiserror::Error;
use tracing::{debug, info, warn};

const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");
const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const DEFAULT_HOST: &str = "127.0.0.1";

/// Errors raised by the echo service's hooks.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The configured address could not be resolved.
    #[error("failed to resolve '{address}': {source}")]
    Resolve {
        /// Address being resolved.
        address: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution produced no usable address.
    #[error("'{address}' resolved to no addresses")]
    NoAddress {
        /// Address being resolved.
        address: String,
    },
    /// Binding the listener failed.
    #[error("failed to bind '{address}': {source}")]
    Bind {
        /// Address being bound.
        address: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to configure listener: {source}")]
    NonBlocking {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// `start` ran without a bound listener.
    #[error("listener is not bound")]
    NotBound,
    /// The accept thread could not be spawned.
    #[error("failed to spawn accept thread: {source}")]
    Spawn {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("accept thread panicked")]
    ThreadPanic,
    /// One or more connection threads panicked.
    #[error("{count} connection thread(s) panicked")]
    ConnectionPanic {
        /// Number of panicked threads.
        count: usize,
    },
}

/// Picks the service address: `<app>.server.host`/`<app>.server.port` from
/// the environment when either is set, otherwise the configured fallback.
pub fn resolve_listen_address(
    environment: &Environment,
    config: &Config,
) -> Result<String, EnvironmentError> {
    let host = environment.server_host();
    let port = environment.server_port()?;
    if host.is_none() && port.is_none() {
        return Ok(config.listen_address().to_owned());
    }
    let host = host.unwrap_or(DEFAULT_HOST);
    let port = port.unwrap_or(0);
    if host.contains(':') {
        Ok(format!("[{host}]:{port}"))
    } else {
        Ok(format!("{host}:{port}"))
    }
}

#[derive(Debug, Default)]
struct Switches {
    shutdown: AtomicBool,
    paused: AtomicBool,
}

#[derive(Debug)]
struct Connection {
    peer: SocketAddr,
    /// Clone of the echoed stream; shutting it down ends the echo loop.
    stream: TcpStream,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Connections {
    next_id: AtomicU64,
    open: Mutex<Vec<Connection>>,
}

impl Connections {
    fn open(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn serve(&self, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        let control = stream.try_clone()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = thread::Builder::new()
            .name(format!("echo-conn-{id}"))
            .spawn(move || {
                if let Err(error) = echo(stream) {
                    debug!(target: SERVICE_TARGET, %peer, %error, "connection closed with error");
                }
            })?;
        let mut open = self.open();
        open.retain(|connection| !connection.handle.is_finished());
        open.push(Connection {
            peer,
            stream: control,
            handle,
        });
        Ok(())
    }

    /// Shuts every tracked connection down and joins its thread; returns
    /// how many of them panicked.
    fn close_all(&self) -> usize {
        let connections = std::mem::take(&mut *self.open());
        let mut panicked = 0;
        for Connection {
            peer,
            stream,
            handle,
        } in connections
        {
            if let Err(error) = stream.shutdown(Shutdown::Both)
                && error.kind() != io::ErrorKind::NotConnected
            {
                debug!(target: SERVICE_TARGET, %peer, %error, "connection shutdown failed");
            }
            if handle.join().is_err() {
                warn!(target: SERVICE_TARGET, %peer, "connection thread panicked");
                panicked += 1;
            }
        }
        panicked
    }
}

#[derive(Debug, Default)]
struct ServiceState {
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    accept: Option<JoinHandle<()>>,
}

/// Echo service whose socket is owned by its lifecycle hooks.
#[derive(Debug)]
pub struct EchoService {
    address: String,
    state: Mutex<ServiceState>,
    switches: Arc<Switches>,
    connections: Arc<Connections>,
}

impl EchoService {
    /// Builds a service that will bind `address` on `init`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: Mutex::new(ServiceState::default()),
            switches: Arc::new(Switches::default()),
            connections: Arc::new(Connections::default()),
        }
    }

    /// Address the service was asked to bind.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Address actually bound, once `init` has run.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state().local_addr
    }

    /// Connections currently being echoed.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        let mut open = self.connections.open();
        open.retain(|connection| !connection.handle.is_finished());
        open.len()
    }

    fn state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bind(&self) -> Result<(TcpListener, SocketAddr), ServiceError> {
        let address = self.address.as_str();
        let mut candidates = address
            .to_socket_addrs()
            .map_err(|source| ServiceError::Resolve {
                address: address.to_owned(),
                source,
            })?;
        let candidate = candidates.next().ok_or_else(|| ServiceError::NoAddress {
            address: address.to_owned(),
        })?;
        let listener = TcpListener::bind(candidate).map_err(|source| ServiceError::Bind {
            address: candidate,
            source,
        })?;
        let bound = listener.local_addr().map_err(|source| ServiceError::Bind {
            address: candidate,
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServiceError::NonBlocking { source })?;
        Ok((listener, bound))
    }
}

impl LifecycleHooks for EchoService {
    fn do_init(&self) -> Result<(), HookError> {
        let (listener, bound) = self.bind()?;
        info!(target: SERVICE_TARGET, address = %bound, "echo listener bound");
        let mut state = self.state();
        state.listener = Some(listener);
        state.local_addr = Some(bound);
        Ok(())
    }

    fn do_start(&self) -> Result<(), HookError> {
        let mut state = self.state();
        let listener = state.listener.take().ok_or(ServiceError::NotBound)?;
        self.switches.shutdown.store(false, Ordering::SeqCst);
        self.switches.paused.store(false, Ordering::SeqCst);
        let switches = Arc::clone(&self.switches);
        let connections = Arc::clone(&self.connections);
        let handle = thread::Builder::new()
            .name(String::from("echo-accept"))
            .spawn(move || run_accept_loop(&listener, &switches, &connections))
            .map_err(|source| ServiceError::Spawn { source })?;
        state.accept = Some(handle);
        Ok(())
    }

    fn do_pause(&self) -> Result<(), HookError> {
        self.switches.paused.store(true, Ordering::SeqCst);
        debug!(target: SERVICE_TARGET, "echo service paused");
        Ok(())
    }

    fn do_resume(&self) -> Result<(), HookError> {
        self.switches.paused.store(false, Ordering::SeqCst);
        debug!(target: SERVICE_TARGET, "echo service resumed");
        Ok(())
    }

    fn do_stop(&self) -> Result<(), HookError> {
        self.switches.shutdown.store(true, Ordering::SeqCst);
        let handle = {
            let mut state = self.state();
            state.local_addr = None;
            state.listener = None;
            state.accept.take()
        };
        let accept = handle.map_or(Ok(()), JoinHandle::join);
        // The accept loop has exited, so no connection can be added behind us.
        let panicked = self.connections.close_all();
        info!(target: SERVICE_TARGET, "echo listener closed");
        accept.map_err(|_| ServiceError::ThreadPanic)?;
        if panicked > 0 {
            return Err(ServiceError::ConnectionPanic { count: panicked }.into());
        }
        Ok(())
    }
}

fn run_accept_loop(listener: &TcpListener, switches: &Switches, connections: &Connections) {
    let mut last_error = None::<io::ErrorKind>;
    while !switches.shutdown.load(Ordering::SeqCst) {
        if switches.paused.load(Ordering::SeqCst) {
            thread::sleep(ACCEPT_BACKOFF);
            continue;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                last_error = None;
                debug!(target: SERVICE_TARGET, %peer, "connection accepted");
                if let Err(error) = connections.serve(stream, peer) {
                    warn!(target: SERVICE_TARGET, %peer, %error, "failed to serve connection");
                }
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(target: SERVICE_TARGET, %error, "accept error");
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}

fn echo(stream: TcpStream) -> io::Result<u64> {
    stream.set_nonblocking(false)?;
    let mut reader = stream.try_clone()?;
    let mut writer = stream;
    io::copy(&mut reader, &mut writer)
}
