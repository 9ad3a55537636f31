//! Connection manager and backend reconnection state machine.
//!
//! One manager drives one [`Backend`] for one connection type. It keeps a
//! [`GraphSnapshot`] current from backend notifications, resolves user
//! selections into port pairs, and polls for the backend whenever it is gone.
//!
//! All mutable state sits behind a single mutex. Backend notifications are
//! drained by one pump task and the reconnection timer is one task at most;
//! both take the same lock before touching anything. Blocking backend calls
//! (open, scan, close, connect) never run with the lock held, and timer
//! attempts run on the blocking pool.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use patchkeep_core::{
    Backend, BackendEvent, BackendResult, ChangeType, Client, ClientTree, Connectable, Connection,
    ConnectionDescriptor, ConnectionEvent, ConnectionType, EventSink, GraphSnapshot, ManagerState,
    Port, PortDirection, PortQuery, RawPort, Result, Severity, pair_all, pair_ports,
};
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Connect,
    Disconnect,
}

struct Inner {
    state: ManagerState,
    snapshot: GraphSnapshot,
    reconnect: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    listeners: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
    backend_listeners: Vec<mpsc::UnboundedSender<BackendEvent>>,
    disposed: bool,
}

impl Inner {
    fn is_active(&self) -> bool {
        self.state == ManagerState::Active && self.snapshot.is_active()
    }

    fn reconnect_armed(&self) -> bool {
        self.reconnect.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn cancel_reconnect(&mut self) {
        if let Some(handle) = self.reconnect.take() {
            handle.abort();
        }
    }

    fn emit(&mut self, event: &ConnectionEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct Shared {
    backend: Arc<dyn Backend>,
    config: ManagerConfig,
    connection_type: ConnectionType,
    query: PortQuery,
    events_tx: EventSink,
    inner: Mutex<Inner>,
}

impl Shared {
    /// One activation attempt. Returns `true` once no further attempts are
    /// wanted.
    ///
    /// Backend I/O runs without the lock held, so readers see `Connecting`
    /// instead of waiting on the backend. Only one attempt runs at a time.
    fn attempt(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.disposed || inner.state == ManagerState::Active {
                return true;
            }
            if inner.state == ManagerState::Connecting {
                return false;
            }
            inner.state = ManagerState::Connecting;
        }
        debug!(backend = %self.backend.name(), "Activating backend");

        let result = self.open_and_scan();
        if result.is_err() {
            self.backend.close();
        }

        let mut inner = self.inner.lock();
        if inner.disposed {
            drop(inner);
            if result.is_ok() {
                self.backend.close();
            }
            return true;
        }

        match result {
            Ok(snapshot) => {
                info!(
                    backend = %self.backend.name(),
                    ports = snapshot.ports().len(),
                    connections = snapshot.connections().len(),
                    "Connected to backend"
                );
                inner.snapshot = snapshot;
                inner.state = ManagerState::Active;
                inner.cancel_reconnect();

                let clients = inner.snapshot.clients().into_iter().map(Connectable::Client).collect();
                let event = ConnectionEvent::graph(
                    ChangeType::BackendConnected,
                    self.connection_type,
                    clients,
                    inner.snapshot.connections().to_vec(),
                )
                .with_message(Severity::Info, format!("Connected to {}", self.backend.name()));
                inner.emit(&event);
                true
            }
            Err(e) => {
                debug!(backend = %self.backend.name(), error = %e, "Backend activation failed");
                inner.state = ManagerState::Disconnected;
                inner.snapshot.deactivate();
                false
            }
        }
    }

    fn open_and_scan(&self) -> BackendResult<GraphSnapshot> {
        self.backend.open(&self.config.client_name, self.events_tx.clone())?;
        self.backend.activate()?;
        let raw_ports = self.backend.list_ports(&self.query)?;
        Ok(GraphSnapshot::from_scan(self.connection_type, &raw_ports))
    }

    /// Arm the reconnection timer unless one is already pending.
    fn arm_reconnect(self: &Arc<Self>, inner: &mut Inner) {
        if inner.disposed || inner.reconnect_armed() {
            return;
        }

        let period = self.config.retry_interval;
        let weak = Arc::downgrade(self);
        inner.reconnect = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                match task::spawn_blocking(move || shared.attempt()).await {
                    Ok(false) => {}
                    Ok(true) => break,
                    Err(e) => {
                        warn!(error = %e, "Activation attempt aborted");
                        break;
                    }
                }
            }
        }));

        info!(backend = %self.backend.name(), ?period, "Backend unavailable, polling");
        let event = ConnectionEvent::message(
            self.connection_type,
            Severity::Info,
            format!("{} unavailable; retrying every {}s", self.backend.name(), period.as_secs_f32()),
        );
        inner.emit(&event);
    }

    /// Validate a raw port against this manager's type and filter.
    fn accept(&self, raw: &RawPort) -> Option<Port> {
        if !self.query.matches(raw) {
            return None;
        }
        match raw.to_port(self.connection_type) {
            Ok(port) => port,
            Err(e) => {
                warn!(id = raw.id, error = %e, "Ignoring port notification");
                None
            }
        }
    }

    fn handle_backend_event(self: &Arc<Self>, event: BackendEvent) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        inner.backend_listeners.retain(|tx| tx.send(event.clone()).is_ok());

        match event {
            BackendEvent::Shutdown { reason } => {
                if inner.state != ManagerState::Active {
                    debug!(%reason, "Backend exit while not active, ignoring");
                    return;
                }
                warn!(backend = %self.backend.name(), %reason, "Backend exited");
                inner.state = ManagerState::Disconnected;
                inner.snapshot.deactivate();

                let event = ConnectionEvent::graph(
                    ChangeType::BackendExited,
                    self.connection_type,
                    Vec::new(),
                    Vec::new(),
                )
                .with_message(Severity::Warning, reason);
                inner.emit(&event);
                self.arm_reconnect(&mut inner);
                drop(inner);
                self.backend.close();
            }

            BackendEvent::CallFailed { message } => {
                warn!(backend = %self.backend.name(), reason = %message, "Backend call failed");
                let event = ConnectionEvent::message(self.connection_type, Severity::Warning, message);
                inner.emit(&event);
            }

            _ if !inner.is_active() => {
                debug!("Dropping backend notification while offline");
            }

            BackendEvent::PortRegistered(raw) => {
                if let Some(port) = self.accept(&raw)
                    && inner.snapshot.add_port(port.clone())
                {
                    let event = ConnectionEvent::graph(
                        ChangeType::New,
                        self.connection_type,
                        vec![Connectable::Port(port)],
                        Vec::new(),
                    );
                    inner.emit(&event);
                }
            }

            BackendEvent::PortUnregistered(raw) => {
                if let Some(port) = self.accept(&raw)
                    && let Some(removed) = inner.snapshot.remove_port(&port)
                {
                    let event = ConnectionEvent::graph(
                        ChangeType::Removed,
                        self.connection_type,
                        vec![Connectable::Port(port)],
                        removed,
                    );
                    inner.emit(&event);
                }
            }

            BackendEvent::PortsConnected { output, input } => {
                if let (Some(outlet), Some(inlet)) = (self.accept(&output), self.accept(&input))
                    && let Some(connection) = Connection::between(outlet, inlet)
                    && inner.snapshot.add_connection(connection.clone())
                {
                    let event = ConnectionEvent::graph(
                        ChangeType::New,
                        self.connection_type,
                        Vec::new(),
                        vec![connection],
                    );
                    inner.emit(&event);
                }
            }

            BackendEvent::PortsDisconnected { output, input } => {
                if let (Some(outlet), Some(inlet)) = (self.accept(&output), self.accept(&input))
                    && let Some(connection) = inner.snapshot.remove_connection(&outlet, &inlet)
                {
                    let event = ConnectionEvent::graph(
                        ChangeType::Removed,
                        self.connection_type,
                        Vec::new(),
                        vec![connection],
                    );
                    inner.emit(&event);
                }
            }

            BackendEvent::ClientRegistered { name } => debug!(%name, "Client registered"),
            BackendEvent::ClientUnregistered { name } => debug!(%name, "Client unregistered"),
        }
    }

    /// Forward resolved pairs to the backend. Returns how many it accepted;
    /// rejected ones become warning events.
    fn dispatch(self: &Arc<Self>, request: Request, pairs: &[Connection]) -> usize {
        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return 0;
            }
            if !inner.is_active() {
                let event = ConnectionEvent::message(
                    self.connection_type,
                    Severity::Warning,
                    format!("{} is offline; {request:?} request dropped", self.backend.name()),
                );
                inner.emit(&event);
                self.arm_reconnect(&mut inner);
                return 0;
            }
        }

        let mut failures = Vec::new();
        let mut issued = 0;
        for pair in pairs {
            let (Some(outlet), Some(inlet)) = (pair.outlet(), pair.inlet()) else {
                continue;
            };
            let (output, input) = (outlet.full_name(), inlet.full_name());
            let result = match request {
                Request::Connect => self.backend.connect(&output, &input),
                Request::Disconnect => self.backend.disconnect(&output, &input),
            };
            match result {
                Ok(()) => {
                    debug!(%output, %input, ?request, "Request queued");
                    issued += 1;
                }
                Err(e) => {
                    warn!(%output, %input, ?request, error = %e, "Backend rejected request");
                    failures.push(format!("{request:?} {output} -> {input} failed: {e}"));
                }
            }
        }

        if !failures.is_empty() {
            let mut inner = self.inner.lock();
            for message in failures {
                let event = ConnectionEvent::message(self.connection_type, Severity::Warning, message);
                inner.emit(&event);
            }
        }
        issued
    }
}

async fn pump_events(shared: Weak<Shared>, mut events_rx: mpsc::UnboundedReceiver<BackendEvent>) {
    while let Some(event) = events_rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_backend_event(event);
    }
}

/// Keeps one connection type's port graph in sync with a backend.
///
/// Must be created inside a Tokio runtime. Dropping the manager disposes it.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Validate the configuration and attempt the first activation.
    ///
    /// An unreachable backend is not an error: the manager starts
    /// `Disconnected` with reconnection polling armed. An invalid
    /// configuration is.
    pub fn start(backend: Arc<dyn Backend>, config: ManagerConfig) -> Result<Self> {
        config.validate()?;

        let connection_type = backend.connection_type();
        let query = config.scan_query(connection_type);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            backend,
            config,
            connection_type,
            query,
            events_tx,
            inner: Mutex::new(Inner {
                state: ManagerState::Disconnected,
                snapshot: GraphSnapshot::new(connection_type),
                reconnect: None,
                pump: None,
                listeners: Vec::new(),
                backend_listeners: Vec::new(),
                disposed: false,
            }),
        });

        shared.inner.lock().pump = Some(tokio::spawn(pump_events(Arc::downgrade(&shared), events_rx)));
        if !shared.attempt() {
            shared.arm_reconnect(&mut shared.inner.lock());
        }

        Ok(Self { shared })
    }

    #[must_use]
    pub fn connection_type(&self) -> ConnectionType {
        self.shared.connection_type
    }

    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.shared.inner.lock().state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.inner.lock().is_active()
    }

    /// Whether reconnection polling is currently armed.
    #[must_use]
    pub fn is_reconnecting(&self) -> bool {
        self.shared.inner.lock().reconnect_armed()
    }

    /// Receive normalized change events, in the order the backend raised them.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.shared.inner.lock();
        if !inner.disposed {
            inner.listeners.push(tx);
        }
        rx
    }

    /// Receive every raw backend notification, for diagnostics.
    pub fn subscribe_backend(&self) -> mpsc::UnboundedReceiver<BackendEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.shared.inner.lock();
        if !inner.disposed {
            inner.backend_listeners.push(tx);
        }
        rx
    }

    /// Current clients, or `None` while the backend is unreachable.
    ///
    /// Asking while offline makes sure reconnection polling is armed.
    pub fn clients(&self) -> Option<Vec<Client>> {
        let mut inner = self.shared.inner.lock();
        if inner.is_active() {
            return Some(inner.snapshot.clients());
        }
        self.shared.arm_reconnect(&mut inner);
        None
    }

    /// Current clients split into outlet and inlet branches.
    pub fn client_tree(&self) -> Option<ClientTree> {
        self.clients().map(|clients| ClientTree::build(&clients))
    }

    /// Current connections; empty while the backend is unreachable.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        let inner = self.shared.inner.lock();
        if inner.is_active() { inner.snapshot.connections().to_vec() } else { Vec::new() }
    }

    /// A copy of the current snapshot, only while it is live.
    #[must_use]
    pub fn snapshot(&self) -> Option<GraphSnapshot> {
        let inner = self.shared.inner.lock();
        inner.is_active().then(|| inner.snapshot.clone())
    }

    /// Connect outlets to inlets positionally. Returns the number of requests
    /// the backend accepted; failures and outcomes arrive as events.
    pub fn connect(&self, outlets: &[Connectable], inlets: &[Connectable]) -> usize {
        let pairs = pair_ports(outlets, inlets);
        debug!(pairs = pairs.len(), "Connect resolved");
        self.shared.dispatch(Request::Connect, &pairs)
    }

    /// Disconnect every outlet/inlet combination. Returns the number of
    /// requests the backend accepted; failures and outcomes arrive as events.
    pub fn disconnect(&self, outlets: &[Connectable], inlets: &[Connectable]) -> usize {
        let pairs = pair_all(outlets, inlets);
        debug!(pairs = pairs.len(), "Disconnect resolved");
        self.shared.dispatch(Request::Disconnect, &pairs)
    }

    /// Current connections as name-based descriptors.
    #[must_use]
    pub fn moment_connections(&self) -> Vec<ConnectionDescriptor> {
        self.connections().iter().filter_map(ConnectionDescriptor::from_connection).collect()
    }

    /// Re-establish saved connections against the live graph.
    ///
    /// Descriptors naming ports that do not exist (yet) are reported as a
    /// warning event; ones already connected are skipped.
    pub fn restore(&self, descriptors: &[ConnectionDescriptor]) -> usize {
        let mut pairs = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.is_active() {
                let mut missing = Vec::new();
                for descriptor in descriptors {
                    let outlet = inner.snapshot.find_port(&descriptor.output, PortDirection::Out);
                    let inlet = inner.snapshot.find_port(&descriptor.input, PortDirection::In);
                    match (outlet, inlet) {
                        (Some(outlet), Some(inlet)) if inner.snapshot.has_connection(outlet, inlet) => {}
                        (Some(outlet), Some(inlet)) => {
                            if let Some(pair) = Connection::between(outlet.clone(), inlet.clone()) {
                                pairs.push(pair);
                            }
                        }
                        _ => missing.push(format!("{} -> {}", descriptor.output, descriptor.input)),
                    }
                }
                if !missing.is_empty() {
                    let event = ConnectionEvent::message(
                        self.shared.connection_type,
                        Severity::Warning,
                        format!("Cannot restore, ports not present: {}", missing.join(", ")),
                    );
                    inner.emit(&event);
                }
            }
        }
        self.shared.dispatch(Request::Connect, &pairs)
    }

    /// Stop everything: no more timer firings, no more events, handle released.
    ///
    /// Idempotent, and safe on a manager that never reached the backend.
    pub fn dispose(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.cancel_reconnect();
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        inner.listeners.clear();
        inner.backend_listeners.clear();
        inner.state = ManagerState::Disconnected;
        inner.snapshot.deactivate();
        drop(inner);
        self.shared.backend.close();
        info!(backend = %self.shared.backend.name(), "Connection manager disposed");
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("backend", &self.shared.backend.name())
            .field("connection_type", &self.shared.connection_type)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}
