//! Dedicated PipeWire thread.
//!
//! PipeWire objects are not `Send`, so every call into libpipewire happens on
//! one thread running the main loop. The handle talks to it through a
//! `pipewire::channel` for requests and a std channel for replies.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use libspa::utils::dict::DictRef;
use patchkeep_core::{BackendEvent, EventSink};
use pipewire::context::ContextRc;
use pipewire::core::PW_ID_CORE;
use pipewire::main_loop::MainLoopRc;
use pipewire::properties::properties;
use pipewire::registry::GlobalObject;
use pipewire::types::ObjectType;
use tracing::{debug, error, info, warn};

use crate::error::{PwError, PwResult};
use crate::graph::GraphCache;
use crate::link::{LinkInfo, LinkParams};
use crate::node::{NodeInfo, PortInfo};

/// How long to wait for the server to accept the connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the initial registry round-trip.
const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests handled on the PipeWire thread.
#[derive(Debug)]
enum Request {
    Sync,
    Link(LinkParams),
    Unlink(u32),
    Shutdown,
}

/// Replies to the blocking handle calls.
#[derive(Debug)]
enum Reply {
    Connected,
    Synced,
    Failed(String),
}

/// Handle to a running PipeWire thread.
pub struct PipeWireRuntime {
    requests: pipewire::channel::Sender<Request>,
    replies: std_mpsc::Receiver<Reply>,
    thread: Option<JoinHandle<()>>,
}

impl PipeWireRuntime {
    /// Spawn the PipeWire thread and wait until it is connected.
    pub fn spawn(client_name: &str, cache: Arc<GraphCache>, events: EventSink) -> PwResult<Self> {
        let (requests, requests_rx) = pipewire::channel::channel();
        let (replies_tx, replies) = std_mpsc::channel();
        let client_name = client_name.to_string();

        let thread = std::thread::Builder::new()
            .name("pipewire-runtime".to_string())
            .spawn(move || {
                let failed = replies_tx.clone();
                if let Err(e) = run_pipewire_thread(&client_name, &cache, &events, requests_rx, replies_tx) {
                    error!(error = %e, "PipeWire runtime failed");
                    let _ = failed.send(Reply::Failed(e.to_string()));
                }
                cache.clear();
            })
            .map_err(|e| PwError::MainLoopError(format!("Failed to spawn PipeWire thread: {e}")))?;

        let mut runtime = Self { requests, replies, thread: Some(thread) };
        match runtime.replies.recv_timeout(CONNECT_TIMEOUT) {
            Ok(Reply::Connected) => Ok(runtime),
            Ok(Reply::Failed(e)) => {
                runtime.join();
                Err(PwError::ConnectionFailed(e))
            }
            Ok(Reply::Synced) => Err(PwError::ConnectionFailed("Unexpected reply".to_string())),
            Err(_) => {
                runtime.shutdown();
                Err(PwError::Timeout("connection"))
            }
        }
    }

    /// Round-trip with the server so the registry has been fully enumerated.
    ///
    /// Registry changes are only reported as events after this returns.
    pub fn sync(&self) -> PwResult<()> {
        self.send(Request::Sync)?;
        match self.replies.recv_timeout(SYNC_TIMEOUT) {
            Ok(Reply::Synced) => Ok(()),
            Ok(Reply::Failed(e)) => Err(PwError::RegistryError(e)),
            Ok(Reply::Connected) => Err(PwError::RegistryError("Unexpected reply".to_string())),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(PwError::Timeout("registry sync")),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(PwError::NotRunning),
        }
    }

    /// Queue link creation. Server-side rejection arrives as an event.
    pub fn link(&self, params: LinkParams) -> PwResult<()> {
        self.send(Request::Link(params))
    }

    /// Queue link destruction.
    pub fn unlink(&self, link_id: u32) -> PwResult<()> {
        self.send(Request::Unlink(link_id))
    }

    /// Whether the PipeWire thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the main loop and wait for the thread to exit.
    pub fn shutdown(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        self.join();
    }

    fn send(&self, request: Request) -> PwResult<()> {
        if !self.is_running() {
            return Err(PwError::NotRunning);
        }
        self.requests.send(request).map_err(|_| PwError::NotRunning)
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("PipeWire thread panicked");
        }
    }
}

impl Drop for PipeWireRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_pipewire_thread(
    client_name: &str,
    cache: &Arc<GraphCache>,
    events: &EventSink,
    requests: pipewire::channel::Receiver<Request>,
    replies: std_mpsc::Sender<Reply>,
) -> PwResult<()> {
    pipewire::init();

    info!(client = client_name, "PipeWire runtime starting...");

    let main_loop = MainLoopRc::new(None)
        .map_err(|e| PwError::MainLoopError(format!("Failed to create main loop: {e}")))?;

    let context = ContextRc::new(&main_loop, None)
        .map_err(|e| PwError::ConnectionFailed(format!("Failed to create context: {e}")))?;

    let core = context
        .connect_rc(Some(properties! {
            *pipewire::keys::APPLICATION_NAME => client_name,
        }))
        .map_err(|e| PwError::ConnectionFailed(format!("Failed to connect: {e}")))?;

    let registry = core
        .get_registry_rc()
        .map_err(|e| PwError::RegistryError(format!("Failed to get registry: {e}")))?;

    info!("Connected to PipeWire");
    let _ = replies.send(Reply::Connected);

    // Registry changes are only forwarded once the initial enumeration is done
    let live = Rc::new(Cell::new(false));
    let pending_sync: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));

    let _registry_listener = registry
        .add_listener_local()
        .global({
            let cache = Arc::clone(cache);
            let events = events.clone();
            let live = Rc::clone(&live);
            move |global| handle_global(&cache, &events, live.get(), global)
        })
        .global_remove({
            let cache = Arc::clone(cache);
            let events = events.clone();
            let live = Rc::clone(&live);
            move |id| handle_global_remove(&cache, &events, live.get(), id)
        })
        .register();

    let _core_listener = core
        .add_listener_local()
        .done({
            let live = Rc::clone(&live);
            let pending_sync = Rc::clone(&pending_sync);
            let replies = replies.clone();
            move |id, seq| {
                if id == PW_ID_CORE && pending_sync.get() == Some(seq.seq()) {
                    pending_sync.set(None);
                    live.set(true);
                    debug!("Registry synced");
                    let _ = replies.send(Reply::Synced);
                }
            }
        })
        .error({
            let main_loop = main_loop.clone();
            let events = events.clone();
            move |id, seq, res, message| {
                if id == PW_ID_CORE {
                    warn!(seq, res, reason = message, "PipeWire core error, leaving main loop");
                    let _ = events.send(BackendEvent::Shutdown { reason: message.to_string() });
                    main_loop.quit();
                } else {
                    warn!(id, seq, res, reason = message, "PipeWire object error");
                    let _ = events.send(BackendEvent::CallFailed { message: message.to_string() });
                }
            }
        })
        .register();

    let _request_receiver = requests.attach(main_loop.loop_(), {
        let main_loop = main_loop.clone();
        let core = core.clone();
        let registry = registry.clone();
        let events = events.clone();
        move |request| match request {
            Request::Sync => match core.sync(0) {
                Ok(seq) => pending_sync.set(Some(seq.seq())),
                Err(e) => {
                    let _ = replies.send(Reply::Failed(format!("Failed to sync: {e}")));
                }
            },
            Request::Link(params) => {
                if let Err(e) = create_link(&core, params) {
                    warn!(error = %e, "Link request failed");
                    let _ = events.send(BackendEvent::CallFailed { message: e.to_string() });
                }
            }
            Request::Unlink(link_id) => {
                debug!(link_id, "Destroying link");
                let _ = registry.destroy_global(link_id);
            }
            Request::Shutdown => {
                info!("PipeWire runtime received shutdown request");
                main_loop.quit();
            }
        }
    });

    info!("Starting PipeWire main loop");
    main_loop.run();

    info!("PipeWire runtime exiting");
    Ok(())
}

fn create_link(core: &pipewire::core::CoreRc, params: LinkParams) -> PwResult<()> {
    debug!(
        output_port = params.output_port,
        input_port = params.input_port,
        "Creating link"
    );

    let link_props = properties! {
        *pipewire::keys::LINK_OUTPUT_NODE => params.output_node.to_string(),
        *pipewire::keys::LINK_OUTPUT_PORT => params.output_port.to_string(),
        *pipewire::keys::LINK_INPUT_NODE => params.input_node.to_string(),
        *pipewire::keys::LINK_INPUT_PORT => params.input_port.to_string(),
        *pipewire::keys::OBJECT_LINGER => "true",
    };

    // The link lingers on the server, so the proxy can be dropped right away
    core.create_object::<pipewire::link::Link>("link-factory", &link_props)
        .map(drop)
        .map_err(|e| PwError::LinkCreationFailed(format!("Failed to create link: {e}")))
}

fn handle_global(cache: &GraphCache, events: &EventSink, live: bool, global: &GlobalObject<&DictRef>) {
    let Some(props) = global.props else {
        return;
    };
    let get = |key: &str| props.get(key);

    match global.type_ {
        ObjectType::Node => {
            if let Some(node) = NodeInfo::from_props(global.id, get) {
                let name = node.name.clone();
                cache.add_node(node);
                if live {
                    let _ = events.send(BackendEvent::ClientRegistered { name });
                }
            }
        }

        ObjectType::Port => {
            if let Some(port) = PortInfo::from_props(global.id, get) {
                cache.add_port(port);
                if live && let Some(raw) = cache.raw_port(global.id) {
                    let _ = events.send(BackendEvent::PortRegistered(raw));
                }
            } else {
                debug!(id = global.id, "Port global could not be parsed");
            }
        }

        ObjectType::Link => {
            if let Some(link) = LinkInfo::from_props(global.id, get) {
                cache.add_link(link);
                if live && let Some((output, input)) = cache.link_ends(&link) {
                    let _ = events.send(BackendEvent::PortsConnected { output, input });
                }
            }
        }

        _ => {}
    }
}

fn handle_global_remove(cache: &GraphCache, events: &EventSink, live: bool, id: u32) {
    if let Some(link) = cache.remove_link(id) {
        debug!(id, "Link removed");
        if live && let Some((output, input)) = cache.link_ends(&link) {
            let _ = events.send(BackendEvent::PortsDisconnected { output, input });
        }
    } else if let Some(raw) = cache.raw_port(id) {
        cache.remove_port(id);
        if live {
            let _ = events.send(BackendEvent::PortUnregistered(raw));
        }
    } else if let Some(node) = cache.remove_node(id) {
        debug!(id, name = %node.name, "Node removed");
        if live {
            let _ = events.send(BackendEvent::ClientUnregistered { name: node.name });
        }
    }
}
