//! [`Backend`] implementation over a PipeWire client connection.

use std::sync::Arc;

use parking_lot::Mutex;
use patchkeep_core::{
    Backend, BackendError, BackendResult, ConnectionType, EventSink, PortDirection, PortQuery,
    RawPort,
};
use tracing::{debug, info};

use crate::error::PwError;
use crate::graph::GraphCache;
use crate::runtime::PipeWireRuntime;

/// One PipeWire connection serving one connection type.
///
/// The registry mirror holds every port on the server; type filtering happens
/// through the [`PortQuery`] the manager passes in and on the manager side
/// for notifications.
pub struct PipeWireBackend {
    connection_type: ConnectionType,
    cache: Arc<GraphCache>,
    runtime: Mutex<Option<PipeWireRuntime>>,
}

impl PipeWireBackend {
    #[must_use]
    pub fn new(connection_type: ConnectionType) -> Self {
        Self { connection_type, cache: Arc::new(GraphCache::new()), runtime: Mutex::new(None) }
    }

    #[must_use]
    pub fn audio() -> Self {
        Self::new(ConnectionType::Audio)
    }

    #[must_use]
    pub fn midi() -> Self {
        Self::new(ConnectionType::Midi)
    }

    fn with_runtime<T>(&self, f: impl FnOnce(&PipeWireRuntime) -> BackendResult<T>) -> BackendResult<T> {
        let runtime = self.runtime.lock();
        match runtime.as_ref() {
            Some(runtime) if runtime.is_running() => f(runtime),
            _ => Err(BackendError::NotOpen),
        }
    }

    fn require_port(&self, full_name: &str, direction: PortDirection) -> BackendResult<()> {
        match self.cache.find_port(full_name, direction) {
            Some(_) => Ok(()),
            None => Err(PwError::PortNotFound(full_name.to_string()).into()),
        }
    }
}

impl Backend for PipeWireBackend {
    fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    fn name(&self) -> String {
        format!("PipeWire ({})", self.connection_type)
    }

    fn open(&self, client_name: &str, events: EventSink) -> BackendResult<()> {
        let mut runtime = self.runtime.lock();
        if runtime.as_ref().is_some_and(PipeWireRuntime::is_running) {
            return Ok(());
        }
        // Drop a dead runtime before starting over
        if let Some(mut stale) = runtime.take() {
            stale.shutdown();
        }

        self.cache.clear();
        *runtime = Some(PipeWireRuntime::spawn(client_name, Arc::clone(&self.cache), events)?);
        info!(connection_type = %self.connection_type, client = client_name, "PipeWire backend open");
        Ok(())
    }

    fn activate(&self) -> BackendResult<()> {
        self.with_runtime(|runtime| runtime.sync().map_err(|e| match e {
            PwError::NotRunning => BackendError::NotOpen,
            other => BackendError::ActivationFailed(other.to_string()),
        }))
    }

    fn list_ports(&self, query: &PortQuery) -> BackendResult<Vec<RawPort>> {
        self.with_runtime(|_| Ok(self.cache.raw_ports().into_iter().filter(|p| query.matches(p)).collect()))
    }

    fn connect(&self, output: &str, input: &str) -> BackendResult<()> {
        self.with_runtime(|runtime| {
            self.require_port(output, PortDirection::Out)?;
            self.require_port(input, PortDirection::In)?;
            let params = self
                .cache
                .link_params(output, input)
                .ok_or_else(|| BackendError::PortNotFound(format!("{output} -> {input}")))?;
            debug!(output, input, "Queueing link");
            runtime.link(params).map_err(BackendError::from)
        })
    }

    fn disconnect(&self, output: &str, input: &str) -> BackendResult<()> {
        self.with_runtime(|runtime| {
            let link_id = self
                .cache
                .find_link(output, input)
                .ok_or_else(|| PwError::LinkNotFound(output.to_string(), input.to_string()))?;
            debug!(output, input, link_id, "Queueing unlink");
            runtime.unlink(link_id).map_err(BackendError::from)
        })
    }

    fn close(&self) {
        if let Some(mut runtime) = self.runtime.lock().take() {
            runtime.shutdown();
            info!(connection_type = %self.connection_type, "PipeWire backend closed");
        }
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_calls_before_open_fail() {
        let backend = PipeWireBackend::midi();

        assert_eq!(backend.activate(), Err(BackendError::NotOpen));
        assert_matches!(backend.list_ports(&PortQuery::default()), Err(BackendError::NotOpen));
        assert_eq!(backend.connect("a:out", "b:in"), Err(BackendError::NotOpen));
        assert_eq!(backend.disconnect("a:out", "b:in"), Err(BackendError::NotOpen));
    }

    #[test]
    fn test_close_without_open_is_noop() {
        let backend = PipeWireBackend::audio();
        backend.close();
        backend.close();
        assert_eq!(backend.connection_type(), ConnectionType::Audio);
        assert_eq!(backend.name(), "PipeWire (audio)");
    }
}
