//! The capability a media-server binding provides to the connection manager.
//!
//! A backend owns one client handle on the server. The manager opens it,
//! activates it, scans ports, and forwards connect/disconnect requests by
//! composite port name. Everything the server does on its own arrives as a
//! [`BackendEvent`] on the sink handed to [`Backend::open`].

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::Result;
use crate::port::{ConnectionType, Port, PortDirection};

/// Backend error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend not open")]
    NotOpen,

    #[error("Activation failed: {0}")]
    ActivationFailed(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Connection not found: {0} -> {1}")]
    ConnectionNotFound(String, String),

    #[error("Backend call failed: {0}")]
    CallFailed(String),
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Channel on which a backend delivers its notifications.
pub type EventSink = mpsc::UnboundedSender<BackendEvent>;

/// A port as the backend reports it, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPort {
    /// Backend object id
    pub id: u32,
    /// Composite `"<client>:<port>"` name
    pub full_name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Backend port-type string (e.g. "8 bit raw midi")
    pub port_type: String,
    /// Composite names of the ports this one is connected to
    pub connections: Vec<String>,
}

impl RawPort {
    /// Connection type, if the backend type string is one we handle.
    #[must_use]
    pub fn connection_type(&self) -> Option<ConnectionType> {
        ConnectionType::from_port_type(&self.port_type)
    }

    /// Validate into a [`Port`] of the given type.
    ///
    /// Returns `Ok(None)` when the port belongs to another connection type.
    pub fn to_port(&self, connection_type: ConnectionType) -> Result<Option<Port>> {
        if self.connection_type() != Some(connection_type) {
            return Ok(None);
        }
        Port::from_full_name(&self.full_name, self.direction, connection_type, self.id).map(Some)
    }
}

/// Port listing filter: optional name and type regular expressions plus a
/// direction flag. Empty fields match everything.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PortQuery {
    /// Regex matched against the composite port name
    pub name_pattern: Option<String>,
    /// Regex matched against the backend port-type string
    pub type_pattern: Option<String>,
    /// Only ports of this direction
    pub direction: Option<PortDirection>,
    #[serde(skip)]
    compiled: OnceLock<(Option<regex::Regex>, Option<regex::Regex>)>,
}

impl Clone for PortQuery {
    fn clone(&self) -> Self {
        Self {
            name_pattern: self.name_pattern.clone(),
            type_pattern: self.type_pattern.clone(),
            direction: self.direction,
            compiled: OnceLock::new(),
        }
    }
}

impl PartialEq for PortQuery {
    fn eq(&self, other: &Self) -> bool {
        self.name_pattern == other.name_pattern
            && self.type_pattern == other.type_pattern
            && self.direction == other.direction
    }
}

impl PortQuery {
    /// Every port of one connection type.
    #[must_use]
    pub fn for_type(connection_type: ConnectionType) -> Self {
        Self {
            type_pattern: Some(regex::escape(connection_type.port_type())),
            ..Self::default()
        }
    }

    /// Restrict to names matching `pattern`.
    #[must_use]
    pub fn with_name(mut self, pattern: &str) -> Self {
        self.name_pattern = Some(pattern.to_string());
        self.compiled = OnceLock::new();
        self
    }

    /// Restrict to one direction.
    #[must_use]
    pub fn with_direction(mut self, direction: PortDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Check the patterns compile.
    pub fn validate(&self) -> Result<()> {
        for pattern in self.name_pattern.iter().chain(self.type_pattern.iter()) {
            regex::Regex::new(pattern)?;
        }
        Ok(())
    }

    /// Check if a raw port passes this filter.
    ///
    /// An invalid pattern matches nothing.
    #[must_use]
    pub fn matches(&self, port: &RawPort) -> bool {
        if self.direction.is_some_and(|d| d != port.direction) {
            return false;
        }

        let (name_re, type_re) = self.compiled.get_or_init(|| {
            (compile(self.name_pattern.as_deref()), compile(self.type_pattern.as_deref()))
        });

        pattern_matches(self.name_pattern.as_ref(), name_re.as_ref(), &port.full_name)
            && pattern_matches(self.type_pattern.as_ref(), type_re.as_ref(), &port.port_type)
    }
}

fn compile(pattern: Option<&str>) -> Option<regex::Regex> {
    let pattern = pattern?;
    match regex::Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "Invalid port pattern");
            None
        }
    }
}

fn pattern_matches(pattern: Option<&String>, compiled: Option<&regex::Regex>, value: &str) -> bool {
    match (pattern, compiled) {
        (None, _) => true,
        (Some(_), Some(re)) => re.is_match(value),
        (Some(_), None) => false,
    }
}

/// Notifications raised by the backend on its own schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum BackendEvent {
    PortRegistered(RawPort),
    PortUnregistered(RawPort),
    PortsConnected { output: RawPort, input: RawPort },
    PortsDisconnected { output: RawPort, input: RawPort },
    ClientRegistered { name: String },
    ClientUnregistered { name: String },
    /// A queued connect/disconnect was rejected by the server
    CallFailed { message: String },
    /// The server went away; the handle is dead
    Shutdown { reason: String },
}

/// Minimal surface of a native media-server binding.
///
/// `connect` and `disconnect` must not wait on the server: they queue the
/// request and report asynchronous rejections as [`BackendEvent::CallFailed`].
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait Backend: Send + Sync {
    /// Connection type this backend serves.
    fn connection_type(&self) -> ConnectionType;

    /// Human-readable backend name, for logs.
    fn name(&self) -> String;

    /// Open a client handle on the server and start delivering events.
    fn open(&self, client_name: &str, events: EventSink) -> BackendResult<()>;

    /// Make the opened client live.
    fn activate(&self) -> BackendResult<()>;

    /// Enumerate ports currently on the server.
    fn list_ports(&self, query: &PortQuery) -> BackendResult<Vec<RawPort>>;

    /// Queue a connection between two ports.
    fn connect(&self, output: &str, input: &str) -> BackendResult<()>;

    /// Queue removal of a connection between two ports.
    fn disconnect(&self, output: &str, input: &str) -> BackendResult<()>;

    /// Release the handle. Safe to call when not open.
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::Error;
    use crate::port::{AUDIO_PORT_TYPE, MIDI_PORT_TYPE};

    fn raw(full_name: &str, direction: PortDirection, port_type: &str) -> RawPort {
        RawPort {
            id: 1,
            full_name: full_name.to_string(),
            direction,
            port_type: port_type.to_string(),
            connections: Vec::new(),
        }
    }

    #[test]
    fn test_query_for_type() {
        let query = PortQuery::for_type(ConnectionType::Midi);

        assert!(query.matches(&raw("a2j:in", PortDirection::In, MIDI_PORT_TYPE)));
        assert!(!query.matches(&raw("system:capture_1", PortDirection::Out, AUDIO_PORT_TYPE)));
    }

    #[test]
    fn test_query_name_and_direction() {
        let query = PortQuery::for_type(ConnectionType::Audio)
            .with_name("^system:")
            .with_direction(PortDirection::Out);

        assert!(query.matches(&raw("system:capture_1", PortDirection::Out, AUDIO_PORT_TYPE)));
        assert!(!query.matches(&raw("system:playback_1", PortDirection::In, AUDIO_PORT_TYPE)));
        assert!(!query.matches(&raw("synth:out", PortDirection::Out, AUDIO_PORT_TYPE)));
    }

    #[test]
    fn test_invalid_pattern_matches_nothing() {
        let query = PortQuery::default().with_name("(unclosed");

        assert_matches!(query.validate(), Err(Error::InvalidPattern(_)));
        assert!(!query.matches(&raw("a:b", PortDirection::Out, AUDIO_PORT_TYPE)));
    }

    #[test]
    fn test_default_query_matches_everything() {
        assert!(PortQuery::default().matches(&raw("x:y", PortDirection::In, "weird type")));
    }

    #[test]
    fn test_raw_port_conversion() {
        let audio = raw("system:capture_1", PortDirection::Out, AUDIO_PORT_TYPE);
        let port = audio.to_port(ConnectionType::Audio).expect("valid").expect("audio port");
        assert_eq!(port.client(), "system");

        assert_matches!(audio.to_port(ConnectionType::Midi), Ok(None));
        assert_matches!(
            raw("broken", PortDirection::Out, AUDIO_PORT_TYPE).to_port(ConnectionType::Audio),
            Err(Error::MalformedPortName(_))
        );
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = BackendEvent::Shutdown { reason: "server exited".to_string() };
        let json = serde_json::to_value(&event).expect("serializable");

        assert_eq!(json["type"], "shutdown");
        assert_eq!(json["data"]["reason"], "server exited");
    }
}
