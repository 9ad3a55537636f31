//! Ports and the enumerations that classify them.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Port type string the media server uses for audio ports.
pub const AUDIO_PORT_TYPE: &str = "32 bit float mono audio";

/// Port type string the media server uses for MIDI ports.
pub const MIDI_PORT_TYPE: &str = "8 bit raw midi";

/// Transport family of a port. Pairing and backend dispatch never cross types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Sample-stream audio ports
    Audio,
    /// MIDI / event ports
    Midi,
}

impl ConnectionType {
    /// Backend port-type string for this connection type.
    #[must_use]
    pub fn port_type(self) -> &'static str {
        match self {
            Self::Audio => AUDIO_PORT_TYPE,
            Self::Midi => MIDI_PORT_TYPE,
        }
    }

    /// Classify a backend port-type string.
    #[must_use]
    pub fn from_port_type(port_type: &str) -> Option<Self> {
        match port_type {
            AUDIO_PORT_TYPE => Some(Self::Audio),
            MIDI_PORT_TYPE => Some(Self::Midi),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Midi => f.write_str("midi"),
        }
    }
}

/// Flow direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Inlet (receives data)
    In,
    /// Outlet (sends data)
    Out,
}

/// One endpoint in the media-server graph.
///
/// Identity is the composite of client, name, direction and connection type.
/// The numeric id is informational: the server may hand out a new one after a
/// restart while the port is still the same entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    id: u32,
    client: String,
    name: String,
    direction: PortDirection,
    connection_type: ConnectionType,
}

impl Port {
    /// Build a port from its composite `"<client>:<port>"` name.
    ///
    /// Only the first colon separates client from port, so port names may
    /// themselves contain colons.
    pub fn from_full_name(
        full_name: &str,
        direction: PortDirection,
        connection_type: ConnectionType,
        id: u32,
    ) -> Result<Self> {
        match full_name.split_once(':') {
            Some((client, name)) if !client.is_empty() && !name.is_empty() => Ok(Self {
                id,
                client: client.to_string(),
                name: name.to_string(),
                direction,
                connection_type,
            }),
            _ => Err(Error::MalformedPortName(full_name.to_string())),
        }
    }

    /// Backend-assigned numeric id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Owning client name.
    #[must_use]
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Port name local to its client.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    #[must_use]
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Composite `"<client>:<port>"` name, as the backend addresses it.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.client, self.name)
    }

    #[must_use]
    pub fn is_outlet(&self) -> bool {
        self.direction == PortDirection::Out
    }

    #[must_use]
    pub fn is_inlet(&self) -> bool {
        self.direction == PortDirection::In
    }
}

impl PartialEq for Port {
    fn eq(&self, other: &Self) -> bool {
        self.client == other.client
            && self.name == other.name
            && self.direction == other.direction
            && self.connection_type == other.connection_type
    }
}

impl Eq for Port {}

impl Hash for Port {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.client.hash(state);
        self.name.hash(state);
        self.direction.hash(state);
        self.connection_type.hash(state);
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.client, self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_full_name_splits_client_and_port() {
        let port =
            Port::from_full_name("client:sub", PortDirection::Out, ConnectionType::Audio, 7)
                .expect("valid name");

        assert_eq!(port.client(), "client");
        assert_eq!(port.name(), "sub");
        assert_eq!(port.id(), 7);
        assert_eq!(port.full_name(), "client:sub");
    }

    #[test]
    fn test_split_happens_on_first_colon_only() {
        let port = Port::from_full_name(
            "a2j:Midi Through [14] (capture): Midi Through Port-0",
            PortDirection::Out,
            ConnectionType::Midi,
            1,
        )
        .expect("valid name");

        assert_eq!(port.client(), "a2j");
        assert_eq!(port.name(), "Midi Through [14] (capture): Midi Through Port-0");
    }

    #[test]
    fn test_name_without_colon_is_malformed() {
        let result = Port::from_full_name("nocolon", PortDirection::In, ConnectionType::Audio, 1);
        assert_matches!(result, Err(Error::MalformedPortName(name)) if name == "nocolon");
    }

    #[test]
    fn test_empty_halves_are_malformed() {
        assert!(Port::from_full_name(":x", PortDirection::In, ConnectionType::Audio, 1).is_err());
        assert!(Port::from_full_name("x:", PortDirection::In, ConnectionType::Audio, 1).is_err());
    }

    #[test]
    fn test_identity_ignores_id() {
        let a = Port::from_full_name("sys:out", PortDirection::Out, ConnectionType::Audio, 1)
            .expect("valid name");
        let b = Port::from_full_name("sys:out", PortDirection::Out, ConnectionType::Audio, 99)
            .expect("valid name");
        let c = Port::from_full_name("sys:out", PortDirection::In, ConnectionType::Audio, 1)
            .expect("valid name");
        let d = Port::from_full_name("sys:out", PortDirection::Out, ConnectionType::Midi, 1)
            .expect("valid name");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);

        let set: HashSet<Port> = [a, b, c, d].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_port_type_round_trip() {
        assert_eq!(ConnectionType::from_port_type(AUDIO_PORT_TYPE), Some(ConnectionType::Audio));
        assert_eq!(ConnectionType::from_port_type(MIDI_PORT_TYPE), Some(ConnectionType::Midi));
        assert_eq!(ConnectionType::from_port_type("32 bit float RGBA video"), None);
        assert_eq!(ConnectionType::Midi.port_type(), MIDI_PORT_TYPE);
    }
}
