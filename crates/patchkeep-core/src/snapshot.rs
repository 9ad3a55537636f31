//! Materialized view of the live port graph for one connection type.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::RawPort;
use crate::client::{Client, group_clients};
use crate::connection::Connection;
use crate::port::{ConnectionType, Port, PortDirection};

/// Live ports and connections of one connection type.
///
/// A snapshot with `is_active == false` is stale: it describes a backend that
/// is gone and must not be handed out as current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    connection_type: ConnectionType,
    ports: Vec<Port>,
    connections: Vec<Connection>,
    is_active: bool,
}

impl GraphSnapshot {
    /// Create an empty, inactive snapshot.
    #[must_use]
    pub fn new(connection_type: ConnectionType) -> Self {
        Self { connection_type, ports: Vec::new(), connections: Vec::new(), is_active: false }
    }

    /// Build an active snapshot from a full backend scan.
    ///
    /// Ports of other types are ignored; malformed names are skipped with a
    /// warning. Connections are read from the outlets' connection lists and
    /// kept only when both ends are known.
    #[must_use]
    pub fn from_scan(connection_type: ConnectionType, raw_ports: &[RawPort]) -> Self {
        let mut snapshot = Self::new(connection_type);

        for raw in raw_ports {
            match raw.to_port(connection_type) {
                Ok(Some(port)) => {
                    snapshot.add_port(port);
                }
                Ok(None) => {}
                Err(e) => warn!(id = raw.id, error = %e, "Skipping port"),
            }
        }

        for raw in raw_ports.iter().filter(|r| r.direction == PortDirection::Out) {
            let Some(outlet) = snapshot.find_port(&raw.full_name, PortDirection::Out).cloned() else {
                continue;
            };
            for peer in &raw.connections {
                let Some(inlet) = snapshot.find_port(peer, PortDirection::In).cloned() else {
                    debug!(outlet = %outlet, peer = %peer, "Ignoring connection to unknown port");
                    continue;
                };
                if let Some(connection) = Connection::between(outlet.clone(), inlet) {
                    snapshot.add_connection(connection);
                }
            }
        }

        snapshot.is_active = true;
        debug!(
            connection_type = %connection_type,
            ports = snapshot.ports.len(),
            connections = snapshot.connections.len(),
            "Snapshot rebuilt"
        );
        snapshot
    }

    #[must_use]
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Mark the snapshot stale.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Live ports in discovery order.
    #[must_use]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Group the live ports into clients.
    #[must_use]
    pub fn clients(&self) -> Vec<Client> {
        group_clients(&self.ports, self.connection_type)
    }

    /// Find a live port by composite name and direction.
    ///
    /// A client may expose an inlet and an outlet under the same name, so the
    /// direction is part of the lookup.
    #[must_use]
    pub fn find_port(&self, full_name: &str, direction: PortDirection) -> Option<&Port> {
        let (client, name) = full_name.split_once(':')?;
        self.ports
            .iter()
            .find(|p| p.direction() == direction && p.client() == client && p.name() == name)
    }

    /// Add a port. Returns `false` if it is of another type or already known.
    pub fn add_port(&mut self, port: Port) -> bool {
        if port.connection_type() != self.connection_type || self.ports.contains(&port) {
            return false;
        }
        debug!(id = port.id(), port = %port, "Port added to snapshot");
        self.ports.push(port);
        true
    }

    /// Remove a port and every connection touching it.
    ///
    /// Returns the removed connections, or `None` if the port was unknown.
    pub fn remove_port(&mut self, port: &Port) -> Option<Vec<Connection>> {
        let index = self.ports.iter().position(|p| p == port)?;
        self.ports.remove(index);

        let (removed, kept): (Vec<_>, Vec<_>) =
            self.connections.drain(..).partition(|c| c.involves(port));
        self.connections = kept;
        debug!(port = %port, dropped_connections = removed.len(), "Port removed from snapshot");
        Some(removed)
    }

    /// Add a well-formed connection. Returns `false` if it is of another
    /// type, incomplete, or already known.
    pub fn add_connection(&mut self, connection: Connection) -> bool {
        if connection.connection_type() != self.connection_type
            || !connection.is_well_formed()
            || self.connections.contains(&connection)
        {
            return false;
        }
        debug!(connection = %connection, "Connection added to snapshot");
        self.connections.push(connection);
        true
    }

    /// Remove the connection between two ports, if present.
    pub fn remove_connection(&mut self, outlet: &Port, inlet: &Port) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.links(outlet, inlet))?;
        let connection = self.connections.remove(index);
        debug!(connection = %connection, "Connection removed from snapshot");
        Some(connection)
    }

    /// Whether a connection between the two ports is known.
    #[must_use]
    pub fn has_connection(&self, outlet: &Port, inlet: &Port) -> bool {
        self.connections.iter().any(|c| c.links(outlet, inlet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{AUDIO_PORT_TYPE, MIDI_PORT_TYPE};

    fn raw(id: u32, full_name: &str, direction: PortDirection, port_type: &str) -> RawPort {
        RawPort {
            id,
            full_name: full_name.to_string(),
            direction,
            port_type: port_type.to_string(),
            connections: Vec::new(),
        }
    }

    fn scan() -> Vec<RawPort> {
        let mut capture = raw(1, "system:capture_1", PortDirection::Out, AUDIO_PORT_TYPE);
        capture.connections = vec!["system:playback_1".to_string(), "ghost:in".to_string()];
        vec![
            capture,
            raw(2, "system:playback_1", PortDirection::In, AUDIO_PORT_TYPE),
            raw(3, "malformed", PortDirection::In, AUDIO_PORT_TYPE),
            raw(4, "a2j:midi_out", PortDirection::Out, MIDI_PORT_TYPE),
        ]
    }

    #[test]
    fn test_from_scan_filters_and_links() {
        let snapshot = GraphSnapshot::from_scan(ConnectionType::Audio, &scan());

        assert!(snapshot.is_active());
        assert_eq!(snapshot.ports().len(), 2);
        assert_eq!(snapshot.connections().len(), 1);
        assert_eq!(snapshot.connections()[0].to_string(), "system:capture_1 -> system:playback_1");
    }

    #[test]
    fn test_new_snapshot_is_inactive_and_empty() {
        let snapshot = GraphSnapshot::new(ConnectionType::Midi);
        assert!(!snapshot.is_active());
        assert!(snapshot.ports().is_empty());
        assert!(snapshot.clients().is_empty());
    }

    #[test]
    fn test_remove_port_cascades_to_connections() {
        let mut snapshot = GraphSnapshot::from_scan(ConnectionType::Audio, &scan());
        let capture = snapshot.find_port("system:capture_1", PortDirection::Out).cloned().expect("known port");

        let removed = snapshot.remove_port(&capture).expect("was present");

        assert_eq!(removed.len(), 1);
        assert!(snapshot.connections().is_empty());
        assert!(snapshot.remove_port(&capture).is_none());
    }

    #[test]
    fn test_add_port_rejects_duplicates_and_other_types() {
        let mut snapshot = GraphSnapshot::new(ConnectionType::Audio);
        let port =
            Port::from_full_name("synth:out", PortDirection::Out, ConnectionType::Audio, 9)
                .expect("valid name");
        let midi = Port::from_full_name("synth:midi", PortDirection::Out, ConnectionType::Midi, 10)
            .expect("valid name");

        assert!(snapshot.add_port(port.clone()));
        assert!(!snapshot.add_port(port));
        assert!(!snapshot.add_port(midi));
    }

    #[test]
    fn test_connection_add_remove() {
        let mut snapshot = GraphSnapshot::from_scan(ConnectionType::Audio, &scan());
        let outlet = snapshot.find_port("system:capture_1", PortDirection::Out).cloned().expect("known port");
        let inlet = snapshot.find_port("system:playback_1", PortDirection::In).cloned().expect("known port");

        assert!(snapshot.has_connection(&outlet, &inlet));
        assert!(snapshot.remove_connection(&outlet, &inlet).is_some());
        assert!(!snapshot.has_connection(&outlet, &inlet));

        let connection = Connection::between(outlet, inlet).expect("compatible");
        assert!(snapshot.add_connection(connection.clone()));
        assert!(!snapshot.add_connection(connection));
        assert!(!snapshot.add_connection(Connection::new(ConnectionType::Audio)));
    }

    #[test]
    fn test_same_name_in_both_directions() {
        let mut out = raw(1, "bridge:midi", PortDirection::Out, MIDI_PORT_TYPE);
        out.connections = vec!["synth:midi".to_string()];
        let mut inp = raw(2, "bridge:midi", PortDirection::In, MIDI_PORT_TYPE);
        inp.connections = vec!["keys:midi".to_string()];
        let scan = vec![
            inp,
            out,
            raw(3, "synth:midi", PortDirection::In, MIDI_PORT_TYPE),
            raw(4, "keys:midi", PortDirection::Out, MIDI_PORT_TYPE),
        ];

        let snapshot = GraphSnapshot::from_scan(ConnectionType::Midi, &scan);

        assert_eq!(snapshot.ports().len(), 4);
        assert_eq!(snapshot.find_port("bridge:midi", PortDirection::Out).map(Port::id), Some(1));
        assert_eq!(snapshot.find_port("bridge:midi", PortDirection::In).map(Port::id), Some(2));
        let names: Vec<String> = snapshot.connections().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["bridge:midi -> synth:midi"]);
    }

    #[test]
    fn test_deactivate_marks_stale() {
        let mut snapshot = GraphSnapshot::from_scan(ConnectionType::Audio, &scan());
        snapshot.deactivate();
        assert!(!snapshot.is_active());
    }
}
