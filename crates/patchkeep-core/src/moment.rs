//! Session moments: what to relaunch and what to reconnect.

use serde::{Deserialize, Serialize};

use crate::connection::Connection;

/// A connection by composite port names, independent of server-side ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Outlet `"<client>:<port>"` name
    pub output: String,
    /// Inlet `"<client>:<port>"` name
    pub input: String,
}

impl ConnectionDescriptor {
    #[must_use]
    pub fn new(output: impl Into<String>, input: impl Into<String>) -> Self {
        Self { output: output.into(), input: input.into() }
    }

    /// Describe a well-formed connection; `None` for an incomplete one.
    #[must_use]
    pub fn from_connection(connection: &Connection) -> Option<Self> {
        Some(Self::new(connection.outlet()?.full_name(), connection.inlet()?.full_name()))
    }
}

/// A saved session moment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moment {
    /// Moment name
    pub name: String,
    /// Application identifiers to relaunch, in order
    #[serde(default)]
    pub applications: Vec<String>,
    /// Connections to re-establish, in order
    #[serde(default)]
    pub connections: Vec<ConnectionDescriptor>,
}

impl Moment {
    /// Create an empty moment.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    /// Append descriptors for each well-formed connection, skipping ones
    /// already present.
    pub fn record<'a, I>(&mut self, connections: I)
    where
        I: IntoIterator<Item = &'a Connection>,
    {
        for descriptor in connections.into_iter().filter_map(ConnectionDescriptor::from_connection)
        {
            if !self.connections.contains(&descriptor) {
                self.connections.push(descriptor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{ConnectionType, Port, PortDirection};

    fn connection(output: &str, input: &str) -> Connection {
        let outlet = Port::from_full_name(output, PortDirection::Out, ConnectionType::Audio, 0)
            .expect("valid name");
        let inlet = Port::from_full_name(input, PortDirection::In, ConnectionType::Audio, 0)
            .expect("valid name");
        Connection::between(outlet, inlet).expect("compatible")
    }

    #[test]
    fn test_record_deduplicates_and_keeps_order() {
        let connections = vec![
            connection("synth:L", "system:playback_1"),
            connection("synth:R", "system:playback_2"),
            connection("synth:L", "system:playback_1"),
        ];
        let mut moment = Moment::new("live set");
        moment.record(&connections);

        assert_eq!(
            moment.connections,
            vec![
                ConnectionDescriptor::new("synth:L", "system:playback_1"),
                ConnectionDescriptor::new("synth:R", "system:playback_2"),
            ]
        );
    }

    #[test]
    fn test_incomplete_connection_not_described() {
        assert!(ConnectionDescriptor::from_connection(&Connection::new(ConnectionType::Midi))
            .is_none());
    }

    #[test]
    fn test_deserialize_with_missing_lists() {
        let moment: Moment = serde_json::from_str(r#"{"name":"empty"}"#).expect("valid json");
        assert!(moment.applications.is_empty());
        assert!(moment.connections.is_empty());
    }
}
