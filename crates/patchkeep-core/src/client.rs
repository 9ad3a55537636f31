//! Client grouping: the bundle view over live ports.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::port::{ConnectionType, Port, PortDirection};

/// A derived grouping of ports sharing owner name, direction and type.
///
/// Equality only considers the grouping key, so a client can accumulate ports
/// as they are discovered and still compare equal to its earlier self.
/// Deserialized clients refuse ports that do not match their key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ClientRepr")]
pub struct Client {
    name: String,
    direction: PortDirection,
    connection_type: ConnectionType,
    ports: Vec<Port>,
}

impl Client {
    /// Create an empty client for the given key.
    #[must_use]
    pub fn new(name: &str, direction: PortDirection, connection_type: ConnectionType) -> Self {
        Self { name: name.to_string(), direction, connection_type, ports: Vec::new() }
    }

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

    /// Ports in discovery order.
    #[must_use]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Whether the port belongs under this client's key.
    #[must_use]
    pub fn accepts(&self, port: &Port) -> bool {
        port.client() == self.name
            && port.direction() == self.direction
            && port.connection_type() == self.connection_type
    }

    /// Append a port. Ports that do not match the key are refused.
    pub fn push(&mut self, port: Port) -> bool {
        if !self.accepts(&port) {
            return false;
        }
        self.ports.push(port);
        true
    }
}

#[derive(Deserialize)]
struct ClientRepr {
    name: String,
    direction: PortDirection,
    connection_type: ConnectionType,
    #[serde(default)]
    ports: Vec<Port>,
}

impl TryFrom<ClientRepr> for Client {
    type Error = Error;

    fn try_from(repr: ClientRepr) -> Result<Self, Self::Error> {
        let mut client = Self::new(&repr.name, repr.direction, repr.connection_type);
        for port in repr.ports {
            if !client.accepts(&port) {
                return Err(Error::InvalidClient(format!(
                    "port {port} does not belong to {} {:?} {} client",
                    repr.name, repr.direction, repr.connection_type
                )));
            }
            client.ports.push(port);
        }
        Ok(client)
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.direction == other.direction
            && self.connection_type == other.connection_type
    }
}

impl Eq for Client {}

/// One unit of a user selection: a single port or a whole client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectable {
    Port(Port),
    Client(Client),
}

impl Connectable {
    /// The ports this selection stands for, in order.
    #[must_use]
    pub fn ports(&self) -> &[Port] {
        match self {
            Self::Port(port) => std::slice::from_ref(port),
            Self::Client(client) => client.ports(),
        }
    }

    #[must_use]
    pub fn direction(&self) -> PortDirection {
        match self {
            Self::Port(port) => port.direction(),
            Self::Client(client) => client.direction(),
        }
    }

    #[must_use]
    pub fn connection_type(&self) -> ConnectionType {
        match self {
            Self::Port(port) => port.connection_type(),
            Self::Client(client) => client.connection_type(),
        }
    }

    /// Display label: the client name, or the composite port name.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Port(port) => port.full_name(),
            Self::Client(client) => client.name().to_string(),
        }
    }
}

impl From<Port> for Connectable {
    fn from(port: Port) -> Self {
        Self::Port(port)
    }
}

impl From<Client> for Connectable {
    fn from(client: Client) -> Self {
        Self::Client(client)
    }
}

/// Group live ports of one connection type into clients.
///
/// Clients come out in first-seen order and keep their ports in discovery
/// order. Ports of other types are ignored.
#[must_use]
pub fn group_clients<'a, I>(ports: I, connection_type: ConnectionType) -> Vec<Client>
where
    I: IntoIterator<Item = &'a Port>,
{
    let mut clients: Vec<Client> = Vec::new();
    let mut index: HashMap<(String, PortDirection), usize> = HashMap::new();

    for port in ports.into_iter().filter(|p| p.connection_type() == connection_type) {
        let key = (port.client().to_string(), port.direction());
        let slot = *index.entry(key).or_insert_with(|| {
            clients.push(Client::new(port.client(), port.direction(), connection_type));
            clients.len() - 1
        });
        if let Some(client) = clients.get_mut(slot) {
            client.ports.push(port.clone());
        }
    }

    clients
}

/// Clients split by direction, for tree or button-row presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTree {
    /// Clients owning outlet ports
    pub outlets: Vec<Client>,
    /// Clients owning inlet ports
    pub inlets: Vec<Client>,
}

impl ClientTree {
    /// Split grouped clients into outlet and inlet branches, preserving order.
    #[must_use]
    pub fn build(clients: &[Client]) -> Self {
        let (outlets, inlets) =
            clients.iter().cloned().partition(|c| c.direction() == PortDirection::Out);
        Self { outlets, inlets }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outlets.is_empty() && self.inlets.is_empty()
    }
}
