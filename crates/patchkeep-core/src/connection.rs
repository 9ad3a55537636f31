//! Directed connections between an outlet and an inlet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::port::{ConnectionType, Port, PortDirection};

/// An edge from an outlet port to an inlet port of the same connection type.
///
/// Slots only accept ports of the right direction and type; anything else is
/// ignored and the slot stays empty. Both accessors return `None` until the
/// connection is well-formed, so callers only ever see complete edges.
/// Deserialization goes through the same slot checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ConnectionRepr")]
pub struct Connection {
    connection_type: ConnectionType,
    outlet: Option<Port>,
    inlet: Option<Port>,
}

impl Connection {
    /// Create an empty connection for the given type.
    #[must_use]
    pub fn new(connection_type: ConnectionType) -> Self {
        Self { connection_type, outlet: None, inlet: None }
    }

    /// Build a well-formed connection, or `None` if the ports are incompatible.
    #[must_use]
    pub fn between(outlet: Port, inlet: Port) -> Option<Self> {
        let mut connection = Self::new(outlet.connection_type());
        connection.set_outlet(outlet);
        connection.set_inlet(inlet);
        connection.is_well_formed().then_some(connection)
    }

    #[must_use]
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Assign the outlet slot. Returns `false` (slot unchanged) on a direction
    /// or type mismatch.
    pub fn set_outlet(&mut self, port: Port) -> bool {
        if port.direction() != PortDirection::Out || port.connection_type() != self.connection_type
        {
            return false;
        }
        self.outlet = Some(port);
        true
    }

    /// Assign the inlet slot. Returns `false` (slot unchanged) on a direction
    /// or type mismatch.
    pub fn set_inlet(&mut self, port: Port) -> bool {
        if port.direction() != PortDirection::In || port.connection_type() != self.connection_type {
            return false;
        }
        self.inlet = Some(port);
        true
    }

    #[must_use]
    pub fn outlet(&self) -> Option<&Port> {
        if self.is_well_formed() { self.outlet.as_ref() } else { None }
    }

    #[must_use]
    pub fn inlet(&self) -> Option<&Port> {
        if self.is_well_formed() { self.inlet.as_ref() } else { None }
    }

    /// Outlet slot holds an `Out` port and inlet slot an `In` port, both of
    /// this connection's type.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match (&self.outlet, &self.inlet) {
            (Some(outlet), Some(inlet)) => {
                outlet.is_outlet()
                    && inlet.is_inlet()
                    && outlet.connection_type() == self.connection_type
                    && inlet.connection_type() == self.connection_type
            }
            _ => false,
        }
    }

    /// Whether this edge touches the given port on either end.
    #[must_use]
    pub fn involves(&self, port: &Port) -> bool {
        self.outlet.as_ref() == Some(port) || self.inlet.as_ref() == Some(port)
    }

    /// Whether this edge runs between the two given ports.
    #[must_use]
    pub fn links(&self, outlet: &Port, inlet: &Port) -> bool {
        self.outlet.as_ref() == Some(outlet) && self.inlet.as_ref() == Some(inlet)
    }
}

#[derive(Deserialize)]
struct ConnectionRepr {
    connection_type: ConnectionType,
    outlet: Option<Port>,
    inlet: Option<Port>,
}

impl TryFrom<ConnectionRepr> for Connection {
    type Error = Error;

    fn try_from(repr: ConnectionRepr) -> Result<Self, Self::Error> {
        let mut connection = Self::new(repr.connection_type);
        if let Some(outlet) = repr.outlet
            && !connection.set_outlet(outlet.clone())
        {
            return Err(Error::InvalidConnection(format!(
                "{outlet} ({:?}) cannot be a {} outlet",
                outlet.direction(),
                repr.connection_type
            )));
        }
        if let Some(inlet) = repr.inlet
            && !connection.set_inlet(inlet.clone())
        {
            return Err(Error::InvalidConnection(format!(
                "{inlet} ({:?}) cannot be a {} inlet",
                inlet.direction(),
                repr.connection_type
            )));
        }
        Ok(connection)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.connection_type == other.connection_type
            && self.outlet == other.outlet
            && self.inlet == other.inlet
    }
}

impl Eq for Connection {}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.outlet(), self.inlet()) {
            (Some(outlet), Some(inlet)) => write!(f, "{outlet} -> {inlet}"),
            _ => write!(f, "<incomplete {} connection>", self.connection_type),
        }
    }
}
