//! PipeWire node and port records.
//!
//! Records are built from registry global properties. Parsing goes through a
//! lookup closure so it does not depend on a live property dictionary.

use patchkeep_core::PortDirection;
use serde::{Deserialize, Serialize};

/// Information about a PipeWire node, the equivalent of a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// PipeWire object ID
    pub id: u32,
    /// Node name, used as the client half of composite port names
    pub name: String,
    /// Application name (for client nodes)
    pub application_name: Option<String>,
}

impl NodeInfo {
    /// Parse a node global. Nodes without a name are ignored.
    pub fn from_props<'a>(id: u32, get: impl Fn(&str) -> Option<&'a str>) -> Option<Self> {
        let name = get("node.name").filter(|n| !n.is_empty())?;
        Some(Self {
            id,
            name: name.to_string(),
            application_name: get("application.name").map(String::from),
        })
    }
}

/// Information about a PipeWire port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// PipeWire object ID
    pub id: u32,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Parent node ID
    pub node_id: u32,
    /// DSP format string ("32 bit float mono audio", "8 bit raw midi")
    pub port_type: String,
}

impl PortInfo {
    /// Parse a port global. Ports without a name, a parent node or a known
    /// direction are ignored.
    pub fn from_props<'a>(id: u32, get: impl Fn(&str) -> Option<&'a str>) -> Option<Self> {
        let name = get("port.name").filter(|n| !n.is_empty())?;
        let node_id = get("node.id")?.parse().ok()?;
        let direction = match get("port.direction")? {
            "in" => PortDirection::In,
            "out" => PortDirection::Out,
            _ => return None,
        };

        Some(Self {
            id,
            name: name.to_string(),
            direction,
            node_id,
            port_type: get("format.dsp").unwrap_or_default().to_string(),
        })
    }
}
