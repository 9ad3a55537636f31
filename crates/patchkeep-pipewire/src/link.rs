//! PipeWire link records.

use serde::{Deserialize, Serialize};

/// Information about a PipeWire link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    /// PipeWire object ID
    pub id: u32,
    /// Output (source) port ID
    pub output_port: u32,
    /// Input (destination) port ID
    pub input_port: u32,
}

impl LinkInfo {
    /// Parse a link global.
    pub fn from_props<'a>(id: u32, get: impl Fn(&str) -> Option<&'a str>) -> Option<Self> {
        Some(Self {
            id,
            output_port: get("link.output.port")?.parse().ok()?,
            input_port: get("link.input.port")?.parse().ok()?,
        })
    }
}

/// Parameters for creating a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParams {
    /// Output node ID
    pub output_node: u32,
    /// Output port ID
    pub output_port: u32,
    /// Input node ID
    pub input_node: u32,
    /// Input port ID
    pub input_port: u32,
}
