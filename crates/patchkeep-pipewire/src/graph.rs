//! Registry mirror for the PipeWire graph.

use std::collections::HashMap;

use parking_lot::RwLock;
use patchkeep_core::{PortDirection, RawPort};
use tracing::debug;

use crate::link::{LinkInfo, LinkParams};
use crate::node::{NodeInfo, PortInfo};

/// Cached view of the registry globals a backend cares about.
///
/// Written by the PipeWire thread, read by the backend to resolve composite
/// port names into object ids.
#[derive(Debug, Default)]
pub struct GraphCache {
    /// Cached nodes by ID
    nodes: RwLock<HashMap<u32, NodeInfo>>,
    /// Cached ports by ID
    ports: RwLock<HashMap<u32, PortInfo>>,
    /// Cached links by ID
    links: RwLock<HashMap<u32, LinkInfo>>,
}

impl GraphCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, e.g. after the connection to the server is lost.
    pub fn clear(&self) {
        self.nodes.write().clear();
        self.ports.write().clear();
        self.links.write().clear();
    }

    pub fn add_node(&self, node: NodeInfo) {
        debug!(id = node.id, name = %node.name, "Node added to graph");
        self.nodes.write().insert(node.id, node);
    }

    pub fn remove_node(&self, id: u32) -> Option<NodeInfo> {
        self.nodes.write().remove(&id)
    }

    pub fn add_port(&self, port: PortInfo) {
        debug!(id = port.id, name = %port.name, node_id = port.node_id, "Port added");
        self.ports.write().insert(port.id, port);
    }

    pub fn remove_port(&self, id: u32) -> Option<PortInfo> {
        self.ports.write().remove(&id)
    }

    pub fn add_link(&self, link: LinkInfo) {
        debug!(id = link.id, output = link.output_port, input = link.input_port, "Link added");
        self.links.write().insert(link.id, link);
    }

    pub fn remove_link(&self, id: u32) -> Option<LinkInfo> {
        self.links.write().remove(&id)
    }

    /// Composite `"<node>:<port>"` name. Ports whose node is not known yet
    /// fall back to the node id.
    #[must_use]
    pub fn full_name(&self, port: &PortInfo) -> String {
        match self.nodes.read().get(&port.node_id) {
            Some(node) => format!("{}:{}", node.name, port.name),
            None => format!("{}:{}", port.node_id, port.name),
        }
    }

    /// Backend-neutral view of one cached port, with its peers.
    #[must_use]
    pub fn raw_port(&self, port_id: u32) -> Option<RawPort> {
        let port = self.ports.read().get(&port_id).cloned()?;
        Some(self.to_raw(&port))
    }

    /// Backend-neutral view of every cached port, ordered by object id.
    #[must_use]
    pub fn raw_ports(&self) -> Vec<RawPort> {
        let mut ports: Vec<PortInfo> = self.ports.read().values().cloned().collect();
        ports.sort_by_key(|p| p.id);
        ports.iter().map(|p| self.to_raw(p)).collect()
    }

    fn to_raw(&self, port: &PortInfo) -> RawPort {
        let peers: Vec<u32> = self
            .links
            .read()
            .values()
            .filter_map(|l| match port.direction {
                PortDirection::Out if l.output_port == port.id => Some(l.input_port),
                PortDirection::In if l.input_port == port.id => Some(l.output_port),
                _ => None,
            })
            .collect();

        let connections = {
            let ports = self.ports.read();
            peers.iter().filter_map(|id| ports.get(id)).map(|p| self.full_name(p)).collect()
        };

        RawPort {
            id: port.id,
            full_name: self.full_name(port),
            direction: port.direction,
            port_type: port.port_type.clone(),
            connections,
        }
    }

    /// Find a port by composite name and direction.
    #[must_use]
    pub fn find_port(&self, full_name: &str, direction: PortDirection) -> Option<PortInfo> {
        let (node_name, port_name) = full_name.split_once(':')?;
        let node_ids: Vec<u32> =
            self.nodes.read().values().filter(|n| n.name == node_name).map(|n| n.id).collect();
        self.ports
            .read()
            .values()
            .find(|p| p.direction == direction && p.name == port_name && node_ids.contains(&p.node_id))
            .cloned()
    }

    /// Resolve two composite names into link creation parameters.
    #[must_use]
    pub fn link_params(&self, output: &str, input: &str) -> Option<LinkParams> {
        let out = self.find_port(output, PortDirection::Out)?;
        let inp = self.find_port(input, PortDirection::In)?;
        Some(LinkParams {
            output_node: out.node_id,
            output_port: out.id,
            input_node: inp.node_id,
            input_port: inp.id,
        })
    }

    /// Id of the link between two named ports, if any.
    #[must_use]
    pub fn find_link(&self, output: &str, input: &str) -> Option<u32> {
        let out = self.find_port(output, PortDirection::Out)?;
        let inp = self.find_port(input, PortDirection::In)?;
        self.links
            .read()
            .values()
            .find(|l| l.output_port == out.id && l.input_port == inp.id)
            .map(|l| l.id)
    }

    /// Both ends of a cached link as raw ports.
    #[must_use]
    pub fn link_ends(&self, link: &LinkInfo) -> Option<(RawPort, RawPort)> {
        Some((self.raw_port(link.output_port)?, self.raw_port(link.input_port)?))
    }
}
