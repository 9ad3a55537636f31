//! Patchkeep PipeWire - backend over a PipeWire client connection.
//!
//! This crate handles all interactions with PipeWire, including:
//! - Connecting to the PipeWire daemon on a dedicated thread
//! - Mirroring nodes, ports and links from the registry
//! - Creating and destroying links by composite port name
//! - Reporting server exit and rejected requests as backend events

pub mod backend;
pub mod error;
pub mod graph;
pub mod link;
pub mod node;
pub mod runtime;

pub use backend::PipeWireBackend;
pub use error::{PwError, PwResult};
pub use graph::GraphCache;
pub use runtime::PipeWireRuntime;
