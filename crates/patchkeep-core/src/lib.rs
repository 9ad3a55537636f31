//! Patchkeep Core - port graph model, pairing and client grouping.
//!
//! This crate contains the domain types shared by the connection manager and
//! the backends:
//! - Ports, connections and connection types
//! - Client grouping and the outlet/inlet pairing algorithm
//! - The graph snapshot a manager keeps current
//! - The `Backend` capability a media-server binding implements

pub mod backend;
pub mod client;
pub mod connection;
pub mod error;
pub mod event;
pub mod moment;
pub mod pairing;
pub mod port;
pub mod snapshot;

#[cfg(any(test, feature = "mock"))]
pub use backend::MockBackend;
pub use backend::{Backend, BackendError, BackendEvent, BackendResult, EventSink, PortQuery, RawPort};
pub use client::{Client, ClientTree, Connectable, group_clients};
pub use connection::Connection;
pub use error::{Error, Result};
pub use event::{ChangeType, ConnectionEvent, ManagerState, Severity};
pub use moment::{ConnectionDescriptor, Moment};
pub use pairing::{pair_all, pair_ports};
pub use port::{ConnectionType, Port, PortDirection};
pub use snapshot::GraphSnapshot;
