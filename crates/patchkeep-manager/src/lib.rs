//! Patchkeep Manager - keeps a port graph in sync with a media-server backend.
//!
//! A [`ConnectionManager`] owns one backend of one connection type. It
//! activates the backend, mirrors its port graph, turns user selections into
//! connect/disconnect requests and polls for the server whenever it goes away.

pub mod config;
pub mod manager;

pub use config::{DEFAULT_CLIENT_NAME, DEFAULT_RETRY_INTERVAL, ManagerConfig};
pub use manager::ConnectionManager;
