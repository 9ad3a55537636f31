//! Manager state and the change events it raises.

use serde::{Deserialize, Serialize};

use crate::client::Connectable;
use crate::connection::Connection;
use crate::port::ConnectionType;

/// Lifecycle of a connection manager against its backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    /// No live backend handle; reconnection polling may be armed
    #[default]
    Disconnected,
    /// Opening and activating the backend
    Connecting,
    /// Backend reachable and snapshot current
    Active,
}

/// What a [`ConnectionEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Ports or connections appeared
    New,
    /// Ports or connections went away
    Removed,
    /// The backend exited; the graph is offline
    BackendExited,
    /// A new connection to the backend was established
    BackendConnected,
    /// Informational or failure message without graph content
    Message,
}

/// Severity attached to every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

/// Normalized change notification sent to manager subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub change: ChangeType,
    pub connection_type: ConnectionType,
    pub connectables: Vec<Connectable>,
    pub connections: Vec<Connection>,
    pub message: Option<String>,
    pub severity: Severity,
}

impl ConnectionEvent {
    /// Graph change carrying ports/clients and connections.
    #[must_use]
    pub fn graph(
        change: ChangeType,
        connection_type: ConnectionType,
        connectables: Vec<Connectable>,
        connections: Vec<Connection>,
    ) -> Self {
        Self {
            change,
            connection_type,
            connectables,
            connections,
            message: None,
            severity: Severity::Info,
        }
    }

    /// Message-only event.
    #[must_use]
    pub fn message(connection_type: ConnectionType, severity: Severity, message: String) -> Self {
        Self {
            change: ChangeType::Message,
            connection_type,
            connectables: Vec::new(),
            connections: Vec::new(),
            message: Some(message),
            severity,
        }
    }

    /// Attach a message and severity.
    #[must_use]
    pub fn with_message(mut self, severity: Severity, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self.severity = severity;
        self
    }
}
