//! Connection manager configuration.

use std::time::Duration;

use patchkeep_core::{ConnectionType, Error, PortQuery, Result};
use serde::{Deserialize, Serialize};

/// Default interval between reconnection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Default client name registered with the media server.
pub const DEFAULT_CLIENT_NAME: &str = "patchkeep";

/// Settings for one connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Client name to open on the server
    pub client_name: String,
    /// Delay between reconnection attempts while the backend is away
    pub retry_interval: Duration,
    /// Optional regex restricting which ports (by composite name) are managed
    pub port_filter: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            port_filter: None,
        }
    }
}

impl ManagerConfig {
    /// Reject configurations that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(Error::InvalidConfig("client name must not be empty".to_string()));
        }
        if self.retry_interval.is_zero() {
            return Err(Error::InvalidConfig("retry interval must be positive".to_string()));
        }
        self.scan_query(ConnectionType::Audio).validate()
    }

    /// Port query used for scans and for filtering backend notifications.
    #[must_use]
    pub fn scan_query(&self, connection_type: ConnectionType) -> PortQuery {
        let query = PortQuery::for_type(connection_type);
        match &self.port_filter {
            Some(pattern) => query.with_name(pattern),
            None => query,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ManagerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let empty_name = ManagerConfig { client_name: "  ".to_string(), ..Default::default() };
        assert_matches!(empty_name.validate(), Err(Error::InvalidConfig(_)));

        let zero = ManagerConfig { retry_interval: Duration::ZERO, ..Default::default() };
        assert_matches!(zero.validate(), Err(Error::InvalidConfig(_)));

        let bad_filter =
            ManagerConfig { port_filter: Some("[unclosed".to_string()), ..Default::default() };
        assert_matches!(bad_filter.validate(), Err(Error::InvalidPattern(_)));
    }

    #[test]
    fn test_scan_query_applies_filter() {
        let config = ManagerConfig { port_filter: Some("^system:".to_string()), ..Default::default() };
        let query = config.scan_query(ConnectionType::Midi);

        assert_eq!(query.name_pattern.as_deref(), Some("^system:"));
        assert!(query.type_pattern.is_some());
    }
}
