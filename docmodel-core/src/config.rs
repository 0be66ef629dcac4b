//! Connection configuration read at bind time.
//!
//! The configuration is a small YAML document:
//!
//! ```yaml
//! host: localhost
//! port: "27017"
//! db_name: example
//! timeout_ms: 2000
//! ```
//!
//! `port` may be written as a number or as a numeric string. `db_name` and
//! `timeout_ms` are optional; without `db_name` the database is named after the
//! model being bound.

use serde::{Deserialize, Deserializer};
use std::{fs, path::Path, time::Duration};

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "port_text")]
    pub port: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
    /// Upper bound for server selection and connection attempts.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// A validated configuration, ready to open a client with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub timeout: Option<Duration>,
}

impl StoreConfig {
    /// Parses a YAML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Connection`] if the text is not a valid configuration.
    pub fn from_yaml_str(text: &str) -> ModelResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| ModelError::Connection(format!("invalid configuration: {e}")))
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ModelError::Connection(format!("cannot read configuration {}: {e}", path.display()))
        })?;

        Self::from_yaml_str(&text)
    }

    /// Validates the configuration for binding `model_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Connection`] if `host` or `port` is missing, or `port`
    /// is not a number.
    pub fn resolve(&self, model_name: &str) -> ModelResult<ConnectionSettings> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ModelError::Connection("host must be present in configuration".into()))?;

        let port = self
            .port
            .as_deref()
            .map(str::trim)
            .filter(|port| !port.is_empty())
            .ok_or_else(|| ModelError::Connection("port must be present in configuration".into()))?;

        if !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(ModelError::Connection(format!(
                "port must be a numeric value, got {port:?}"
            )));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| ModelError::Connection(format!("port {port} is out of range")))?;

        let database = match self.db_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => model_name.to_lowercase(),
        };

        Ok(ConnectionSettings {
            host: host.to_string(),
            port,
            database,
            timeout: self.timeout_ms.map(Duration::from_millis),
        })
    }
}

fn port_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(i64),
        Text(String),
    }

    Ok(Option::<Port>::deserialize(deserializer)?.map(|port| match port {
        Port::Number(n) => n.to_string(),
        Port::Text(text) => text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_full_configuration() {
        let config = StoreConfig::from_yaml_str(
            "host: localhost\nport: \"27017\"\ndb_name: shop\ntimeout_ms: 1500\n",
        )
        .unwrap();

        assert_eq!(
            config.resolve("Example").unwrap(),
            ConnectionSettings {
                host: "localhost".into(),
                port: 27017,
                database: "shop".into(),
                timeout: Some(Duration::from_millis(1500)),
            }
        );
    }

    #[test]
    fn numeric_port_and_model_named_database() {
        let config = StoreConfig::from_yaml_str("host: db.internal\nport: 27018\n").unwrap();
        let settings = config.resolve("Example").unwrap();

        assert_eq!(settings.port, 27018);
        assert_eq!(settings.database, "example");
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn missing_host_is_a_connection_error() {
        let config = StoreConfig::from_yaml_str("port: 27017\n").unwrap();

        assert!(matches!(config.resolve("m"), Err(ModelError::Connection(_))));
    }

    #[test]
    fn blank_or_missing_port_is_a_connection_error() {
        for text in ["host: localhost\n", "host: localhost\nport: \"\"\n"] {
            let config = StoreConfig::from_yaml_str(text).unwrap();

            assert!(matches!(config.resolve("m"), Err(ModelError::Connection(_))));
        }
    }

    #[test]
    fn non_numeric_port_is_a_connection_error() {
        let config = StoreConfig::from_yaml_str("host: localhost\nport: abc\n").unwrap();

        match config.resolve("m") {
            Err(ModelError::Connection(message)) => assert!(message.contains("numeric")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn negative_port_is_not_numeric() {
        let config = StoreConfig::from_yaml_str("host: localhost\nport: -1\n").unwrap();

        assert!(matches!(config.resolve("m"), Err(ModelError::Connection(_))));
    }

    #[test]
    fn unreadable_file_is_a_connection_error() {
        let result = StoreConfig::from_file("/definitely/not/here/config.yml");

        assert!(matches!(result, Err(ModelError::Connection(_))));
    }
}
