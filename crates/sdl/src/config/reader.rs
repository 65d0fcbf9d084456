// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration gathering with source precedence.
//!
//! The reader snapshots all sources at construction (environment first,
//! then every discovered JSON file in order) and hands the validated result
//! to the caller-supplied containers on demand. Containers are one-shot:
//! reading into a non-empty container aborts.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;

use super::paths::{default_conf_directories, find_configuration_files};
use super::{ConfigurationError, DatabaseConfiguration, NamespaceConfiguration, NamespaceConfigurations};
use crate::namespace::is_valid_namespace_syntax;
use crate::sdl_abort;

/// Authoritative database endpoint list: comma-separated `host[:port]`.
pub const DB_SERVERS_ENV_VAR_NAME: &str = "DATABASE_DAEMON_CONF";

/// Later-variant host form, combined with [`DB_PORT_ENV_VAR_NAME`].
pub const DB_HOST_ENV_VAR_NAME: &str = "DATABASE_DAEMON_HOST";

/// Later-variant port, only honored together with [`DB_HOST_ENV_VAR_NAME`].
pub const DB_PORT_ENV_VAR_NAME: &str = "DATABASE_DAEMON_PORT";

/// Source name used for directly supplied JSON documents.
const INPUT_SOURCE_NAME: &str = "<input>";

/// Gathers database and namespace configuration from the environment and
/// JSON configuration files.
#[derive(Debug)]
pub struct ConfigurationReader {
    env_database_servers: Option<String>,
    source_for_database_configuration: Option<String>,
    json_database_configuration: Option<(Value, String)>,
    json_namespace_configurations: HashMap<String, (Value, String)>,
}

impl ConfigurationReader {
    /// Read from the default directories and the process environment.
    pub fn new() -> Result<Self, ConfigurationError> {
        Self::from_directories(&default_conf_directories(), &|name| {
            std::env::var(name).ok()
        })
    }

    /// Read from explicit directories with an injectable environment
    /// lookup. Seam for tests and embedders.
    pub fn from_directories(
        directories: &[PathBuf],
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut reader = Self {
            env_database_servers: None,
            source_for_database_configuration: None,
            json_database_configuration: None,
            json_namespace_configurations: HashMap::new(),
        };

        if let Some(servers) = env(DB_SERVERS_ENV_VAR_NAME) {
            reader.env_database_servers = Some(servers);
            reader.source_for_database_configuration = Some(DB_SERVERS_ENV_VAR_NAME.to_string());
        } else if let Some(host) = env(DB_HOST_ENV_VAR_NAME) {
            let servers = match env(DB_PORT_ENV_VAR_NAME) {
                Some(port) => format!("{host}:{port}"),
                None => host,
            };
            reader.env_database_servers = Some(servers);
            reader.source_for_database_configuration = Some(DB_HOST_ENV_VAR_NAME.to_string());
        }

        for path in find_configuration_files(directories) {
            let source = path.display().to_string();
            let text = std::fs::read_to_string(&path)?;
            reader.read_configuration(&text, &source)?;
        }
        Ok(reader)
    }

    /// Parse one JSON document, discarding previously accumulated namespace
    /// entries. The environment still outranks the document's `database`
    /// block.
    pub fn read_configuration_from_str(&mut self, input: &str) -> Result<(), ConfigurationError> {
        self.json_namespace_configurations.clear();
        self.read_configuration(input, INPUT_SOURCE_NAME)
    }

    fn read_configuration(&mut self, input: &str, source: &str) -> Result<(), ConfigurationError> {
        let tree: Value = serde_json::from_str(input).map_err(|e| {
            let error = ConfigurationError::ParseFailure {
                source_name: source.to_string(),
                line: e.line(),
                message: e.to_string(),
            };
            log::error!("[Config] {error}");
            error
        })?;

        // Environment variable configuration overrides json configuration.
        if self.env_database_servers.is_none() {
            if let Some(database) = tree.get("database") {
                self.json_database_configuration = Some((database.clone(), source.to_string()));
                self.source_for_database_configuration = Some(source.to_string());
            }
        }

        if let Some(shared_data_layer) = tree.get("sharedDataLayer") {
            let entries = shared_data_layer.as_array().ok_or_else(|| {
                invalid_value(source, "sharedDataLayer", shared_data_layer)
            })?;
            for entry in entries {
                let prefix = get_string(entry, "namespacePrefix", source)?;
                self.json_namespace_configurations
                    .insert(prefix, (entry.clone(), source.to_string()));
            }
        }
        Ok(())
    }

    /// Populate an empty [`DatabaseConfiguration`].
    ///
    /// Aborts if `configuration` is already populated (one-shot contract).
    pub fn read_database_configuration(
        &self,
        configuration: &mut DatabaseConfiguration,
    ) -> Result<(), ConfigurationError> {
        if !configuration.is_empty() {
            sdl_abort!("database configuration can be read only into an empty container");
        }
        let result = self.read_database_configuration_impl(configuration);
        if let Err(ref error) = result {
            log::error!("[Config] {error}");
        }
        result
    }

    fn read_database_configuration_impl(
        &self,
        configuration: &mut DatabaseConfiguration,
    ) -> Result<(), ConfigurationError> {
        if let Some(servers) = &self.env_database_servers {
            // Environment deployments are always standalone.
            let source = self
                .source_for_database_configuration
                .as_deref()
                .unwrap_or(DB_SERVERS_ENV_VAR_NAME);
            validate_and_set_db_type("redis-standalone", configuration, source)?;
            for token in servers.split(',') {
                validate_and_set_server_address(token, configuration, source)?;
            }
            return Ok(());
        }
        if let Some((tree, source)) = &self.json_database_configuration {
            parse_database_configuration(configuration, tree, source)?;
        }
        Ok(())
    }

    /// Populate an empty [`NamespaceConfigurations`].
    ///
    /// Aborts if `configurations` is already populated (one-shot contract).
    pub fn read_namespace_configurations(
        &self,
        configurations: &mut NamespaceConfigurations,
    ) -> Result<(), ConfigurationError> {
        if !configurations.is_empty() {
            sdl_abort!("namespace configurations can be read only into an empty container");
        }
        for (prefix, (tree, source)) in &self.json_namespace_configurations {
            let result = parse_ns_configuration(configurations, prefix, tree, source);
            if let Err(ref error) = result {
                log::error!("[Config] {error}");
                return result;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Field extraction and validation
// ============================================================================

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn invalid_value(source: &str, field: &'static str, value: &Value) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        source_name: source.to_string(),
        field,
        value: value_text(value),
    }
}

fn get_field<'a>(
    tree: &'a Value,
    field: &'static str,
    source: &str,
) -> Result<&'a Value, ConfigurationError> {
    tree.get(field).ok_or_else(|| ConfigurationError::MissingField {
        source_name: source.to_string(),
        field,
    })
}

fn get_string(tree: &Value, field: &'static str, source: &str) -> Result<String, ConfigurationError> {
    let value = get_field(tree, field, source)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid_value(source, field, value))
}

fn get_bool(tree: &Value, field: &'static str, source: &str) -> Result<bool, ConfigurationError> {
    let value = get_field(tree, field, source)?;
    value
        .as_bool()
        .ok_or_else(|| invalid_value(source, field, value))
}

fn validate_and_set_db_type(
    db_type: &str,
    configuration: &mut DatabaseConfiguration,
    source: &str,
) -> Result<(), ConfigurationError> {
    configuration
        .check_and_apply_db_type(db_type)
        .map_err(|e| ConfigurationError::UnknownDbType {
            source_name: source.to_string(),
            db_type: e.0,
        })
}

fn validate_and_set_server_address(
    address: &str,
    configuration: &mut DatabaseConfiguration,
    source: &str,
) -> Result<(), ConfigurationError> {
    configuration
        .check_and_apply_server_address(address)
        .map_err(|e| ConfigurationError::InvalidServerAddress {
            source_name: source.to_string(),
            address: address.to_string(),
            reason: e.to_string(),
        })
}

fn parse_database_configuration(
    configuration: &mut DatabaseConfiguration,
    tree: &Value,
    source: &str,
) -> Result<(), ConfigurationError> {
    let db_type = get_string(tree, "type", source)?;
    validate_and_set_db_type(&db_type, configuration, source)?;

    let servers = get_field(tree, "servers", source)?;
    let servers = servers
        .as_array()
        .ok_or_else(|| invalid_value(source, "servers", servers))?;
    for server in servers {
        let address = get_string(server, "address", source)?;
        validate_and_set_server_address(&address, configuration, source)?;
    }
    Ok(())
}

fn parse_ns_configuration(
    configurations: &mut NamespaceConfigurations,
    prefix: &str,
    tree: &Value,
    source: &str,
) -> Result<(), ConfigurationError> {
    let use_db_backend = get_bool(tree, "useDbBackend", source)?;
    let enable_notifications = get_bool(tree, "enableNotifications", source)?;

    if !is_valid_namespace_syntax(prefix) {
        return Err(ConfigurationError::InvalidNamespacePrefix {
            source_name: source.to_string(),
            prefix: prefix.to_string(),
        });
    }
    if enable_notifications && !use_db_backend {
        return Err(ConfigurationError::ContradictoryNotifications {
            source_name: source.to_string(),
        });
    }

    configurations.add_namespace_configuration(NamespaceConfiguration {
        namespace_prefix: prefix.to_string(),
        use_db_backend,
        enable_notifications,
        source_name: source.to_string(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbType;
    use crate::hostport::HostAndPort;
    use std::path::Path;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn reader_for(
        dir: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> ConfigurationReader {
        ConfigurationReader::from_directories(&[dir.to_path_buf()], env).unwrap()
    }

    fn read_database(reader: &ConfigurationReader) -> DatabaseConfiguration {
        let mut cfg = DatabaseConfiguration::new();
        reader.read_database_configuration(&mut cfg).unwrap();
        cfg
    }

    fn read_namespaces(reader: &ConfigurationReader) -> NamespaceConfigurations {
        let mut cfg = NamespaceConfigurations::new();
        reader.read_namespace_configurations(&mut cfg).unwrap();
        cfg
    }

    #[test]
    fn test_database_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "db.json",
            r#"{"database": {"type": "redis-cluster",
                            "servers": [{"address": "10.20.30.40:50000"},
                                        {"address": "10.20.30.50:50001"}]}}"#,
        );
        let cfg = read_database(&reader_for(dir.path(), &no_env));
        assert_eq!(cfg.db_type(), DbType::Cluster);
        assert_eq!(
            cfg.server_addresses(),
            &[
                HostAndPort::new("10.20.30.40", 50000),
                HostAndPort::new("10.20.30.50", 50001),
            ]
        );
    }

    #[test]
    fn test_env_var_overrides_json_database() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "db.json",
            r#"{"database": {"type": "redis-cluster",
                            "servers": [{"address": "ignored.local"}]}}"#,
        );
        let env = |name: &str| {
            (name == DB_SERVERS_ENV_VAR_NAME)
                .then(|| "server1.local:54321,s2.local,[1544::f412]:51743".to_string())
        };
        let cfg = read_database(&reader_for(dir.path(), &env));
        assert_eq!(cfg.db_type(), DbType::Standalone);
        assert_eq!(
            cfg.server_addresses(),
            &[
                HostAndPort::new("server1.local", 54321),
                HostAndPort::new("s2.local", 6379),
                HostAndPort::new("1544::f412", 51743),
            ]
        );
    }

    #[test]
    fn test_host_and_port_env_variant() {
        let dir = tempfile::tempdir().unwrap();
        let env = |name: &str| match name {
            DB_HOST_ENV_VAR_NAME => Some("db.local".to_string()),
            DB_PORT_ENV_VAR_NAME => Some("1234".to_string()),
            _ => None,
        };
        let cfg = read_database(&reader_for(dir.path(), &env));
        assert_eq!(cfg.db_type(), DbType::Standalone);
        assert_eq!(cfg.server_addresses(), &[HostAndPort::new("db.local", 1234)]);
    }

    #[test]
    fn test_host_env_variant_without_port_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let env = |name: &str| (name == DB_HOST_ENV_VAR_NAME).then(|| "db.local".to_string());
        let cfg = read_database(&reader_for(dir.path(), &env));
        assert_eq!(cfg.server_addresses(), &[HostAndPort::new("db.local", 6379)]);
    }

    #[test]
    fn test_last_file_defining_database_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"{"database": {"type": "redis-standalone", "servers": [{"address": "first"}]}}"#,
        );
        write(
            dir.path(),
            "b.json",
            r#"{"database": {"type": "redis-cluster", "servers": [{"address": "second"}]}}"#,
        );
        let cfg = read_database(&reader_for(dir.path(), &no_env));
        assert_eq!(cfg.db_type(), DbType::Cluster);
        assert_eq!(cfg.server_addresses(), &[HostAndPort::new("second", 6379)]);
    }

    #[test]
    fn test_namespace_entries_accumulate_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"{"sharedDataLayer": [
                 {"namespacePrefix": "A", "useDbBackend": true, "enableNotifications": false},
                 {"namespacePrefix": "B", "useDbBackend": false, "enableNotifications": false}]}"#,
        );
        write(
            dir.path(),
            "b.json",
            r#"{"sharedDataLayer": [
                 {"namespacePrefix": "A", "useDbBackend": false, "enableNotifications": false}]}"#,
        );
        let cfg = read_namespaces(&reader_for(dir.path(), &no_env));
        // Later file overwrote prefix A; prefix B survives.
        assert!(!cfg.is_db_backend_use_enabled("A/key"));
        assert!(cfg.lookup("B/key").is_some());
        assert!(!cfg.is_db_backend_use_enabled("B/key"));
    }

    #[test]
    fn test_missing_database_type() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "db.json", r#"{"database": {"servers": []}}"#);
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = DatabaseConfiguration::new();
        let error = reader.read_database_configuration(&mut cfg).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("missing \"type\""), "{message}");
        assert!(message.contains("db.json"), "{message}");
    }

    #[test]
    fn test_missing_database_servers() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "db.json",
            r#"{"database": {"type": "redis-standalone"}}"#,
        );
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = DatabaseConfiguration::new();
        let error = reader.read_database_configuration(&mut cfg).unwrap_err();
        assert!(error.to_string().contains("missing \"servers\""));
    }

    #[test]
    fn test_missing_server_address() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "db.json",
            r#"{"database": {"type": "redis-standalone", "servers": [{}]}}"#,
        );
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = DatabaseConfiguration::new();
        let error = reader.read_database_configuration(&mut cfg).unwrap_err();
        assert!(error.to_string().contains("missing \"address\""));
    }

    #[test]
    fn test_invalid_server_address_reports_value_and_reason() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "db.json",
            r#"{"database": {"type": "redis-standalone", "servers": [{"address": "host:notAnInt"}]}}"#,
        );
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = DatabaseConfiguration::new();
        let message = reader
            .read_database_configuration(&mut cfg)
            .unwrap_err()
            .to_string();
        assert!(message.contains("invalid \"address\": \"host:notAnInt\""), "{message}");
        assert!(message.contains("invalid port"), "{message}");
    }

    #[test]
    fn test_unknown_database_type() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "db.json",
            r#"{"database": {"type": "in-memory", "servers": []}}"#,
        );
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = DatabaseConfiguration::new();
        let message = reader
            .read_database_configuration(&mut cfg)
            .unwrap_err()
            .to_string();
        assert!(message.contains("invalid database type: 'in-memory'"), "{message}");
    }

    #[test]
    fn test_wrong_typed_boolean_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "ns.json",
            r#"{"sharedDataLayer": [
                 {"namespacePrefix": "A", "useDbBackend": "yes", "enableNotifications": false}]}"#,
        );
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = NamespaceConfigurations::new();
        let message = reader
            .read_namespace_configurations(&mut cfg)
            .unwrap_err()
            .to_string();
        assert!(message.contains("invalid \"useDbBackend\": \"yes\""), "{message}");
    }

    #[test]
    fn test_namespace_prefix_with_framing_characters_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "ns.json",
            r#"{"sharedDataLayer": [
                 {"namespacePrefix": "a,b{c}", "useDbBackend": true, "enableNotifications": false}]}"#,
        );
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = NamespaceConfigurations::new();
        let message = reader
            .read_namespace_configurations(&mut cfg)
            .unwrap_err()
            .to_string();
        assert!(message.contains("\"namespacePrefix\": \"a,b{c}\""), "{message}");
        assert!(message.contains("disallowed characters: ,{}"), "{message}");
    }

    #[test]
    fn test_notifications_without_backend_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "ns.json",
            r#"{"sharedDataLayer": [
                 {"namespacePrefix": "A", "useDbBackend": false, "enableNotifications": true}]}"#,
        );
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = NamespaceConfigurations::new();
        let message = reader
            .read_namespace_configurations(&mut cfg)
            .unwrap_err()
            .to_string();
        assert!(
            message.contains("\"enableNotifications\" cannot be true, when \"useDbBackend\" is false"),
            "{message}"
        );
    }

    #[test]
    fn test_parse_error_names_source_and_line() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.json", "{\n  \"database\": oops\n}");
        let error =
            ConfigurationReader::from_directories(&[dir.path().to_path_buf()], &no_env).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("broken.json"), "{message}");
        assert!(message.contains("at line 2"), "{message}");
    }

    #[test]
    #[should_panic(expected = "empty container")]
    fn test_reading_database_into_populated_container_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = DatabaseConfiguration::new();
        cfg.check_and_apply_server_address("host").unwrap();
        let _ = reader.read_database_configuration(&mut cfg);
    }

    #[test]
    #[should_panic(expected = "empty container")]
    fn test_reading_namespaces_into_populated_container_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let reader = reader_for(dir.path(), &no_env);
        let mut cfg = NamespaceConfigurations::new();
        cfg.add_namespace_configuration(NamespaceConfiguration {
            namespace_prefix: "A".to_string(),
            use_db_backend: true,
            enable_notifications: false,
            source_name: "test".to_string(),
        });
        let _ = reader.read_namespace_configurations(&mut cfg);
    }

    #[test]
    fn test_input_document_clears_previous_namespace_entries() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "ns.json",
            r#"{"sharedDataLayer": [
                 {"namespacePrefix": "old", "useDbBackend": true, "enableNotifications": false}]}"#,
        );
        let mut reader = reader_for(dir.path(), &no_env);
        reader
            .read_configuration_from_str(
                r#"{"sharedDataLayer": [
                     {"namespacePrefix": "new", "useDbBackend": true, "enableNotifications": false}]}"#,
            )
            .unwrap();
        let cfg = read_namespaces(&reader);
        assert!(cfg.lookup("old/key").is_none());
        assert!(cfg.lookup("new/key").is_some());
    }

    #[test]
    fn test_input_document_database_still_loses_to_env() {
        let dir = tempfile::tempdir().unwrap();
        let env = |name: &str| {
            (name == DB_SERVERS_ENV_VAR_NAME).then(|| "envhost:1111".to_string())
        };
        let mut reader = reader_for(dir.path(), &env);
        reader
            .read_configuration_from_str(
                r#"{"database": {"type": "redis-cluster", "servers": [{"address": "json"}]}}"#,
            )
            .unwrap();
        let cfg = read_database(&reader);
        assert_eq!(cfg.db_type(), DbType::Standalone);
        assert_eq!(cfg.server_addresses(), &[HostAndPort::new("envhost", 1111)]);
    }

    #[test]
    fn test_no_sources_leaves_containers_empty() {
        let dir = tempfile::tempdir().unwrap();
        let reader = reader_for(dir.path(), &no_env);
        let db = read_database(&reader);
        assert!(db.is_empty());
        assert_eq!(db.db_type(), DbType::Unknown);
        let ns = read_namespaces(&reader);
        assert!(ns.is_empty());
    }

    #[test]
    fn test_empty_env_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let env = |name: &str| {
            (name == DB_SERVERS_ENV_VAR_NAME).then(|| "host1,,host2".to_string())
        };
        let reader = reader_for(dir.path(), &env);
        let mut cfg = DatabaseConfiguration::new();
        let message = reader
            .read_database_configuration(&mut cfg)
            .unwrap_err()
            .to_string();
        assert!(message.contains(DB_SERVERS_ENV_VAR_NAME), "{message}");
        assert!(message.contains("empty host"), "{message}");
    }
}
