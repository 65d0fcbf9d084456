// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration model and reader.
//!
//! Configuration arrives from three sources, highest precedence first:
//!
//! 1. Environment: `DATABASE_DAEMON_CONF` (comma-separated `host[:port]`
//!    list), or `DATABASE_DAEMON_HOST` [+ `DATABASE_DAEMON_PORT`]. Presence
//!    pins the database type to standalone and overrides any JSON
//!    `database` block.
//! 2. JSON files from an ordered directory list: all non-hidden `*.json`
//!    files, lexicographic order. The last file defining `database` wins;
//!    `sharedDataLayer` entries accumulate per prefix, later files
//!    overwriting earlier same-prefix entries.
//! 3. A single JSON document supplied directly (test surface).
//!
//! The populated containers ([`DatabaseConfiguration`],
//! [`NamespaceConfigurations`]) are one-shot: they are filled once by the
//! reader and read-only afterwards. Populating a non-empty container is a
//! programming error and aborts.

mod database;
mod namespaces;
mod paths;
mod reader;

pub use database::{DatabaseConfiguration, DbType, InvalidDbType};
pub use namespaces::{NamespaceConfiguration, NamespaceConfigurations};
pub use paths::{default_conf_directories, find_configuration_files};
pub use reader::{
    ConfigurationReader, DB_HOST_ENV_VAR_NAME, DB_PORT_ENV_VAR_NAME, DB_SERVERS_ENV_VAR_NAME,
};

use thiserror::Error;

/// Errors raised while gathering or validating configuration.
///
/// Every variant names its source (file path, environment variable name or
/// `<input>`) so a failing deployment can be traced to the offending file.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("I/O error reading SDL configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("error in SDL configuration {source_name} at line {line}: {message}")]
    ParseFailure {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Configuration error in {source_name}: missing \"{field}\"")]
    MissingField {
        source_name: String,
        field: &'static str,
    },

    #[error("Configuration error in {source_name}: invalid \"{field}\": \"{value}\"")]
    InvalidValue {
        source_name: String,
        field: &'static str,
        value: String,
    },

    #[error("Configuration error in {source_name}: invalid \"address\": \"{address}\" {reason}")]
    InvalidServerAddress {
        source_name: String,
        address: String,
        reason: String,
    },

    #[error("Configuration error in {source_name}: invalid database type: '{db_type}'")]
    UnknownDbType {
        source_name: String,
        db_type: String,
    },

    // The character set mirrors namespace::DISALLOWED_NAMESPACE_CHARACTERS.
    #[error(
        "Configuration error in {source_name}: \"namespacePrefix\": \"{prefix}\" contains some of these disallowed characters: ,{{}}"
    )]
    InvalidNamespacePrefix {
        source_name: String,
        prefix: String,
    },

    #[error(
        "Configuration error in {source_name}: \"enableNotifications\" cannot be true, when \"useDbBackend\" is false"
    )]
    ContradictoryNotifications { source_name: String },
}
