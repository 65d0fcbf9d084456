// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Database connection configuration container.

use thiserror::Error;

use crate::hostport::{HostAndPort, DEFAULT_DB_PORT, DEFAULT_SENTINEL_PORT};

/// Deployment topology of the backing database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbType {
    /// No type applied yet. Legal only before configuration is read.
    #[default]
    Unknown,
    /// Single database instance.
    Standalone,
    /// Clustered database.
    Cluster,
    /// Sentinel-managed replicated pair.
    Sentinel,
    /// Group of independent standalone instances.
    StandaloneCluster,
    /// Group of independent sentinel-managed pairs.
    SentinelCluster,
}

/// Raised for database type tags outside the recognized set.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid database type: '{0}'")]
pub struct InvalidDbType(pub String);

/// Validated database connection parameters.
///
/// Created empty and populated only through the `check_and_apply_*`
/// validators; read-only after the configuration reader is done with it.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfiguration {
    db_type: DbType,
    server_addresses: Vec<HostAndPort>,
    sentinel_address: Option<HostAndPort>,
    sentinel_master_name: Option<String>,
}

impl DatabaseConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a textual type tag from configuration.
    pub fn check_and_apply_db_type(&mut self, db_type: &str) -> Result<(), InvalidDbType> {
        self.db_type = match db_type {
            "redis-standalone" => DbType::Standalone,
            "redis-cluster" => DbType::Cluster,
            "redis-sentinel" => DbType::Sentinel,
            "sdl-standalone-cluster" => DbType::StandaloneCluster,
            "sdl-sentinel-cluster" => DbType::SentinelCluster,
            other => return Err(InvalidDbType(other.to_string())),
        };
        Ok(())
    }

    /// Parse and append a server endpoint; the database default port is
    /// substituted when the text carries none.
    pub fn check_and_apply_server_address(
        &mut self,
        address: &str,
    ) -> Result<(), crate::hostport::AddressError> {
        let parsed = HostAndPort::parse(address, DEFAULT_DB_PORT)?;
        self.server_addresses.push(parsed);
        Ok(())
    }

    /// Parse and set the sentinel endpoint; the sentinel default port is
    /// substituted when the text carries none.
    pub fn check_and_apply_sentinel_address(
        &mut self,
        address: &str,
    ) -> Result<(), crate::hostport::AddressError> {
        self.sentinel_address = Some(HostAndPort::parse(address, DEFAULT_SENTINEL_PORT)?);
        Ok(())
    }

    pub fn check_and_apply_sentinel_master_name(&mut self, name: &str) {
        self.sentinel_master_name = Some(name.to_string());
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn server_addresses(&self) -> &[HostAndPort] {
        &self.server_addresses
    }

    /// All configured endpoints, or just the indexed one for group
    /// deployments that address their members independently.
    pub fn server_addresses_for(&self, address_index: Option<usize>) -> Vec<HostAndPort> {
        match address_index {
            Some(index) => vec![self.server_addresses[index].clone()],
            None => self.server_addresses.clone(),
        }
    }

    /// Substitute endpoint used when no address was configured at all.
    pub fn default_server_addresses(&self) -> Vec<HostAndPort> {
        vec![HostAndPort::new("localhost", DEFAULT_DB_PORT)]
    }

    /// Configured sentinel endpoint. With an index, the host is taken from
    /// `server_addresses[index]` and only the port from the configured
    /// sentinel address.
    pub fn sentinel_address(&self, address_index: Option<usize>) -> Option<HostAndPort> {
        match address_index {
            Some(index) => {
                let port = self.sentinel_address.as_ref()?.port();
                Some(HostAndPort::new(
                    self.server_addresses[index].host(),
                    port,
                ))
            }
            None => self.sentinel_address.clone(),
        }
    }

    pub fn sentinel_master_name(&self) -> Option<&str> {
        self.sentinel_master_name.as_deref()
    }

    /// True while no server address has been applied.
    pub fn is_empty(&self) -> bool {
        self.server_addresses.is_empty()
    }
}
