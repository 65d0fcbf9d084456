// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Backend endpoint discovery.
//!
//! Three mechanisms keep the live endpoint set current, all behind one
//! subscribe/emit contract:
//!
//! | Variant | Trigger | Module |
//! |---------|---------|--------|
//! | **Static** | configured addresses, emitted once | [`AsyncStaticDatabaseDiscovery`] |
//! | **RCP** | out-of-band service discovery handle | `rcp` (feature `rcp-discovery`) |
//! | **Sentinel** | master probe with 1 s retry | [`AsyncSentinelDatabaseDiscovery`] |
//!
//! A subscriber installs a state-change callback and receives a
//! [`DatabaseInfo`] snapshot whenever the active endpoint set may have
//! changed. Callbacks fire from engine context; downstream consumers
//! typically recycle their command dispatcher on each event.

#[cfg(feature = "rcp-discovery")]
pub mod rcp;
mod sentinel;
mod static_discovery;

pub use sentinel::AsyncSentinelDatabaseDiscovery;
pub use static_discovery::AsyncStaticDatabaseDiscovery;

use std::rc::Rc;

use crate::config::{DatabaseConfiguration, DbType};
use crate::engine::Engine;
use crate::hostport::HostAndPort;
use crate::redis::dispatcher::AsyncCommandDispatcherCreator;
use crate::storage::Namespace;

/// Topology of the currently live endpoint set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// One instance serves all traffic.
    Single,
    /// Hash-partitioned cluster.
    Cluster,
    /// Replicated pair behind a failover manager.
    Redundant,
}

/// Mechanism a [`DatabaseInfo`] snapshot originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    Static,
    Rcp,
    Sentinel,
}

/// Snapshot of "which endpoints, of what topology, are currently live".
///
/// Componentwise equality is used to recognize re-notifications that carry
/// no real change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub hosts: Vec<HostAndPort>,
    pub topology: Topology,
    pub ns: Option<Namespace>,
    pub discovery: DiscoverySource,
}

/// State-change subscription callback.
pub type StateChangedCb = Box<dyn FnMut(DatabaseInfo)>;

/// Endpoint discovery contract shared by all variants.
pub trait AsyncDatabaseDiscovery {
    /// Install `cb`; it fires (from engine context) whenever the active
    /// endpoint set may have changed.
    fn set_state_changed_cb(&self, cb: StateChangedCb);

    /// Drop the installed callback; pending events are discarded.
    fn clear_state_changed_cb(&self);
}

/// Select a discovery variant from static configuration.
///
/// Sentinel-typed configurations probe the configured (or default) sentinel
/// endpoint; everything else emits the configured addresses directly, with
/// `localhost:6379` substituted when nothing was configured.
pub fn create(
    engine: Rc<dyn Engine>,
    ns: Option<Namespace>,
    configuration: &DatabaseConfiguration,
    dispatcher_creator: AsyncCommandDispatcherCreator,
) -> Rc<dyn AsyncDatabaseDiscovery> {
    match configuration.db_type() {
        DbType::Sentinel | DbType::SentinelCluster => {
            let address = configuration
                .sentinel_address(None)
                .unwrap_or_else(sentinel::default_sentinel_address);
            let master_name = configuration
                .sentinel_master_name()
                .unwrap_or(sentinel::DEFAULT_MASTER_NAME)
                .to_string();
            Rc::new(AsyncSentinelDatabaseDiscovery::new(
                engine,
                dispatcher_creator,
                address,
                master_name,
            ))
        }
        db_type => {
            let mut addresses = configuration.server_addresses().to_vec();
            if addresses.is_empty() {
                addresses = configuration.default_server_addresses();
            }
            let topology = if db_type == DbType::Cluster {
                Topology::Cluster
            } else {
                Topology::Single
            };
            Rc::new(AsyncStaticDatabaseDiscovery::new(
                engine, ns, topology, addresses,
            ))
        }
    }
}
