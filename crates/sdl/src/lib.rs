// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # SDL - Shared Data Layer client
//!
//! A uniform key/value interface to a partitioned, namespaced storage
//! service. Clients address data by `(namespace, key)`; per-namespace
//! policy decides whether a call reaches the real database backend or a
//! no-op sink, independently of other namespaces.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdl::{DataMap, Keys, SyncStorage};
//!
//! # fn dispatcher_creator() -> sdl::AsyncCommandDispatcherCreator { unimplemented!() }
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The command dispatcher (wire protocol, pooling) is the
//!     // application's collaborator; everything else is configured from
//!     // /etc/sdl.d, /run/sdl.d and the environment.
//!     let storage = SyncStorage::create(dispatcher_creator())?;
//!
//!     storage.set("my-app", DataMap::from([("counter".into(), b"1".to_vec())]))?;
//!     let read = storage.get("my-app", Keys::from(["counter".into()]))?;
//!     println!("stored: {:?}", read);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                       SyncStorage (blocking)                       |
//! |                 poll(fd) loop, no helper threads                   |
//! +--------------------------------------------------------------------+
//! |                 AsyncStorageRouter (per-namespace)                 |
//! |      longest-prefix policy -> backend handler | no-op sink         |
//! +--------------------------------------------------------------------+
//! |   AsyncRedisStorage          |      discovery (three variants)     |
//! |   key framing, readiness     |      static | RCP | sentinel        |
//! +--------------------------------------------------------------------+
//! |   command dispatcher (external collaborator, injected factory)     |
//! +--------------------------------------------------------------------+
//! |   Engine: fd monitoring, timers, deferred callbacks (mio based)    |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SyncStorage`] | Blocking facade; one call, one result |
//! | [`AsyncStorage`] | Non-blocking contract with completion callbacks |
//! | [`AsyncStorageRouter`] | Standard implementation routing by namespace |
//! | [`ConfigurationReader`] | Env + JSON-file configuration with precedence |
//! | [`Engine`] | Reactor contract; [`PollEngine`] is the default |
//!
//! ## Concurrency model
//!
//! Single-threaded cooperative. The library never spawns threads; every
//! callback fires from inside [`AsyncStorage::handle_events`] (or the
//! blocking facade's internal poll loop). Completions of one instance fire
//! in submission order.

/// Configuration model and reader (env precedence, JSON directories).
pub mod config;
/// Reactor contract and the default mio-based engine.
pub mod engine;
/// Error taxonomy: internal code categories and public failure kinds.
pub mod error;
/// Endpoint value type (`host`, `host:port`, `[v6]:port`).
pub mod hostport;
/// Namespace syntax rules.
pub mod namespace;
/// Backend integration: dispatcher contract, discovery, storage handler.
pub mod redis;
/// User-facing storage surfaces (async trait, router, blocking facade).
pub mod storage;

pub use config::{
    ConfigurationError, ConfigurationReader, DatabaseConfiguration, DbType,
    NamespaceConfiguration, NamespaceConfigurations,
};
pub use engine::{Engine, PollEngine, Timer};
pub use error::{AsyncError, DispatcherErrorCode, Error, StorageErrorCode};
pub use hostport::HostAndPort;
pub use redis::discovery::{
    AsyncDatabaseDiscovery, DatabaseInfo, DiscoverySource, StateChangedCb, Topology,
};
pub use redis::{
    AsyncCommandDispatcher, AsyncCommandDispatcherCreator, Contents, ContentsBuilder, Reply,
};
pub use storage::{
    AsyncStorage, AsyncStorageRouter, Data, DataMap, Key, Keys, Namespace, SyncStorage, SEPARATOR,
};

/// Fail fast on invariant violations: log, then panic. Release builds
/// abort (`panic = "abort"`), so a violated invariant never limps on.
macro_rules! sdl_abort {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        panic!($($arg)*);
    }};
}

pub(crate) use sdl_abort;
