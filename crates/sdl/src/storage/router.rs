// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Namespace-routing storage facade.
//!
//! The single entry point applications bind to. Each call is routed by
//! longest-prefix namespace policy: namespaces with `useDbBackend` go to
//! the real backend handler, everything else to the no-op sink. The
//! backend handler (and with it discovery and the dispatcher) is created
//! lazily on the first routed call; both handlers then live as long as the
//! router.

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use super::{
    AsyncDummyStorage, AsyncStorage, Data, DataMap, FindKeysAck, GetAck, Keys, ModifyAck,
    ModifyIfAck, Namespace, ReadyAck,
};
use crate::config::{
    ConfigurationError, ConfigurationReader, DatabaseConfiguration, NamespaceConfigurations,
};
use crate::engine::{Engine, PollEngine};
use crate::redis::discovery::{self, AsyncDatabaseDiscovery};
use crate::redis::dispatcher::AsyncCommandDispatcherCreator;
use crate::redis::AsyncRedisStorage;

/// Factory producing the discovery a backend handler subscribes to.
/// Replaceable seam for tests.
pub type AsyncDatabaseDiscoveryCreator = Rc<
    dyn Fn(
        Rc<dyn Engine>,
        Option<Namespace>,
        &DatabaseConfiguration,
        AsyncCommandDispatcherCreator,
    ) -> Rc<dyn AsyncDatabaseDiscovery>,
>;

/// Discovery factory used by the standard entry points.
pub fn default_discovery_creator() -> AsyncDatabaseDiscoveryCreator {
    Rc::new(|engine, ns, configuration, dispatcher_creator| {
        discovery::create(engine, ns, configuration, dispatcher_creator)
    })
}

pub struct AsyncStorageRouter {
    engine: Rc<dyn Engine>,
    database_configuration: DatabaseConfiguration,
    namespace_configurations: NamespaceConfigurations,
    discovery_creator: AsyncDatabaseDiscoveryCreator,
    dispatcher_creator: AsyncCommandDispatcherCreator,
    redis_handler: RefCell<Option<Rc<AsyncRedisStorage>>>,
    dummy_handler: Rc<AsyncDummyStorage>,
}

impl AsyncStorageRouter {
    /// Standard entry point: own engine, configuration from the default
    /// directories and the environment. The command dispatcher stays an
    /// injected collaborator.
    pub fn create(
        dispatcher_creator: AsyncCommandDispatcherCreator,
    ) -> Result<Self, ConfigurationError> {
        let engine: Rc<dyn Engine> = Rc::new(PollEngine::new()?);
        let reader = ConfigurationReader::new()?;
        let mut database_configuration = DatabaseConfiguration::new();
        reader.read_database_configuration(&mut database_configuration)?;
        let mut namespace_configurations = NamespaceConfigurations::new();
        reader.read_namespace_configurations(&mut namespace_configurations)?;
        Ok(Self::with_configuration(
            engine,
            database_configuration,
            namespace_configurations,
            default_discovery_creator(),
            dispatcher_creator,
        ))
    }

    /// Construct with explicit configuration and factory seams. For tests
    /// and embedders that manage configuration themselves.
    pub fn with_configuration(
        engine: Rc<dyn Engine>,
        database_configuration: DatabaseConfiguration,
        namespace_configurations: NamespaceConfigurations,
        discovery_creator: AsyncDatabaseDiscoveryCreator,
        dispatcher_creator: AsyncCommandDispatcherCreator,
    ) -> Self {
        let dummy_handler = Rc::new(AsyncDummyStorage::new(Rc::clone(&engine)));
        Self {
            engine,
            database_configuration,
            namespace_configurations,
            discovery_creator,
            dispatcher_creator,
            redis_handler: RefCell::new(None),
            dummy_handler,
        }
    }

    fn redis_handler(&self) -> Rc<AsyncRedisStorage> {
        let mut slot = self.redis_handler.borrow_mut();
        if let Some(handler) = slot.as_ref() {
            return Rc::clone(handler);
        }
        let discovery = (self.discovery_creator)(
            Rc::clone(&self.engine),
            None,
            &self.database_configuration,
            Rc::clone(&self.dispatcher_creator),
        );
        let handler = Rc::new(AsyncRedisStorage::new(
            Rc::clone(&self.engine),
            discovery,
            Rc::clone(&self.dispatcher_creator),
        ));
        *slot = Some(Rc::clone(&handler));
        handler
    }

    fn operation_handler(&self, ns: &str) -> Rc<dyn AsyncStorage> {
        if self.namespace_configurations.is_db_backend_use_enabled(ns) {
            self.redis_handler()
        } else {
            Rc::clone(&self.dummy_handler) as Rc<dyn AsyncStorage>
        }
    }
}

impl AsyncStorage for AsyncStorageRouter {
    fn fd(&self) -> RawFd {
        self.engine.fd()
    }

    fn handle_events(&self) {
        self.engine.handle_events();
    }

    fn wait_ready_async(&self, ns: &str, ack: ReadyAck) {
        self.operation_handler(ns).wait_ready_async(ns, ack);
    }

    fn set_async(&self, ns: &str, data_map: DataMap, ack: ModifyAck) {
        self.operation_handler(ns).set_async(ns, data_map, ack);
    }

    fn set_if_async(&self, ns: &str, key: &str, old_data: Data, new_data: Data, ack: ModifyIfAck) {
        self.operation_handler(ns)
            .set_if_async(ns, key, old_data, new_data, ack);
    }

    fn set_if_not_exists_async(&self, ns: &str, key: &str, data: Data, ack: ModifyIfAck) {
        self.operation_handler(ns)
            .set_if_not_exists_async(ns, key, data, ack);
    }

    fn get_async(&self, ns: &str, keys: Keys, ack: GetAck) {
        self.operation_handler(ns).get_async(ns, keys, ack);
    }

    fn remove_async(&self, ns: &str, keys: Keys, ack: ModifyAck) {
        self.operation_handler(ns).remove_async(ns, keys, ack);
    }

    fn remove_if_async(&self, ns: &str, key: &str, data: Data, ack: ModifyIfAck) {
        self.operation_handler(ns).remove_if_async(ns, key, data, ack);
    }

    fn find_keys_async(&self, ns: &str, key_prefix: &str, ack: FindKeysAck) {
        self.operation_handler(ns).find_keys_async(ns, key_prefix, ack);
    }

    fn remove_all_async(&self, ns: &str, ack: ModifyAck) {
        self.operation_handler(ns).remove_all_async(ns, ack);
    }
}
