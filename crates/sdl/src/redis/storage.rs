// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Backend storage handler.
//!
//! Turns the key/value operations into backend commands and gates them on
//! discovery: until the first endpoint snapshot arrives, every operation
//! completes with a not-yet-discovered error, and `wait_ready` callers are
//! queued until the dispatcher towards the discovered endpoints reports
//! connected. Each new snapshot recycles the dispatcher.
//!
//! Namespaces are validated on every call; an invalid one completes the
//! operation without any backend traffic.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::engine::Engine;
use crate::error::{AsyncError, DispatcherErrorCode, StorageErrorCode};
use crate::namespace::is_valid_namespace;
use crate::redis::contents::ContentsBuilder;
use crate::redis::discovery::{AsyncDatabaseDiscovery, DatabaseInfo};
use crate::redis::dispatcher::{AsyncCommandDispatcher, AsyncCommandDispatcherCreator};
use crate::redis::reply::Reply;
use crate::storage::{
    AsyncStorage, Data, DataMap, FindKeysAck, GetAck, Keys, ModifyAck, ModifyIfAck, ReadyAck,
    SEPARATOR,
};

pub struct AsyncRedisStorage {
    inner: Rc<Inner>,
    discovery: Rc<dyn AsyncDatabaseDiscovery>,
}

struct Inner {
    engine: Rc<dyn Engine>,
    contents_builder: ContentsBuilder,
    dispatcher_creator: AsyncCommandDispatcherCreator,
    dispatcher: RefCell<Option<Rc<dyn AsyncCommandDispatcher>>>,
    ready: Cell<bool>,
    ready_waiters: RefCell<Vec<ReadyAck>>,
}

impl AsyncRedisStorage {
    pub fn new(
        engine: Rc<dyn Engine>,
        discovery: Rc<dyn AsyncDatabaseDiscovery>,
        dispatcher_creator: AsyncCommandDispatcherCreator,
    ) -> Self {
        let inner = Rc::new(Inner {
            engine,
            contents_builder: ContentsBuilder::new(SEPARATOR),
            dispatcher_creator,
            dispatcher: RefCell::new(None),
            ready: Cell::new(false),
            ready_waiters: RefCell::new(Vec::new()),
        });
        let weak = Rc::downgrade(&inner);
        discovery.set_state_changed_cb(Box::new(move |info| {
            if let Some(inner) = weak.upgrade() {
                Inner::service_state_changed(&inner, info);
            }
        }));
        Self { inner, discovery }
    }
}

impl Drop for AsyncRedisStorage {
    fn drop(&mut self) {
        // In-flight discovery events must not reach a dying handler.
        self.discovery.clear_state_changed_cb();
    }
}

impl Inner {
    fn service_state_changed(inner: &Rc<Inner>, info: DatabaseInfo) {
        log::info!(
            "[RedisStorage] endpoint set changed: {:?} ({:?} via {:?})",
            info.hosts,
            info.topology,
            info.discovery
        );
        let dispatcher = (inner.dispatcher_creator)(
            Rc::clone(&inner.engine),
            info,
            Rc::new(inner.contents_builder.clone()),
        );
        *inner.dispatcher.borrow_mut() = Some(Rc::clone(&dispatcher));

        let weak = Rc::downgrade(inner);
        dispatcher.wait_connected_async(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.ready.set(true);
                let waiters: Vec<ReadyAck> = inner.ready_waiters.borrow_mut().drain(..).collect();
                for ack in waiters {
                    ack(Ok(()));
                }
            }
        }));
    }

    fn dispatcher(&self) -> Option<Rc<dyn AsyncCommandDispatcher>> {
        self.dispatcher.borrow().clone()
    }

    /// Post `callback` so it runs from `handle_events`, like every other
    /// completion.
    fn post(&self, callback: impl FnOnce() + 'static) {
        self.engine.post_callback(Box::new(callback));
    }

    fn namespace_error(&self, ns: &str) -> Option<AsyncError> {
        if is_valid_namespace(ns) {
            None
        } else {
            log::warn!("[RedisStorage] invalid namespace: \"{ns}\"");
            Some(StorageErrorCode::InvalidNamespace.into())
        }
    }

    /// Validation and readiness gate shared by all data operations.
    fn operation_gate(
        &self,
        ns: &str,
    ) -> Result<Rc<dyn AsyncCommandDispatcher>, AsyncError> {
        if let Some(error) = self.namespace_error(ns) {
            return Err(error);
        }
        self.dispatcher()
            .ok_or_else(|| StorageErrorCode::NotYetDiscovered.into())
    }
}

fn protocol_error<T>(reply: &Reply) -> Result<T, AsyncError> {
    log::warn!(
        "[RedisStorage] unexpected reply type from backend: {}",
        reply.type_name()
    );
    Err(AsyncError::Dispatcher(DispatcherErrorCode::ProtocolError))
}

impl AsyncStorage for AsyncRedisStorage {
    fn fd(&self) -> std::os::unix::io::RawFd {
        self.inner.engine.fd()
    }

    fn handle_events(&self) {
        self.inner.engine.handle_events();
    }

    fn wait_ready_async(&self, ns: &str, ack: ReadyAck) {
        if let Some(error) = self.inner.namespace_error(ns) {
            self.inner.post(move || ack(Err(error)));
            return;
        }
        if self.inner.ready.get() {
            self.inner.post(move || ack(Ok(())));
        } else {
            self.inner.ready_waiters.borrow_mut().push(ack);
        }
    }

    fn set_async(&self, ns: &str, data_map: DataMap, ack: ModifyAck) {
        let dispatcher = match self.inner.operation_gate(ns) {
            Ok(dispatcher) => dispatcher,
            Err(error) => return self.inner.post(move || ack(Err(error))),
        };
        if data_map.is_empty() {
            return self.inner.post(move || ack(Ok(())));
        }
        let mut assembler = self.inner.contents_builder.command("MSET");
        for (key, data) in data_map {
            assembler = assembler.key(ns, &key).data(data);
        }
        dispatcher.dispatch_async(
            Box::new(move |result| {
                ack(result.map_err(AsyncError::from).and_then(|reply| match reply {
                    Reply::Status(_) => Ok(()),
                    other => protocol_error(&other),
                }));
            }),
            ns,
            assembler.finish(),
        );
    }

    fn set_if_async(&self, ns: &str, key: &str, old_data: Data, new_data: Data, ack: ModifyIfAck) {
        let dispatcher = match self.inner.operation_gate(ns) {
            Ok(dispatcher) => dispatcher,
            Err(error) => return self.inner.post(move || ack(Err(error))),
        };
        let contents = self
            .inner
            .contents_builder
            .command("SETIE")
            .key(ns, key)
            .data(new_data)
            .data(old_data)
            .finish();
        dispatcher.dispatch_async(
            Box::new(move |result| {
                ack(result.map_err(AsyncError::from).and_then(|reply| match reply {
                    Reply::Status(_) => Ok(true),
                    Reply::Nil => Ok(false),
                    other => protocol_error(&other),
                }));
            }),
            ns,
            contents,
        );
    }

    fn set_if_not_exists_async(&self, ns: &str, key: &str, data: Data, ack: ModifyIfAck) {
        let dispatcher = match self.inner.operation_gate(ns) {
            Ok(dispatcher) => dispatcher,
            Err(error) => return self.inner.post(move || ack(Err(error))),
        };
        let contents = self
            .inner
            .contents_builder
            .command("SETNX")
            .key(ns, key)
            .data(data)
            .finish();
        dispatcher.dispatch_async(
            Box::new(move |result| {
                ack(result.map_err(AsyncError::from).and_then(|reply| match reply {
                    Reply::Integer(created) => Ok(created == 1),
                    other => protocol_error(&other),
                }));
            }),
            ns,
            contents,
        );
    }

    fn get_async(&self, ns: &str, keys: Keys, ack: GetAck) {
        let dispatcher = match self.inner.operation_gate(ns) {
            Ok(dispatcher) => dispatcher,
            Err(error) => return self.inner.post(move || ack(Err(error))),
        };
        if keys.is_empty() {
            return self.inner.post(move || ack(Ok(DataMap::new())));
        }
        let requested: Vec<String> = keys.into_iter().collect();
        let mut assembler = self.inner.contents_builder.command("MGET");
        for key in &requested {
            assembler = assembler.key(ns, key);
        }
        dispatcher.dispatch_async(
            Box::new(move |result| {
                ack(result.map_err(AsyncError::from).and_then(|reply| {
                    let Some(elements) = reply.as_array() else {
                        return protocol_error(&reply);
                    };
                    if elements.len() != requested.len() {
                        return protocol_error(&reply);
                    }
                    let mut found = DataMap::new();
                    for (key, element) in requested.iter().zip(elements) {
                        match element {
                            Reply::Data(data) => {
                                found.insert(key.clone(), data.clone());
                            }
                            Reply::Nil => {}
                            other => return protocol_error(other),
                        }
                    }
                    Ok(found)
                }));
            }),
            ns,
            assembler.finish(),
        );
    }

    fn remove_async(&self, ns: &str, keys: Keys, ack: ModifyAck) {
        let dispatcher = match self.inner.operation_gate(ns) {
            Ok(dispatcher) => dispatcher,
            Err(error) => return self.inner.post(move || ack(Err(error))),
        };
        if keys.is_empty() {
            return self.inner.post(move || ack(Ok(())));
        }
        let mut assembler = self.inner.contents_builder.command("DEL");
        for key in &keys {
            assembler = assembler.key(ns, key);
        }
        dispatcher.dispatch_async(
            Box::new(move |result| {
                ack(result.map_err(AsyncError::from).and_then(|reply| match reply {
                    Reply::Integer(_) => Ok(()),
                    other => protocol_error(&other),
                }));
            }),
            ns,
            assembler.finish(),
        );
    }

    fn remove_if_async(&self, ns: &str, key: &str, data: Data, ack: ModifyIfAck) {
        let dispatcher = match self.inner.operation_gate(ns) {
            Ok(dispatcher) => dispatcher,
            Err(error) => return self.inner.post(move || ack(Err(error))),
        };
        let contents = self
            .inner
            .contents_builder
            .command("DELIE")
            .key(ns, key)
            .data(data)
            .finish();
        dispatcher.dispatch_async(
            Box::new(move |result| {
                ack(result.map_err(AsyncError::from).and_then(|reply| match reply {
                    Reply::Integer(removed) => Ok(removed == 1),
                    other => protocol_error(&other),
                }));
            }),
            ns,
            contents,
        );
    }

    fn find_keys_async(&self, ns: &str, key_prefix: &str, ack: FindKeysAck) {
        let dispatcher = match self.inner.operation_gate(ns) {
            Ok(dispatcher) => dispatcher,
            Err(error) => return self.inner.post(move || ack(Err(error))),
        };
        let frame_prefix = self.inner.contents_builder.key_prefix(ns);
        let pattern = format!("{frame_prefix}{key_prefix}*");
        let contents = self
            .inner
            .contents_builder
            .command("KEYS")
            .arg(&pattern)
            .finish();
        dispatcher.dispatch_async(
            Box::new(move |result| {
                ack(result.map_err(AsyncError::from).and_then(|reply| {
                    let Some(elements) = reply.as_array() else {
                        return protocol_error(&reply);
                    };
                    let mut found = Keys::new();
                    for element in elements {
                        let Some(framed) = element.as_data() else {
                            return protocol_error(element);
                        };
                        let framed = String::from_utf8_lossy(framed);
                        if let Some(key) = framed.strip_prefix(&frame_prefix) {
                            found.insert(key.to_string());
                        }
                    }
                    Ok(found)
                }));
            }),
            ns,
            contents,
        );
    }

    fn remove_all_async(&self, ns: &str, ack: ModifyAck) {
        let dispatcher = match self.inner.operation_gate(ns) {
            Ok(dispatcher) => dispatcher,
            Err(error) => return self.inner.post(move || ack(Err(error))),
        };
        let pattern = format!("{}*", self.inner.contents_builder.key_prefix(ns));
        let contents = self
            .inner
            .contents_builder
            .command("KEYS")
            .arg(&pattern)
            .finish();
        let builder = self.inner.contents_builder.clone();
        let delete_dispatcher = Rc::clone(&dispatcher);
        let ns_owned = ns.to_string();
        dispatcher.dispatch_async(
            Box::new(move |result| {
                let elements = match result {
                    Ok(Reply::Array(elements)) => elements,
                    Ok(other) => return ack(protocol_error(&other)),
                    Err(code) => return ack(Err(code.into())),
                };
                if elements.is_empty() {
                    return ack(Ok(()));
                }
                let mut assembler = builder.command("DEL");
                for element in &elements {
                    let Some(framed) = element.as_data() else {
                        return ack(protocol_error(element));
                    };
                    assembler = assembler.raw_key(framed.to_vec());
                }
                delete_dispatcher.dispatch_async(
                    Box::new(move |result| {
                        ack(result.map_err(AsyncError::from).and_then(
                            |reply| match reply {
                                Reply::Integer(_) => Ok(()),
                                other => protocol_error(&other),
                            },
                        ));
                    }),
                    &ns_owned,
                    assembler.finish(),
                );
            }),
            ns,
            contents,
        );
    }
}
