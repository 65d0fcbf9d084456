// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! No-op storage handler.
//!
//! Namespaces configured without a database backend are served by this
//! sink: every operation completes successfully on the next reactor tick,
//! reads come back empty, conditional modifications report success. Data
//! is never stored anywhere.

use std::os::unix::io::RawFd;
use std::rc::Rc;

use super::{
    AsyncStorage, Data, DataMap, FindKeysAck, GetAck, Keys, ModifyAck, ModifyIfAck, ReadyAck,
};
use crate::engine::Engine;

pub struct AsyncDummyStorage {
    engine: Rc<dyn Engine>,
}

impl AsyncDummyStorage {
    pub fn new(engine: Rc<dyn Engine>) -> Self {
        Self { engine }
    }

    fn post(&self, callback: impl FnOnce() + 'static) {
        self.engine.post_callback(Box::new(callback));
    }
}

impl AsyncStorage for AsyncDummyStorage {
    fn fd(&self) -> RawFd {
        self.engine.fd()
    }

    fn handle_events(&self) {
        self.engine.handle_events();
    }

    fn wait_ready_async(&self, _ns: &str, ack: ReadyAck) {
        self.post(move || ack(Ok(())));
    }

    fn set_async(&self, _ns: &str, _data_map: DataMap, ack: ModifyAck) {
        self.post(move || ack(Ok(())));
    }

    fn set_if_async(&self, _ns: &str, _key: &str, _old_data: Data, _new_data: Data, ack: ModifyIfAck) {
        self.post(move || ack(Ok(true)));
    }

    fn set_if_not_exists_async(&self, _ns: &str, _key: &str, _data: Data, ack: ModifyIfAck) {
        self.post(move || ack(Ok(true)));
    }

    fn get_async(&self, _ns: &str, _keys: Keys, ack: GetAck) {
        self.post(move || ack(Ok(DataMap::new())));
    }

    fn remove_async(&self, _ns: &str, _keys: Keys, ack: ModifyAck) {
        self.post(move || ack(Ok(())));
    }

    fn remove_if_async(&self, _ns: &str, _key: &str, _data: Data, ack: ModifyIfAck) {
        self.post(move || ack(Ok(true)));
    }

    fn find_keys_async(&self, _ns: &str, _key_prefix: &str, ack: FindKeysAck) {
        self.post(move || ack(Ok(Keys::new())));
    }

    fn remove_all_async(&self, _ns: &str, ack: ModifyAck) {
        self.post(move || ack(Ok(())));
    }
}
