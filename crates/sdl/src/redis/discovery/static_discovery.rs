// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery from static configuration.
//!
//! There is nothing to discover: the configured addresses are the endpoint
//! set. One snapshot is emitted shortly after subscription (from engine
//! context, like every other variant) and never again.

use std::cell::RefCell;
use std::rc::Rc;

use super::{AsyncDatabaseDiscovery, DatabaseInfo, DiscoverySource, StateChangedCb, Topology};
use crate::engine::Engine;
use crate::hostport::HostAndPort;
use crate::storage::Namespace;

pub struct AsyncStaticDatabaseDiscovery {
    engine: Rc<dyn Engine>,
    info: DatabaseInfo,
    state_changed_cb: Rc<RefCell<Option<StateChangedCb>>>,
}

impl AsyncStaticDatabaseDiscovery {
    pub fn new(
        engine: Rc<dyn Engine>,
        ns: Option<Namespace>,
        topology: Topology,
        hosts: Vec<HostAndPort>,
    ) -> Self {
        Self {
            engine,
            info: DatabaseInfo {
                hosts,
                topology,
                ns,
                discovery: DiscoverySource::Static,
            },
            state_changed_cb: Rc::new(RefCell::new(None)),
        }
    }
}

impl AsyncDatabaseDiscovery for AsyncStaticDatabaseDiscovery {
    fn set_state_changed_cb(&self, cb: StateChangedCb) {
        *self.state_changed_cb.borrow_mut() = Some(cb);
        let slot = Rc::clone(&self.state_changed_cb);
        let info = self.info.clone();
        self.engine.post_callback(Box::new(move || {
            if let Some(cb) = slot.borrow_mut().as_mut() {
                log::debug!("[Discovery] emitting static endpoint set: {:?}", info.hosts);
                cb(info);
            }
        }));
    }

    fn clear_state_changed_cb(&self) {
        *self.state_changed_cb.borrow_mut() = None;
    }
}
