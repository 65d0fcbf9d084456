// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sentinel-backed discovery.
//!
//! A dedicated dispatcher is held against the sentinel endpoint. Once it
//! reports connected, one `SENTINEL get-master-addr-by-name` inquiry is
//! issued; a well-formed `[host, port]` reply becomes the emitted endpoint
//! snapshot. Transport errors re-arm a one second retry timer. A reply the
//! sentinel should never produce (wrong shape, non-string element,
//! unparseable port) is an invariant violation and aborts.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::{AsyncDatabaseDiscovery, DatabaseInfo, DiscoverySource, StateChangedCb, Topology};
use crate::engine::{Engine, Timer};
use crate::error::DispatcherErrorCode;
use crate::hostport::{HostAndPort, DEFAULT_SENTINEL_PORT};
use crate::redis::contents::ContentsBuilder;
use crate::redis::dispatcher::{AsyncCommandDispatcher, AsyncCommandDispatcherCreator};
use crate::redis::reply::Reply;
use crate::sdl_abort;
use crate::storage::SEPARATOR;

/// Master name probed when configuration does not name one.
pub const DEFAULT_MASTER_NAME: &str = "mymaster";

/// Delay before a failed master inquiry is reissued.
const MASTER_INQUIRY_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Sentinel endpoint probed when configuration does not carry one.
pub fn default_sentinel_address() -> HostAndPort {
    HostAndPort::new("dbaas-ha", DEFAULT_SENTINEL_PORT)
}

pub struct AsyncSentinelDatabaseDiscovery {
    inner: Rc<Inner>,
}

struct Inner {
    dispatcher: Rc<dyn AsyncCommandDispatcher>,
    contents_builder: Rc<ContentsBuilder>,
    master_name: String,
    retry_timer: Timer,
    retry_delay: Duration,
    state_changed_cb: RefCell<Option<StateChangedCb>>,
}

impl AsyncSentinelDatabaseDiscovery {
    pub fn new(
        engine: Rc<dyn Engine>,
        dispatcher_creator: AsyncCommandDispatcherCreator,
        sentinel_address: HostAndPort,
        master_name: String,
    ) -> Self {
        Self::with_retry_delay(
            engine,
            dispatcher_creator,
            sentinel_address,
            master_name,
            MASTER_INQUIRY_RETRY_DELAY,
        )
    }

    /// Like [`AsyncSentinelDatabaseDiscovery::new`] with an explicit retry
    /// delay. Seam for tests.
    pub fn with_retry_delay(
        engine: Rc<dyn Engine>,
        dispatcher_creator: AsyncCommandDispatcherCreator,
        sentinel_address: HostAndPort,
        master_name: String,
        retry_delay: Duration,
    ) -> Self {
        let contents_builder = Rc::new(ContentsBuilder::new(SEPARATOR));
        let sentinel_info = DatabaseInfo {
            hosts: vec![sentinel_address],
            topology: Topology::Single,
            ns: None,
            discovery: DiscoverySource::Sentinel,
        };
        let dispatcher = dispatcher_creator(
            Rc::clone(&engine),
            sentinel_info,
            Rc::clone(&contents_builder),
        );
        Self {
            inner: Rc::new(Inner {
                dispatcher,
                contents_builder,
                master_name,
                retry_timer: Timer::new(engine),
                retry_delay,
                state_changed_cb: RefCell::new(None),
            }),
        }
    }
}

impl AsyncDatabaseDiscovery for AsyncSentinelDatabaseDiscovery {
    fn set_state_changed_cb(&self, cb: StateChangedCb) {
        *self.inner.state_changed_cb.borrow_mut() = Some(cb);
        let weak = Rc::downgrade(&self.inner);
        self.inner.dispatcher.wait_connected_async(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Inner::send_master_inquiry(&inner);
            }
        }));
    }

    fn clear_state_changed_cb(&self) {
        *self.inner.state_changed_cb.borrow_mut() = None;
    }
}

impl Drop for AsyncSentinelDatabaseDiscovery {
    fn drop(&mut self) {
        self.clear_state_changed_cb();
    }
}

impl Inner {
    fn send_master_inquiry(inner: &Rc<Inner>) {
        let contents = inner
            .contents_builder
            .command("SENTINEL")
            .arg("get-master-addr-by-name")
            .arg(&inner.master_name)
            .finish();
        let weak = Rc::downgrade(inner);
        inner.dispatcher.dispatch_async(
            Box::new(move |result| {
                if let Some(inner) = weak.upgrade() {
                    Inner::master_inquiry_ack(&inner, result);
                }
            }),
            // Not meaningful for SENTINEL commands.
            "dummyNamespace",
            contents,
        );
    }

    fn master_inquiry_ack(inner: &Rc<Inner>, result: Result<Reply, DispatcherErrorCode>) {
        match result {
            Ok(reply) => match parse_master_inquiry_reply(&reply) {
                Some(master) => {
                    let info = DatabaseInfo {
                        hosts: vec![master],
                        topology: Topology::Single,
                        ns: None,
                        discovery: DiscoverySource::Sentinel,
                    };
                    if let Some(cb) = inner.state_changed_cb.borrow_mut().as_mut() {
                        cb(info);
                    }
                }
                None => sdl_abort!("Master inquiry reply parsing error."),
            },
            Err(error) => {
                log::debug!("[SentinelDiscovery] master inquiry failed: {error}, retrying");
                let weak = Rc::downgrade(inner);
                inner.retry_timer.arm(inner.retry_delay, move || {
                    if let Some(inner) = weak.upgrade() {
                        Inner::send_master_inquiry(&inner);
                    }
                });
            }
        }
    }
}

fn parse_master_inquiry_reply(reply: &Reply) -> Option<HostAndPort> {
    let Some(elements) = reply.as_array() else {
        log::debug!(
            "[SentinelDiscovery] invalid master inquiry reply type: {}",
            reply.type_name()
        );
        return None;
    };
    if elements.len() < 2 {
        log::debug!(
            "[SentinelDiscovery] short master inquiry reply: {} elements",
            elements.len()
        );
        return None;
    }
    let Some(host) = elements[0].as_data().and_then(|h| std::str::from_utf8(h).ok()) else {
        log::debug!(
            "[SentinelDiscovery] invalid host element type in master inquiry reply: {}",
            elements[0].type_name()
        );
        return None;
    };
    let Some(port) = elements[1].as_data().and_then(|p| std::str::from_utf8(p).ok()) else {
        log::debug!(
            "[SentinelDiscovery] invalid port element type in master inquiry reply: {}",
            elements[1].type_name()
        );
        return None;
    };
    match HostAndPort::parse(&format!("{host}:{port}"), 0) {
        Ok(master) => Some(master),
        Err(error) => {
            log::debug!(
                "[SentinelDiscovery] invalid host or port in master inquiry reply, host: {host}, port: {port}, error: {error}"
            );
            None
        }
    }
}
