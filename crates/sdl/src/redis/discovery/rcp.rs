// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Out-of-band service discovery bridge.
//!
//! An external discovery service pushes endpoint updates through its own
//! handle; this variant registers the handle's fd with the engine, drives
//! it on readiness and translates its notifications into [`DatabaseInfo`]
//! snapshots.
//!
//! Re-notifications that carry no change are suppressed -- except for
//! cluster sessions, which are always forwarded: a clustered dispatcher
//! does not heal itself from a full-cluster restart and must be recreated
//! even when the endpoint set looks unchanged.

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use super::{AsyncDatabaseDiscovery, DatabaseInfo, DiscoverySource, StateChangedCb, Topology};
use crate::engine::{Engine, EVENT_IN};
use crate::hostport::HostAndPort;
use crate::sdl_abort;
use crate::storage::Namespace;

/// Two-node redundant database session.
pub const DB_SESSION_TYPE_2N: u32 = 2;

/// Clustered database session.
pub const DB_SESSION_TYPE_CLUSTER: u32 = 3;

/// Endpoint notification pushed by the external discovery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDiscoveryInfo {
    /// `(host, port)` pairs of the active database session.
    pub hosts: Vec<(String, u16)>,
    /// Session type code (`DB_SESSION_TYPE_*`).
    pub db_session_type: u32,
}

/// Contract of the external discovery handle (consumed, not implemented
/// here). The handle multiplexes onto one fd and surfaces notifications
/// from `handle_events`.
pub trait ServiceDiscoveryHandle {
    fn fd(&self) -> RawFd;
    fn handle_events(&self);
    fn set_state_changed_cb(&self, cb: Box<dyn FnMut(ServiceDiscoveryInfo)>);
    fn clear_state_changed_cb(&self);
}

pub struct AsyncRcpDatabaseDiscovery {
    engine: Rc<dyn Engine>,
    ns: Option<Namespace>,
    handle: Rc<dyn ServiceDiscoveryHandle>,
    discovery_fd: RawFd,
    current_info: Rc<RefCell<Option<DatabaseInfo>>>,
}

impl AsyncRcpDatabaseDiscovery {
    pub fn new(
        engine: Rc<dyn Engine>,
        ns: Option<Namespace>,
        handle: Rc<dyn ServiceDiscoveryHandle>,
    ) -> Self {
        let discovery_fd = handle.fd();
        let driver = Rc::clone(&handle);
        engine.add_monitored_fd(
            discovery_fd,
            EVENT_IN,
            Box::new(move |_| driver.handle_events()),
        );
        Self {
            engine,
            ns,
            handle,
            discovery_fd,
            current_info: Rc::new(RefCell::new(None)),
        }
    }
}

impl AsyncDatabaseDiscovery for AsyncRcpDatabaseDiscovery {
    fn set_state_changed_cb(&self, mut cb: StateChangedCb) {
        let ns = self.ns.clone();
        let current_info = Rc::clone(&self.current_info);
        self.handle.set_state_changed_cb(Box::new(move |info| {
            let new_info = translate(&info, ns.clone());
            let mut current = current_info.borrow_mut();
            // Cluster dispatchers are recreated unconditionally; everyone
            // else only on a real change.
            if new_info.topology == Topology::Cluster || current.as_ref() != Some(&new_info) {
                cb(new_info.clone());
            } else {
                log::debug!(
                    "[RcpDiscovery] state change notification without database info change"
                );
            }
            *current = Some(new_info);
        }));
    }

    fn clear_state_changed_cb(&self) {
        self.handle.clear_state_changed_cb();
    }
}

impl Drop for AsyncRcpDatabaseDiscovery {
    fn drop(&mut self) {
        self.engine.delete_monitored_fd(self.discovery_fd);
    }
}

fn translate(info: &ServiceDiscoveryInfo, ns: Option<Namespace>) -> DatabaseInfo {
    let topology = match info.db_session_type {
        DB_SESSION_TYPE_2N => Topology::Redundant,
        DB_SESSION_TYPE_CLUSTER => Topology::Cluster,
        unknown => {
            log::error!("[RcpDiscovery] unknown database session type received: {unknown}");
            sdl_abort!("Unknown database type.");
        }
    };
    DatabaseInfo {
        hosts: info
            .hosts
            .iter()
            .map(|(host, port)| HostAndPort::new(host.clone(), *port))
            .collect(),
        topology,
        ns,
        discovery: DiscoverySource::Rcp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PollEngine;

    struct FakeHandle {
        read_fd: RawFd,
        write_fd: RawFd,
        cb: RefCell<Option<Box<dyn FnMut(ServiceDiscoveryInfo)>>>,
        pending: RefCell<Vec<ServiceDiscoveryInfo>>,
    }

    impl FakeHandle {
        fn new() -> Rc<Self> {
            let mut fds = [0 as RawFd; 2];
            assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
            Rc::new(Self {
                read_fd: fds[0],
                write_fd: fds[1],
                cb: RefCell::new(None),
                pending: RefCell::new(Vec::new()),
            })
        }

        fn push(&self, info: ServiceDiscoveryInfo) {
            self.pending.borrow_mut().push(info);
            assert_eq!(unsafe { libc::write(self.write_fd, b"x".as_ptr().cast(), 1) }, 1);
        }

        fn emit_directly(&self, info: ServiceDiscoveryInfo) {
            if let Some(cb) = self.cb.borrow_mut().as_mut() {
                cb(info);
            }
        }
    }

    impl ServiceDiscoveryHandle for FakeHandle {
        fn fd(&self) -> RawFd {
            self.read_fd
        }

        fn handle_events(&self) {
            let mut byte = [0u8; 8];
            unsafe { libc::read(self.read_fd, byte.as_mut_ptr().cast(), byte.len()) };
            let pending: Vec<_> = self.pending.borrow_mut().drain(..).collect();
            for info in pending {
                self.emit_directly(info);
            }
        }

        fn set_state_changed_cb(&self, cb: Box<dyn FnMut(ServiceDiscoveryInfo)>) {
            *self.cb.borrow_mut() = Some(cb);
        }

        fn clear_state_changed_cb(&self) {
            *self.cb.borrow_mut() = None;
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.read_fd);
                libc::close(self.write_fd);
            }
        }
    }

    fn redundant_info() -> ServiceDiscoveryInfo {
        ServiceDiscoveryInfo {
            hosts: vec![("db-0".to_string(), 6379), ("db-1".to_string(), 6379)],
            db_session_type: DB_SESSION_TYPE_2N,
        }
    }

    fn subscribe(
        discovery: &AsyncRcpDatabaseDiscovery,
    ) -> Rc<RefCell<Vec<DatabaseInfo>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let events2 = Rc::clone(&events);
        discovery.set_state_changed_cb(Box::new(move |info| events2.borrow_mut().push(info)));
        events
    }

    #[test]
    fn test_notification_translated_through_engine_fd() {
        let engine = Rc::new(PollEngine::new().unwrap());
        let handle = FakeHandle::new();
        let discovery = AsyncRcpDatabaseDiscovery::new(
            engine.clone(),
            Some("ns".to_string()),
            handle.clone(),
        );
        let events = subscribe(&discovery);

        handle.push(redundant_info());
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while events.borrow().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(2));
            engine.handle_events();
        }

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].hosts,
            vec![HostAndPort::new("db-0", 6379), HostAndPort::new("db-1", 6379)]
        );
        assert_eq!(events[0].topology, Topology::Redundant);
        assert_eq!(events[0].ns.as_deref(), Some("ns"));
        assert_eq!(events[0].discovery, DiscoverySource::Rcp);
    }

    #[test]
    fn test_unchanged_info_suppressed_for_non_cluster() {
        let engine = Rc::new(PollEngine::new().unwrap());
        let handle = FakeHandle::new();
        let discovery = AsyncRcpDatabaseDiscovery::new(engine, None, handle.clone());
        let events = subscribe(&discovery);

        handle.emit_directly(redundant_info());
        handle.emit_directly(redundant_info());
        assert_eq!(events.borrow().len(), 1);

        let mut changed = redundant_info();
        changed.hosts.pop();
        handle.emit_directly(changed);
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn test_cluster_info_always_forwarded() {
        let engine = Rc::new(PollEngine::new().unwrap());
        let handle = FakeHandle::new();
        let discovery = AsyncRcpDatabaseDiscovery::new(engine, None, handle.clone());
        let events = subscribe(&discovery);

        let info = ServiceDiscoveryInfo {
            hosts: vec![("db-0".to_string(), 7000)],
            db_session_type: DB_SESSION_TYPE_CLUSTER,
        };
        handle.emit_directly(info.clone());
        handle.emit_directly(info);
        assert_eq!(events.borrow().len(), 2);
        assert_eq!(events.borrow()[0].topology, Topology::Cluster);
    }

    #[test]
    #[should_panic(expected = "Unknown database type.")]
    fn test_unknown_session_type_aborts() {
        let engine = Rc::new(PollEngine::new().unwrap());
        let handle = FakeHandle::new();
        let discovery = AsyncRcpDatabaseDiscovery::new(engine, None, handle.clone());
        let _events = subscribe(&discovery);
        handle.emit_directly(ServiceDiscoveryInfo {
            hosts: vec![],
            db_session_type: 42,
        });
    }

    #[test]
    fn test_drop_deregisters_discovery_fd() {
        let engine = Rc::new(PollEngine::new().unwrap());
        let handle = FakeHandle::new();
        let events;
        {
            let discovery =
                AsyncRcpDatabaseDiscovery::new(engine.clone(), None, handle.clone());
            events = subscribe(&discovery);
        }
        handle.push(redundant_info());
        std::thread::sleep(std::time::Duration::from_millis(10));
        engine.handle_events();
        assert!(events.borrow().is_empty());
    }
}
