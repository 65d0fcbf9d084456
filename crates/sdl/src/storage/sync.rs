// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking facade over an [`AsyncStorage`].
//!
//! Built without threads: each call issues the asynchronous operation,
//! then drives the storage's reactor fd with `poll(2)` until the
//! completion lands. Intended for command-line tools and applications that
//! keep their storage work on one dedicated thread.
//!
//! A single instance must not be shared between threads without external
//! locking -- the completion slots are per-call, not synchronized.

use std::cell::{Cell, RefCell};
use std::os::unix::io::RawFd;
use std::rc::Rc;

use super::{AsyncStorage, AsyncStorageRouter, Data, DataMap, Keys};
use crate::config::ConfigurationError;
use crate::error::{AsyncError, Error};
use crate::redis::dispatcher::AsyncCommandDispatcherCreator;
use crate::sdl_abort;

pub struct SyncStorage {
    storage: Box<dyn AsyncStorage>,
    fd: RawFd,
}

impl SyncStorage {
    /// Standard entry point; see [`AsyncStorageRouter::create`] for the
    /// configuration sources.
    pub fn create(
        dispatcher_creator: AsyncCommandDispatcherCreator,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self::new(Box::new(AsyncStorageRouter::create(
            dispatcher_creator,
        )?)))
    }

    /// Wrap an existing asynchronous storage.
    pub fn new(storage: Box<dyn AsyncStorage>) -> Self {
        let fd = storage.fd();
        Self { storage, fd }
    }

    /// Write all entries of `data_map` into `ns`. Atomic: either every
    /// entry is written or an error is returned.
    ///
    /// # Errors
    ///
    /// [`Error::Backend`] if the backend failed to process the request,
    /// [`Error::NotConnected`] if the backend is not reachable,
    /// [`Error::OperationInterrupted`] if no reply arrived,
    /// [`Error::RejectedByBackend`] if the backend refused the request,
    /// [`Error::InvalidNamespace`] if `ns` violates the format rules.
    pub fn set(&self, ns: &str, data_map: DataMap) -> Result<(), Error> {
        self.wait_sdl_to_be_ready(ns)?;
        self.run_op(|ack| self.storage.set_async(ns, data_map, ack))
    }

    /// Write `new_data` under `key` if the stored value equals `old_data`.
    /// Returns whether the value was swapped.
    ///
    /// # Errors
    ///
    /// As for [`SyncStorage::set`].
    pub fn set_if(
        &self,
        ns: &str,
        key: &str,
        old_data: Data,
        new_data: Data,
    ) -> Result<bool, Error> {
        self.wait_sdl_to_be_ready(ns)?;
        self.run_op(|ack| self.storage.set_if_async(ns, key, old_data, new_data, ack))
    }

    /// Write `data` under `key` unless the key already exists. Returns
    /// whether the key was created.
    ///
    /// # Errors
    ///
    /// As for [`SyncStorage::set`].
    pub fn set_if_not_exists(&self, ns: &str, key: &str, data: Data) -> Result<bool, Error> {
        self.wait_sdl_to_be_ready(ns)?;
        self.run_op(|ack| self.storage.set_if_not_exists_async(ns, key, data, ack))
    }

    /// Read `keys` from `ns`; only existing keys appear in the result.
    ///
    /// # Errors
    ///
    /// As for [`SyncStorage::set`].
    pub fn get(&self, ns: &str, keys: Keys) -> Result<DataMap, Error> {
        self.wait_sdl_to_be_ready(ns)?;
        self.run_op(|ack| self.storage.get_async(ns, keys, ack))
    }

    /// Remove `keys` from `ns`. Atomic: either all existing keys are
    /// removed or an error is returned.
    ///
    /// # Errors
    ///
    /// As for [`SyncStorage::set`].
    pub fn remove(&self, ns: &str, keys: Keys) -> Result<(), Error> {
        self.wait_sdl_to_be_ready(ns)?;
        self.run_op(|ack| self.storage.remove_async(ns, keys, ack))
    }

    /// Remove `key` if its stored value equals `data`. Returns whether the
    /// removal happened.
    ///
    /// # Errors
    ///
    /// As for [`SyncStorage::set`].
    pub fn remove_if(&self, ns: &str, key: &str, data: Data) -> Result<bool, Error> {
        self.wait_sdl_to_be_ready(ns)?;
        self.run_op(|ack| self.storage.remove_if_async(ns, key, data, ack))
    }

    /// Keys of `ns` starting with `key_prefix`; an empty prefix returns
    /// every key. Neither atomic nor isolated: concurrent writers may be
    /// partially visible.
    ///
    /// # Errors
    ///
    /// As for [`SyncStorage::set`].
    pub fn find_keys(&self, ns: &str, key_prefix: &str) -> Result<Keys, Error> {
        self.wait_sdl_to_be_ready(ns)?;
        self.run_op(|ack| self.storage.find_keys_async(ns, key_prefix, ack))
    }

    /// Remove every key under `ns` atomically.
    ///
    /// # Errors
    ///
    /// As for [`SyncStorage::set`].
    pub fn remove_all(&self, ns: &str) -> Result<(), Error> {
        self.wait_sdl_to_be_ready(ns)?;
        self.run_op(|ack| self.storage.remove_all_async(ns, ack))
    }

    /// First operation on a namespace blocks here until discovery has
    /// resolved and the backend transport is up.
    fn wait_sdl_to_be_ready(&self, ns: &str) -> Result<(), Error> {
        self.run_op(|ack| self.storage.wait_ready_async(ns, ack))
    }

    fn run_op<T: 'static>(
        &self,
        issue: impl FnOnce(Box<dyn FnOnce(Result<T, AsyncError>)>),
    ) -> Result<T, Error> {
        let done = Rc::new(Cell::new(false));
        let slot: Rc<RefCell<Option<Result<T, AsyncError>>>> = Rc::new(RefCell::new(None));
        let done_cb = Rc::clone(&done);
        let slot_cb = Rc::clone(&slot);
        issue(Box::new(move |result| {
            *slot_cb.borrow_mut() = Some(result);
            done_cb.set(true);
        }));
        self.wait_for_callback(&done);
        let taken = slot.borrow_mut().take();
        match taken {
            Some(result) => result.map_err(Error::from),
            // The loop above only exits once the completion ran.
            None => sdl_abort!("operation marked done without a completion result"),
        }
    }

    fn wait_for_callback(&self, done: &Rc<Cell<bool>>) {
        let mut pollfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        while !done.get() {
            pollfd.revents = 0;
            let rc = unsafe { libc::poll(&mut pollfd, 1, -1) };
            if rc > 0 && (pollfd.revents & libc::POLLIN) != 0 {
                self.storage.handle_events();
            }
            // Interrupted or spurious wakeups: just poll again.
        }
    }
}
