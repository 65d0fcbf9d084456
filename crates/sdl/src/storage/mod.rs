// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! User-facing storage surfaces.
//!
//! [`AsyncStorage`] is the non-blocking contract: every operation takes a
//! completion callback and returns promptly; callbacks fire from
//! [`AsyncStorage::handle_events`] in submission order (per instance).
//! [`AsyncStorageRouter`] is the standard implementation, routing each call
//! by namespace policy to the real backend handler or to a no-op sink.
//! [`SyncStorage`] turns any [`AsyncStorage`] into a blocking API by
//! driving the reactor fd from the calling thread -- no helper threads.

mod dummy;
mod router;
mod sync;

pub use dummy::AsyncDummyStorage;
pub use router::{default_discovery_creator, AsyncDatabaseDiscoveryCreator, AsyncStorageRouter};
pub use sync::SyncStorage;

use std::collections::{BTreeMap, BTreeSet};
use std::os::unix::io::RawFd;

use crate::error::AsyncError;

/// Client-chosen partition key; a prefix of every stored key.
pub type Namespace = String;

/// Key within a namespace.
pub type Key = String;

/// Stored value: an opaque byte sequence.
pub type Data = Vec<u8>;

/// Ordered key-to-value mapping.
pub type DataMap = BTreeMap<Key, Data>;

/// Ordered key set.
pub type Keys = BTreeSet<Key>;

/// Byte separating the namespace frame from the key on the backend.
/// Namespaces therefore must not contain `,` (nor the `{`/`}` frame
/// characters); see [`crate::namespace`].
pub const SEPARATOR: char = ',';

/// Completion of a readiness wait.
pub type ReadyAck = Box<dyn FnOnce(Result<(), AsyncError>)>;

/// Completion of an unconditional modification.
pub type ModifyAck = Box<dyn FnOnce(Result<(), AsyncError>)>;

/// Completion of a conditional modification; the payload tells whether the
/// condition held and the modification was applied.
pub type ModifyIfAck = Box<dyn FnOnce(Result<bool, AsyncError>)>;

/// Completion of a read; only keys that exist are present in the map.
pub type GetAck = Box<dyn FnOnce(Result<DataMap, AsyncError>)>;

/// Completion of a key enumeration.
pub type FindKeysAck = Box<dyn FnOnce(Result<Keys, AsyncError>)>;

/// Non-blocking access to shared data layer storage.
///
/// Operations never suspend: they validate, possibly post an immediate
/// failure completion, and return. Exactly one completion fires per issued
/// operation, from inside [`AsyncStorage::handle_events`]. A single
/// instance promises submission-order completions; nothing is promised
/// between instances.
pub trait AsyncStorage {
    /// Reactor fd; poll it for POLLIN and call
    /// [`AsyncStorage::handle_events`] when readable.
    fn fd(&self) -> RawFd;

    /// Run ready completions and internal machinery.
    fn handle_events(&self);

    /// Completes once the backend serving `ns` is usable (discovery has
    /// produced an endpoint set and the transport is up).
    fn wait_ready_async(&self, ns: &str, ack: ReadyAck);

    /// Write all entries of `data_map`. Atomic: either every entry is
    /// written or the operation fails as a whole.
    fn set_async(&self, ns: &str, data_map: DataMap, ack: ModifyAck);

    /// Write `new_data` under `key` only if the current value equals
    /// `old_data`. The completion reports whether the swap happened.
    fn set_if_async(&self, ns: &str, key: &str, old_data: Data, new_data: Data, ack: ModifyIfAck);

    /// Write `data` under `key` only if `key` does not exist yet. The
    /// completion reports whether the key was created.
    fn set_if_not_exists_async(&self, ns: &str, key: &str, data: Data, ack: ModifyIfAck);

    /// Read `keys`; the resulting map contains only the keys that exist.
    fn get_async(&self, ns: &str, keys: Keys, ack: GetAck);

    /// Remove `keys`. Atomic: either all existing keys are removed or the
    /// operation fails as a whole.
    fn remove_async(&self, ns: &str, keys: Keys, ack: ModifyAck);

    /// Remove `key` only if its current value equals `data`. The
    /// completion reports whether the removal happened.
    fn remove_if_async(&self, ns: &str, key: &str, data: Data, ack: ModifyIfAck);

    /// Enumerate keys starting with `key_prefix` (empty prefix: all keys).
    /// Not atomic and not isolated: results may reflect concurrent writes.
    fn find_keys_async(&self, ns: &str, key_prefix: &str, ack: FindKeysAck);

    /// Remove every key under `ns` atomically.
    fn remove_all_async(&self, ns: &str, ack: ModifyAck);
}
