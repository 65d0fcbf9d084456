// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command dispatcher contract.
//!
//! The dispatcher owns everything wire-level: connection pool, pipelining,
//! request framing and reply parsing for the concrete backend. This library
//! only issues [`Contents`] payloads and consumes [`Reply`] completions, so
//! the dispatcher stays an external collaborator created through an
//! [`AsyncCommandDispatcherCreator`] injected at the public entry points.
//!
//! All callbacks fire from engine context; a dispatcher implementation must
//! route its completions through the [`Engine`] it was created with.

use std::rc::Rc;

use super::contents::{Contents, ContentsBuilder};
use super::discovery::DatabaseInfo;
use crate::engine::Engine;
use crate::error::DispatcherErrorCode;
use crate::redis::reply::Reply;

/// Fires once when the transport is usable.
pub type ConnectAck = Box<dyn FnOnce()>;

/// Completion of one dispatched command.
pub type DispatchAck = Box<dyn FnOnce(Result<Reply, DispatcherErrorCode>)>;

/// Asynchronous backend command channel.
pub trait AsyncCommandDispatcher {
    /// Invoke `connected` once the transport towards the current endpoint
    /// set is established.
    fn wait_connected_async(&self, connected: ConnectAck);

    /// Issue one command. Exactly one completion fires per dispatch, with
    /// either the backend reply or a dispatcher error code.
    fn dispatch_async(&self, ack: DispatchAck, ns: &str, contents: Contents);
}

/// Factory for dispatchers bound to a concrete endpoint snapshot.
///
/// Discovery re-invokes the creator whenever the endpoint set changes, so
/// implementations must not assume a single call.
pub type AsyncCommandDispatcherCreator =
    Rc<dyn Fn(Rc<dyn Engine>, DatabaseInfo, Rc<ContentsBuilder>) -> Rc<dyn AsyncCommandDispatcher>>;
