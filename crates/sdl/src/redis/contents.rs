// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Opaque command payloads handed to the command dispatcher.
//!
//! The storage handler assembles backend commands as a flat argument stack;
//! how the stack is framed onto the wire is the dispatcher's business. The
//! one piece of shared knowledge is key framing: a storage key is
//! `{namespace}<separator>key`, so a clustered backend hashes on the
//! namespace and an operator can still address keys by eye.

/// Flat argument stack of one backend command. The first element is the
/// command word.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contents {
    pub stack: Vec<Vec<u8>>,
}

impl Contents {
    /// Command word, when valid UTF-8.
    pub fn command(&self) -> Option<&str> {
        self.stack.first().and_then(|arg| std::str::from_utf8(arg).ok())
    }

    /// Argument at `index` as UTF-8 text (index 0 is the command word).
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.stack.get(index).and_then(|arg| std::str::from_utf8(arg).ok())
    }
}

/// Assembles [`Contents`] with consistent namespace key framing.
#[derive(Debug, Clone)]
pub struct ContentsBuilder {
    separator: char,
}

impl ContentsBuilder {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    /// Start a command; chain arguments and [`ContentsAssembler::finish`].
    pub fn command(&self, command: &str) -> ContentsAssembler<'_> {
        ContentsAssembler {
            builder: self,
            stack: vec![command.as_bytes().to_vec()],
        }
    }

    /// Framing prefix for every key of `ns`: `{ns}<separator>`.
    pub fn key_prefix(&self, ns: &str) -> String {
        format!("{{{}}}{}", ns, self.separator)
    }

    /// Full backend key for `(ns, key)`.
    pub fn frame_key(&self, ns: &str, key: &str) -> String {
        format!("{}{}", self.key_prefix(ns), key)
    }
}

/// In-progress command payload.
pub struct ContentsAssembler<'a> {
    builder: &'a ContentsBuilder,
    stack: Vec<Vec<u8>>,
}

impl ContentsAssembler<'_> {
    /// Append the framed backend key for `(ns, key)`.
    pub fn key(mut self, ns: &str, key: &str) -> Self {
        self.stack.push(self.builder.frame_key(ns, key).into_bytes());
        self
    }

    /// Append an already framed backend key.
    pub fn raw_key(mut self, key: Vec<u8>) -> Self {
        self.stack.push(key);
        self
    }

    /// Append a binary value.
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.stack.push(data);
        self
    }

    /// Append a textual argument.
    pub fn arg(mut self, arg: &str) -> Self {
        self.stack.push(arg.as_bytes().to_vec());
        self
    }

    pub fn finish(self) -> Contents {
        Contents { stack: self.stack }
    }
}
