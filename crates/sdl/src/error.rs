// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy.
//!
//! Two internal code categories travel through operation completions:
//!
//! - [`DispatcherErrorCode`] -- failures reported by the command dispatcher
//!   (transport, protocol, backend resource conditions).
//! - [`StorageErrorCode`] -- failures detected by the storage handler before
//!   any backend traffic (namespace syntax, discovery not finished).
//!
//! [`AsyncError`] carries either category through the asynchronous surface;
//! the blocking facade translates it into the public [`Error`] kinds. The
//! translation is total: every code has exactly one public kind.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Internal code categories
// ============================================================================

/// Failure codes surfaced by a command dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherErrorCode {
    /// Unclassified dispatcher failure.
    Unknown,
    /// Transport dropped while a command was in flight.
    ConnectionLost,
    /// The backend refused the command.
    ProtocolError,
    /// The backend is out of memory.
    OutOfMemory,
    /// The backend is still loading its dataset into memory.
    DatasetLoading,
    /// No transport is established.
    NotConnected,
    /// Transport-level I/O failure.
    IoError,
}

impl fmt::Display for DispatcherErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DispatcherErrorCode::Unknown => "unknown error",
            DispatcherErrorCode::ConnectionLost => "connection lost",
            DispatcherErrorCode::ProtocolError => "protocol error",
            DispatcherErrorCode::OutOfMemory => "backend out of memory",
            DispatcherErrorCode::DatasetLoading => "dataset is being loaded into memory",
            DispatcherErrorCode::NotConnected => "not connected",
            DispatcherErrorCode::IoError => "input/output error",
        };
        f.write_str(text)
    }
}

/// Failure codes raised by the backend storage handler itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// The namespace contains framing delimiters (or is empty).
    InvalidNamespace,
    /// Discovery has not yet produced a usable endpoint set.
    NotYetDiscovered,
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StorageErrorCode::InvalidNamespace => "invalid namespace identifier",
            StorageErrorCode::NotYetDiscovered => "database backend not yet discovered",
        };
        f.write_str(text)
    }
}

// ============================================================================
// Asynchronous surface carrier
// ============================================================================

/// Error delivered through asynchronous completion callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncError {
    /// A dispatcher code.
    Dispatcher(DispatcherErrorCode),
    /// A storage handler code.
    Storage(StorageErrorCode),
    /// Internal refusal: the layer itself declined the operation.
    SdlRejected(String),
}

impl fmt::Display for AsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsyncError::Dispatcher(code) => code.fmt(f),
            AsyncError::Storage(code) => code.fmt(f),
            AsyncError::SdlRejected(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for AsyncError {}

impl From<DispatcherErrorCode> for AsyncError {
    fn from(code: DispatcherErrorCode) -> Self {
        AsyncError::Dispatcher(code)
    }
}

impl From<StorageErrorCode> for AsyncError {
    fn from(code: StorageErrorCode) -> Self {
        AsyncError::Storage(code)
    }
}

// ============================================================================
// Public failure kinds
// ============================================================================

/// User-visible failure kinds raised by the blocking facade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The backend data storage failed to process the request.
    #[error("backend failure: {0}")]
    Backend(String),

    /// No connection to the backend data storage.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// No reply was received for an issued operation.
    #[error("operation interrupted: {0}")]
    OperationInterrupted(String),

    /// The backend rejected the request.
    #[error("rejected by backend: {0}")]
    RejectedByBackend(String),

    /// The shared data layer itself refused the request.
    #[error("rejected by shared data layer: {0}")]
    RejectedBySdl(String),

    /// The namespace does not meet the format restrictions.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
}

impl From<AsyncError> for Error {
    fn from(error: AsyncError) -> Self {
        let message = error.to_string();
        match error {
            AsyncError::Dispatcher(code) => match code {
                DispatcherErrorCode::Unknown
                | DispatcherErrorCode::OutOfMemory
                | DispatcherErrorCode::IoError => Error::Backend(message),
                DispatcherErrorCode::ConnectionLost => Error::OperationInterrupted(message),
                DispatcherErrorCode::ProtocolError => Error::RejectedByBackend(message),
                DispatcherErrorCode::DatasetLoading | DispatcherErrorCode::NotConnected => {
                    Error::NotConnected(message)
                }
            },
            AsyncError::Storage(code) => match code {
                StorageErrorCode::InvalidNamespace => Error::InvalidNamespace(message),
                StorageErrorCode::NotYetDiscovered => Error::NotConnected(message),
            },
            AsyncError::SdlRejected(_) => Error::RejectedBySdl(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_codes_map_to_public_kinds() {
        let cases = [
            (DispatcherErrorCode::Unknown, "backend"),
            (DispatcherErrorCode::OutOfMemory, "backend"),
            (DispatcherErrorCode::IoError, "backend"),
            (DispatcherErrorCode::ConnectionLost, "interrupted"),
            (DispatcherErrorCode::ProtocolError, "rejected-by-backend"),
            (DispatcherErrorCode::DatasetLoading, "not-connected"),
            (DispatcherErrorCode::NotConnected, "not-connected"),
        ];
        for (code, expected) in cases {
            let mapped = Error::from(AsyncError::Dispatcher(code));
            let kind = match mapped {
                Error::Backend(_) => "backend",
                Error::OperationInterrupted(_) => "interrupted",
                Error::RejectedByBackend(_) => "rejected-by-backend",
                Error::NotConnected(_) => "not-connected",
                other => panic!("unexpected mapping for {code:?}: {other:?}"),
            };
            assert_eq!(kind, expected, "mapping for {code:?}");
        }
    }

    #[test]
    fn test_storage_codes_map_to_public_kinds() {
        assert!(matches!(
            Error::from(AsyncError::Storage(StorageErrorCode::InvalidNamespace)),
            Error::InvalidNamespace(_)
        ));
        assert!(matches!(
            Error::from(AsyncError::Storage(StorageErrorCode::NotYetDiscovered)),
            Error::NotConnected(_)
        ));
    }

    #[test]
    fn test_internal_refusal_maps_to_rejected_by_sdl() {
        let mapped = Error::from(AsyncError::SdlRejected("operation refused".to_string()));
        assert_eq!(mapped, Error::RejectedBySdl("operation refused".to_string()));
    }

    #[test]
    fn test_messages_carry_code_text() {
        let mapped = Error::from(AsyncError::Dispatcher(DispatcherErrorCode::DatasetLoading));
        assert_eq!(
            mapped.to_string(),
            "not connected: dataset is being loaded into memory"
        );
    }
}
