// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint value type: a host paired with a TCP port.
//!
//! Accepted textual forms are `host`, `host:port` and `[v6]:port` (a bare
//! IPv6 literal must be bracketed before a port can be attached). Hosts are
//! carried verbatim; no DNS resolution happens here.

use std::fmt;
use thiserror::Error;

/// Default database port.
pub const DEFAULT_DB_PORT: u16 = 6379;

/// Default sentinel port.
pub const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// Errors produced when parsing an endpoint from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty host")]
    EmptyHost,

    #[error("invalid port: \"{0}\"")]
    InvalidPort(String),

    #[error("missing ']' in bracketed address")]
    UnterminatedBracket,

    #[error("unexpected characters after ']'")]
    TrailingGarbage,

    #[error("IPv6 address must be bracketed before a port can be given")]
    UnbracketedIpv6,
}

/// A `host:port` pair.
///
/// `host` is a DNS name, an IPv4 literal, or an unbracketed IPv6 literal
/// (brackets are a parsing artifact only; they are stripped on input and
/// re-added by [`fmt::Display`] when the host contains `:`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAndPort {
    host: String,
    port: u16,
}

impl HostAndPort {
    /// Create an endpoint from already-separated parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port` or `[v6]:port`; `default_port` is used
    /// when the text carries no port.
    pub fn parse(address: &str, default_port: u16) -> Result<Self, AddressError> {
        if let Some(rest) = address.strip_prefix('[') {
            let end = rest.find(']').ok_or(AddressError::UnterminatedBracket)?;
            let host = &rest[..end];
            if host.is_empty() {
                return Err(AddressError::EmptyHost);
            }
            let tail = &rest[end + 1..];
            let port = match tail.strip_prefix(':') {
                None if tail.is_empty() => default_port,
                None => return Err(AddressError::TrailingGarbage),
                Some(p) => parse_port(p)?,
            };
            return Ok(Self::new(host, port));
        }

        match address.matches(':').count() {
            0 => {
                if address.is_empty() {
                    return Err(AddressError::EmptyHost);
                }
                Ok(Self::new(address, default_port))
            }
            1 => {
                let (host, port) = address.split_once(':').unwrap_or((address, ""));
                if host.is_empty() {
                    return Err(AddressError::EmptyHost);
                }
                Ok(Self::new(host, parse_port(port)?))
            }
            // Several colons without brackets: an IPv6 literal whose port
            // boundary cannot be determined.
            _ => Err(AddressError::UnbracketedIpv6),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(text: &str) -> Result<u16, AddressError> {
    text.parse::<u16>()
        .map_err(|_| AddressError::InvalidPort(text.to_string()))
}
