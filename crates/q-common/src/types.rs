// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Common types for the secure partition manager
//!
//! Identifiers for partitions, clients, services and signals, the PSA status
//! code carried across the client boundary, and the caller-visible handle.

use core::fmt;

use crate::constants::{CLIENT_HANDLE_VALUE_MIN, STATIC_HANDLE_INDICATOR};

/// Secure partition identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// Client identity used when this partition acts as a client
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn client_id(self) -> ClientId {
        ClientId(self.0 as i32)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Client identity attached to every message
///
/// Secure clients use their (positive) partition id. Non-secure clients are
/// identified by negative values assigned by the non-secure agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub i32);

impl ClientId {
    /// Check if the identity belongs to the non-secure world
    #[must_use]
    pub const fn is_non_secure(self) -> bool {
        self.0 < 0
    }
}

/// Service identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sid(pub u32);

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SID 0x{:08X}", self.0)
    }
}

/// Signal bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signal(pub u32);

impl Signal {
    /// Empty signal set
    pub const NONE: Self = Self(0);

    /// Check if exactly one bit is set
    #[must_use]
    pub const fn is_single(self) -> bool {
        self.0 != 0 && (self.0 & (self.0 - 1)) == 0
    }

    /// Check if any bit of `other` is set in `self`
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Check if all bits of `other` are set in `self`
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Set union
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set intersection
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Set difference
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Check if no bit is set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Version compatibility policy of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VersionPolicy {
    /// Accept any client version less than or equal to the service version
    Relaxed = 0,
    /// Accept only the exact service version
    Strict = 1,
}

impl VersionPolicy {
    /// Check a client-requested version against the service version
    #[must_use]
    pub const fn accepts(self, requested: u32, service: u32) -> bool {
        match self {
            Self::Relaxed => requested <= service,
            Self::Strict => requested == service,
        }
    }
}

/// PSA status code
///
/// Negative values are errors. Services may reply with any non-negative
/// value to report success with a detail code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    /// Operation completed
    pub const SUCCESS: Self = Self(0);
    /// Caller violated the API contract
    pub const PROGRAMMER_ERROR: Self = Self(-129);
    /// Connection refused by the framework or the service
    pub const CONNECTION_REFUSED: Self = Self(-130);
    /// Connection temporarily unavailable
    pub const CONNECTION_BUSY: Self = Self(-131);
    /// Unspecified failure
    pub const GENERIC_ERROR: Self = Self(-132);
    /// Requested item does not exist
    pub const DOES_NOT_EXIST: Self = Self(-140);

    /// Check if the status reports success
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// Caller-visible handle
///
/// Either a connection handle (an obfuscated pool reference), a static
/// handle for a stateless service, or the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub i32);

impl Handle {
    /// The null handle
    pub const NULL: Self = Self(0);

    /// Check for the null handle
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if the handle addresses a stateless service directly
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn is_static(self) -> bool {
        self.0 > 0 && (self.0 as u32 & STATIC_HANDLE_INDICATOR) != 0
    }

    /// Check if the value lies in the connection handle range
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn is_connection(self) -> bool {
        self.0 >= CLIENT_HANDLE_VALUE_MIN as i32 && !self.is_static()
    }
}

/// Message type carried to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Connection request
    Connect,
    /// Request with a service-defined type (non-negative)
    Call(i32),
    /// Connection teardown
    Disconnect,
}

impl MessageType {
    /// Raw PSA message type
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Connect => -1,
            Self::Call(t) => t,
            Self::Disconnect => -2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_policy() {
        assert!(VersionPolicy::Strict.accepts(1, 1));
        assert!(!VersionPolicy::Strict.accepts(0, 1));
        assert!(VersionPolicy::Relaxed.accepts(0, 1));
        assert!(VersionPolicy::Relaxed.accepts(1, 1));
        assert!(!VersionPolicy::Relaxed.accepts(2, 1));
    }

    #[test]
    fn test_signal_ops() {
        let s = Signal(0x10).union(Signal(0x04));
        assert!(s.contains(Signal(0x10)));
        assert!(!s.is_single());
        assert!(Signal(0x10).is_single());
        assert_eq!(s.without(Signal(0x10)), Signal(0x04));
        assert!(Signal::NONE.is_empty());
    }

    #[test]
    fn test_handle_classes() {
        assert!(Handle::NULL.is_null());
        assert!(Handle(0x4000_0101).is_static());
        assert!(!Handle(0x4000_0101).is_connection());
        assert!(Handle(9).is_connection());
        assert!(!Handle(-3).is_connection());
    }

    #[test]
    fn test_client_identity() {
        assert!(ClientId(-1).is_non_secure());
        assert!(!PartitionId(5).client_id().is_non_secure());
        assert_eq!(MessageType::Call(3).as_raw(), 3);
        assert_eq!(MessageType::Disconnect.as_raw(), -2);
    }
}
