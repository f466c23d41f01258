// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Error types for the secure partition manager
//!
//! This module defines the unified error type used throughout the system.
//! Errors fall into two tiers: fatal errors, whose only valid response is a
//! full system reset, and caller-visible errors that surface as PSA status
//! codes from the IPC entry points.

use core::fmt;

use crate::types::Status;

/// Result type alias for secure partition manager operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the secure partition manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Isolation Errors (0x01xx)
    // =========================================================================
    /// Boundary update attempted before static setup
    BoundaryNotReady,
    /// Static boundaries were already installed
    BoundaryAlreadySet,
    /// Flow-control accumulator diverged from its expected value
    FlowControlViolation,
    /// Region read back from hardware differs from its descriptor
    RegionMismatch,
    /// Hardware holds a region that the layout does not describe
    UnexpectedRegion,
    /// Hardware unit is disabled after configuration
    UnitNotEnabled,
    /// Hardware lock bit did not stick
    LockNotSet,
    /// Static layout is inconsistent
    InvalidLayout,

    // =========================================================================
    // Region / Hardware Errors (0x02xx)
    // =========================================================================
    /// Region descriptor failed validation
    InvalidRegion,
    /// Region boundaries violate the alignment granularity
    RegionMisaligned,
    /// Region table is locked against writes
    RegionTableLocked,
    /// Region index is already installed
    RegionInUse,
    /// Hardware access failed
    HardwareFault,

    // =========================================================================
    // Pool Errors (0x03xx)
    // =========================================================================
    /// Pool capacity or buffer size does not match its layout formula
    PoolMisconfigured,
    /// Pool has no free chunk
    PoolExhausted,
    /// Chunk reference does not lie on a pool chunk boundary
    InvalidChunk,
    /// Chunk released while not allocated
    DoubleFree,

    // =========================================================================
    // IPC Errors (0x04xx)
    // =========================================================================
    /// Connection refused (unknown service, unauthorized, version mismatch)
    ConnectionRefused,
    /// Connection temporarily unavailable
    ConnectionBusy,
    /// Caller passed arguments a correct client never produces
    ProgrammerError,

    // =========================================================================
    // Service API Errors (0x05xx)
    // =========================================================================
    /// Signal is not owned by the running partition
    InvalidSignal,
    /// No message is queued for the signal
    NoMessage,
    /// Message handle does not resolve to a message of the running partition
    InvalidMessageHandle,
    /// Vector index out of range for the message
    InvalidVectorIndex,
    /// Write exceeds the client output buffer
    WriteOverflow,
    /// Reply status is not permitted for the message type
    InvalidReplyStatus,
    /// Message was not retrieved before use
    MessageNotReceived,
    /// Partition identifier is unknown
    InvalidPartition,

    // =========================================================================
    // Configuration Errors (0x06xx)
    // =========================================================================
    /// Configuration value out of range
    InvalidConfig,
    /// Two services share a SID or a signal
    DuplicateService,
    /// Static table exceeds its compile-time bound
    RegistryFull,
    /// Service version does not fit its handle encoding
    InvalidVersion,

    // =========================================================================
    // General Errors (0xFFxx)
    // =========================================================================
    /// Invalid parameter provided
    InvalidParameter,
    /// Operation not valid in current state
    InvalidState,
    /// Feature not supported by this build
    NotSupported,
    /// Internal bookkeeping inconsistency
    Internal,
}

impl Error {
    /// Get the error code for this error
    ///
    /// Error codes are organized by category:
    /// - 0x01xx: Isolation errors
    /// - 0x02xx: Region and hardware errors
    /// - 0x03xx: Pool errors
    /// - 0x04xx: IPC errors
    /// - 0x05xx: Service API errors
    /// - 0x06xx: Configuration errors
    /// - 0xFFxx: General errors
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::BoundaryNotReady => 0x0101,
            Self::BoundaryAlreadySet => 0x0102,
            Self::FlowControlViolation => 0x0103,
            Self::RegionMismatch => 0x0104,
            Self::UnexpectedRegion => 0x0105,
            Self::UnitNotEnabled => 0x0106,
            Self::LockNotSet => 0x0107,
            Self::InvalidLayout => 0x0108,

            Self::InvalidRegion => 0x0201,
            Self::RegionMisaligned => 0x0202,
            Self::RegionTableLocked => 0x0203,
            Self::RegionInUse => 0x0204,
            Self::HardwareFault => 0x0205,

            Self::PoolMisconfigured => 0x0301,
            Self::PoolExhausted => 0x0302,
            Self::InvalidChunk => 0x0303,
            Self::DoubleFree => 0x0304,

            Self::ConnectionRefused => 0x0401,
            Self::ConnectionBusy => 0x0402,
            Self::ProgrammerError => 0x0403,

            Self::InvalidSignal => 0x0501,
            Self::NoMessage => 0x0502,
            Self::InvalidMessageHandle => 0x0503,
            Self::InvalidVectorIndex => 0x0504,
            Self::WriteOverflow => 0x0505,
            Self::InvalidReplyStatus => 0x0506,
            Self::MessageNotReceived => 0x0507,
            Self::InvalidPartition => 0x0508,

            Self::InvalidConfig => 0x0601,
            Self::DuplicateService => 0x0602,
            Self::RegistryFull => 0x0603,
            Self::InvalidVersion => 0x0604,

            Self::InvalidParameter => 0xFF01,
            Self::InvalidState => 0xFF02,
            Self::NotSupported => 0xFF03,
            Self::Internal => 0xFF04,
        }
    }

    /// Check if this error can only be answered by a system reset
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BoundaryNotReady
                | Self::FlowControlViolation
                | Self::RegionMismatch
                | Self::UnexpectedRegion
                | Self::UnitNotEnabled
                | Self::LockNotSet
                | Self::InvalidLayout
                | Self::PoolMisconfigured
                | Self::Internal
        )
    }

    /// Check if this error was raised by a misbehaving service partition
    #[must_use]
    pub const fn is_service_fault(&self) -> bool {
        (self.code() >> 8) == 0x05
    }

    /// Map the error onto the PSA status returned across the client boundary
    ///
    /// Only refusal and busy are operational outcomes; every other
    /// caller-visible error is reported as a programmer error.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::ConnectionRefused => Status::CONNECTION_REFUSED,
            Self::ConnectionBusy | Self::PoolExhausted => Status::CONNECTION_BUSY,
            _ => Status::PROGRAMMER_ERROR,
        }
    }

    /// Get a short description of the error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::BoundaryNotReady => "isolation boundary not set up",
            Self::BoundaryAlreadySet => "static boundaries already installed",
            Self::FlowControlViolation => "flow control violation",
            Self::RegionMismatch => "region verification mismatch",
            Self::UnexpectedRegion => "unexpected region installed",
            Self::UnitNotEnabled => "protection unit not enabled",
            Self::LockNotSet => "configuration lock not set",
            Self::InvalidLayout => "invalid static layout",
            Self::InvalidRegion => "invalid region descriptor",
            Self::RegionMisaligned => "region misaligned",
            Self::RegionTableLocked => "region table locked",
            Self::RegionInUse => "region index already installed",
            Self::HardwareFault => "hardware fault",
            Self::PoolMisconfigured => "pool misconfigured",
            Self::PoolExhausted => "pool exhausted",
            Self::InvalidChunk => "invalid pool chunk",
            Self::DoubleFree => "chunk freed twice",
            Self::ConnectionRefused => "connection refused",
            Self::ConnectionBusy => "connection busy",
            Self::ProgrammerError => "programmer error",
            Self::InvalidSignal => "invalid signal",
            Self::NoMessage => "no message for signal",
            Self::InvalidMessageHandle => "invalid message handle",
            Self::InvalidVectorIndex => "invalid vector index",
            Self::WriteOverflow => "write exceeds output buffer",
            Self::InvalidReplyStatus => "invalid reply status",
            Self::MessageNotReceived => "message not received",
            Self::InvalidPartition => "invalid partition",
            Self::InvalidConfig => "invalid configuration",
            Self::DuplicateService => "duplicate service",
            Self::RegistryFull => "registry full",
            Self::InvalidVersion => "service version out of range",
            Self::InvalidParameter => "invalid parameter",
            Self::InvalidState => "invalid state for operation",
            Self::NotSupported => "not supported",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_grouped_by_category() {
        assert_eq!(Error::FlowControlViolation.code() >> 8, 0x01);
        assert_eq!(Error::RegionInUse.code() >> 8, 0x02);
        assert_eq!(Error::DoubleFree.code() >> 8, 0x03);
        assert_eq!(Error::ProgrammerError.code() >> 8, 0x04);
        assert_eq!(Error::WriteOverflow.code() >> 8, 0x05);
        assert_eq!(Error::DuplicateService.code() >> 8, 0x06);
        assert_eq!(Error::Internal.code() >> 8, 0xFF);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::ConnectionRefused.status(), Status::CONNECTION_REFUSED);
        assert_eq!(Error::ConnectionBusy.status(), Status::CONNECTION_BUSY);
        assert_eq!(Error::PoolExhausted.status(), Status::CONNECTION_BUSY);
        assert_eq!(Error::InvalidChunk.status(), Status::PROGRAMMER_ERROR);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::RegionMismatch.is_fatal());
        assert!(Error::PoolMisconfigured.is_fatal());
        assert!(!Error::ConnectionBusy.is_fatal());
        assert!(Error::NoMessage.is_service_fault());
        assert!(!Error::ProgrammerError.is_service_fault());
    }
}
