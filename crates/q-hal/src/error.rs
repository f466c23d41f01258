// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL error types

use core::fmt;

/// HAL error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HalError {
    /// Region base is not below its limit
    InvalidRange,
    /// Region boundaries violate the alignment granularity
    Misaligned,
    /// Raw attribute value outside its closed set
    InvalidEncoding,
    /// Region index beyond the unit's capacity
    RegionOutOfRange,
    /// Region index already installed
    RegionInUse,
    /// Unit is locked against configuration changes
    Locked,
    /// Unit rejected the operation
    HardwareFault,
    /// Invalid parameter
    InvalidParameter,
    /// Not supported on this platform
    NotSupported,
}

impl HalError {
    /// Get error code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidRange => 0x0801,
            Self::Misaligned => 0x0802,
            Self::InvalidEncoding => 0x0803,
            Self::RegionOutOfRange => 0x0804,
            Self::RegionInUse => 0x0805,
            Self::Locked => 0x0806,
            Self::HardwareFault => 0x08D0,
            Self::InvalidParameter => 0x08F0,
            Self::NotSupported => 0x08FF,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidRange => "region base not below limit",
            Self::Misaligned => "region misaligned",
            Self::InvalidEncoding => "attribute value out of range",
            Self::RegionOutOfRange => "region index out of range",
            Self::RegionInUse => "region index already installed",
            Self::Locked => "protection unit locked",
            Self::HardwareFault => "hardware fault detected",
            Self::InvalidParameter => "invalid parameter",
            Self::NotSupported => "not supported",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

impl From<HalError> for q_common::Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::InvalidRange | HalError::InvalidEncoding | HalError::RegionOutOfRange => {
                Self::InvalidRegion
            }
            HalError::Misaligned => Self::RegionMisaligned,
            HalError::RegionInUse => Self::RegionInUse,
            HalError::Locked => Self::RegionTableLocked,
            HalError::HardwareFault => Self::HardwareFault,
            HalError::InvalidParameter => Self::InvalidParameter,
            HalError::NotSupported => Self::NotSupported,
        }
    }
}

/// HAL Result type
pub type HalResult<T> = Result<T, HalError>;
