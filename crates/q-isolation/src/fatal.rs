// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Fatal error handling
//!
//! Any mismatch found while installing or verifying a boundary means the
//! boundary itself may be compromised. The only response is a full system
//! reset through a [`FatalHandler`]; nothing is retried.
//!
//! [`SystemReset`] is the target handler:
//! - Interrupts masked
//! - A [`FatalRecord`] persisted to the TAMP backup registers (survives reset)
//! - SYSRESETREQ raised through SCB AIRCR

use core::fmt;

use q_hal::{HalError, Unit};

// =============================================================================
// Fatal Errors
// =============================================================================

/// Non-recoverable isolation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    /// Flow-control accumulator diverged
    FlowControl {
        /// Expected cumulative value
        expected: u32,
        /// Accumulator after the step
        actual: u32,
    },
    /// Region read back differs from its descriptor
    RegionMismatch {
        /// Unit holding the region
        unit: Unit,
        /// Region index
        index: u8,
    },
    /// Unit holds a region absent from the layout
    UnexpectedRegion {
        /// Unit holding the region
        unit: Unit,
        /// Region index
        index: u8,
    },
    /// Unit not enabled after configuration
    UnitNotEnabled(Unit),
    /// Lock bit did not stick
    LockNotSet(Unit),
    /// Unit rejected an operation
    Hardware {
        /// Unit that failed
        unit: Unit,
        /// Underlying error
        error: HalError,
    },
    /// Dynamic boundary requested before static setup
    BoundaryNotReady,
    /// Layout does not fit the unit or is inconsistent
    InvalidLayout,
}

impl FatalError {
    /// Unified error code
    #[must_use]
    pub const fn error(&self) -> q_common::Error {
        match self {
            Self::FlowControl { .. } => q_common::Error::FlowControlViolation,
            Self::RegionMismatch { .. } => q_common::Error::RegionMismatch,
            Self::UnexpectedRegion { .. } => q_common::Error::UnexpectedRegion,
            Self::UnitNotEnabled(_) => q_common::Error::UnitNotEnabled,
            Self::LockNotSet(_) => q_common::Error::LockNotSet,
            Self::Hardware { .. } => q_common::Error::HardwareFault,
            Self::BoundaryNotReady => q_common::Error::BoundaryNotReady,
            Self::InvalidLayout => q_common::Error::InvalidLayout,
        }
    }

    /// Unit involved, if any
    #[must_use]
    pub const fn unit(&self) -> Option<Unit> {
        match self {
            Self::RegionMismatch { unit, .. }
            | Self::UnexpectedRegion { unit, .. }
            | Self::UnitNotEnabled(unit)
            | Self::LockNotSet(unit)
            | Self::Hardware { unit, .. } => Some(*unit),
            Self::FlowControl { .. } | Self::BoundaryNotReady | Self::InvalidLayout => None,
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlowControl { expected, actual } => {
                write!(f, "flow control: expected 0x{expected:08X}, got 0x{actual:08X}")
            }
            Self::RegionMismatch { unit, index } => write!(f, "{unit} region {index} mismatch"),
            Self::UnexpectedRegion { unit, index } => write!(f, "{unit} region {index} unexpected"),
            Self::UnitNotEnabled(unit) => write!(f, "{unit} not enabled"),
            Self::LockNotSet(unit) => write!(f, "{unit} lock not set"),
            Self::Hardware { unit, error } => write!(f, "{unit}: {error}"),
            Self::BoundaryNotReady => f.write_str("boundary not ready"),
            Self::InvalidLayout => f.write_str("invalid layout"),
        }
    }
}

impl From<FatalError> for q_common::Error {
    fn from(e: FatalError) -> Self {
        e.error()
    }
}

/// Attach the failing unit to a HAL error
pub(crate) fn hw(unit: Unit) -> impl Fn(HalError) -> FatalError {
    move |error| FatalError::Hardware { unit, error }
}

// =============================================================================
// Fatal Record (persisted across reset)
// =============================================================================

/// Magic value marking a valid record
const FATAL_MAGIC: u32 = 0x150F_A7A1;

/// Post-mortem record of the last fatal error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct FatalRecord {
    /// `FATAL_MAGIC` when valid
    pub magic: u32,
    /// Unified error code
    pub code: u16,
    /// Unit number (0xFF if none)
    pub unit: u8,
    /// Region index (0xFF if none)
    pub index: u8,
    /// Expected flow value (flow-control errors), else 0
    pub expected: u32,
    /// Observed flow value (flow-control errors), else 0
    pub actual: u32,
}

impl FatalRecord {
    /// Build the record for an error
    #[must_use]
    pub const fn capture(err: &FatalError) -> Self {
        let unit = match err.unit() {
            Some(u) => u as u8,
            None => 0xFF,
        };
        let (index, expected, actual) = match *err {
            FatalError::RegionMismatch { index, .. } | FatalError::UnexpectedRegion { index, .. } => {
                (index, 0, 0)
            }
            FatalError::FlowControl { expected, actual } => (0xFF, expected, actual),
            _ => (0xFF, 0, 0),
        };
        Self {
            magic: FATAL_MAGIC,
            code: err.error().code(),
            unit,
            index,
            expected,
            actual,
        }
    }

    /// Check the magic value
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.magic == FATAL_MAGIC
    }

    #[cfg(any(test, all(target_arch = "arm", feature = "stm32u5")))]
    const fn to_words(self) -> [u32; 4] {
        [
            self.magic,
            ((self.code as u32) << 16) | ((self.unit as u32) << 8) | self.index as u32,
            self.expected,
            self.actual,
        ]
    }

    #[cfg(any(test, all(target_arch = "arm", feature = "stm32u5")))]
    #[allow(clippy::cast_possible_truncation)]
    const fn from_words(words: [u32; 4]) -> Self {
        Self {
            magic: words[0],
            code: (words[1] >> 16) as u16,
            unit: (words[1] >> 8) as u8,
            index: words[1] as u8,
            expected: words[2],
            actual: words[3],
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Response to a fatal error
pub trait FatalHandler {
    /// Halt the system; never returns
    fn halt(&self, reason: FatalError) -> !;
}

/// Target handler: persist a record and reset
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemReset;

impl FatalHandler for SystemReset {
    fn halt(&self, reason: FatalError) -> ! {
        disable_interrupts();
        save_record(&FatalRecord::capture(&reason));
        trigger_system_reset()
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "arm", feature = "stm32u5"))] {
        /// TAMP backup register 0, secure alias
        const TAMP_BKP0R: u32 = 0x5600_7D00;
        /// SCB Application Interrupt and Reset Control Register
        const SCB_AIRCR: u32 = 0xE000_ED0C;

        fn disable_interrupts() {
            // SAFETY: CPSID I only sets PRIMASK; always valid in privileged mode.
            unsafe { core::arch::asm!("cpsid i", options(nomem, nostack)) };
        }

        fn save_record(record: &FatalRecord) {
            for (i, word) in record.to_words().iter().enumerate() {
                // SAFETY: TAMP_BKP0R..BKP3R are valid, always-mapped backup
                // registers; volatile writes are required for MMIO.
                unsafe {
                    core::ptr::write_volatile((TAMP_BKP0R + 4 * i as u32) as *mut u32, *word);
                }
            }
        }

        /// Read and clear the record left by a previous fatal error
        pub fn take_previous_record() -> Option<FatalRecord> {
            let mut words = [0u32; 4];
            for (i, word) in words.iter_mut().enumerate() {
                // SAFETY: see save_record().
                *word = unsafe { core::ptr::read_volatile((TAMP_BKP0R + 4 * i as u32) as *const u32) };
            }
            let record = FatalRecord::from_words(words);
            if !record.is_valid() {
                return None;
            }
            // SAFETY: see save_record(); clearing the magic invalidates the record.
            unsafe { core::ptr::write_volatile(TAMP_BKP0R as *mut u32, 0) };
            Some(record)
        }

        fn trigger_system_reset() -> ! {
            // AIRCR key (0x05FA) + SYSRESETREQ (bit 2)
            const AIRCR_RESET: u32 = 0x05FA_0004;
            // SAFETY: DSB completes outstanding transfers; AIRCR at its
            // architectural address with VECTKEY requests a system reset.
            unsafe {
                core::arch::asm!("dsb sy", options(nomem, nostack));
                core::ptr::write_volatile(SCB_AIRCR as *mut u32, AIRCR_RESET);
                core::arch::asm!("dsb sy", options(nomem, nostack));
            }
            loop {
                core::hint::spin_loop();
            }
        }
    } else {
        fn disable_interrupts() {}

        fn save_record(_record: &FatalRecord) {}

        /// Read and clear the record left by a previous fatal error (none on host)
        #[must_use]
        pub fn take_previous_record() -> Option<FatalRecord> {
            None
        }

        fn trigger_system_reset() -> ! {
            loop {
                core::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_capture() {
        let err = FatalError::RegionMismatch {
            unit: Unit::Sau,
            index: 3,
        };
        let record = FatalRecord::capture(&err);
        assert!(record.is_valid());
        assert_eq!(record.code, q_common::Error::RegionMismatch.code());
        assert_eq!(record.unit, Unit::Sau as u8);
        assert_eq!(record.index, 3);
    }

    #[test]
    fn test_record_words_round_trip() {
        let err = FatalError::FlowControl {
            expected: 0x1234_5678,
            actual: 0x8765_4321,
        };
        let record = FatalRecord::capture(&err);
        assert_eq!(FatalRecord::from_words(record.to_words()), record);
        assert_eq!(record.unit, 0xFF);
    }

    #[test]
    fn test_error_mapping() {
        let err = FatalError::Hardware {
            unit: Unit::Mpu,
            error: HalError::Locked,
        };
        assert_eq!(q_common::Error::from(err), q_common::Error::HardwareFault);
        assert_eq!(err.unit(), Some(Unit::Mpu));
        assert!(FatalError::BoundaryNotReady.error().is_fatal());
    }
}
