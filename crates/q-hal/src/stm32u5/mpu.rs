// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Secure MPU region table (ARMv8-M PMSA)
//!
//! RBAR and RLAR hold exactly the `rbar`/`rlar` words of
//! [`RawRegion`](crate::region::RawRegion); the memory attribute class is
//! an index into MAIR0, which [`MpuTable::enable`] programs before turning
//! the unit on.
//!
//! | AttrIndx | Class       | MAIR value |
//! |----------|-------------|------------|
//! | 0        | Code        | 0xAA       |
//! | 1        | Data        | 0xFF       |
//! | 2        | DataNoCache | 0x44       |
//! | 3        | Device      | 0x04       |

use super::addresses::MPU_BASE;
use super::cslckr;
use super::registers::{barrier, read_reg, set_bits, write_reg};
use crate::error::{HalError, HalResult};
use crate::region::{RawRegion, RegionDescriptor, SecurityAttribute};
use crate::traits::{HardwareRegionTable, Unit};

// =============================================================================
// MPU Register Offsets (ARMv8-M)
// =============================================================================

/// MPU Type Register
const MPU_TYPE: u32 = MPU_BASE;
/// MPU Control Register
const MPU_CTRL: u32 = MPU_BASE + 0x04;
/// MPU Region Number Register
const MPU_RNR: u32 = MPU_BASE + 0x08;
/// MPU Region Base Address Register
const MPU_RBAR: u32 = MPU_BASE + 0x0C;
/// MPU Region Limit Address Register
const MPU_RLAR: u32 = MPU_BASE + 0x10;
/// MPU Memory Attribute Indirection Register 0
const MPU_MAIR0: u32 = MPU_BASE + 0x30;

const MPU_CTRL_ENABLE: u32 = 1 << 0;
/// Keep the MPU active in HardFault and NMI handlers
const MPU_CTRL_HFNMIENA: u32 = 1 << 1;

const MAIR0_VALUE: u32 = 0x04_44_FF_AA;

/// Secure MPU region table
pub struct MpuTable {
    _private: (),
}

impl MpuTable {
    /// Take the secure MPU
    ///
    /// # Safety
    /// Only one instance may exist; the caller must run in secure
    /// privileged state.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn select(index: u8) {
        // SAFETY: MPU_RNR is a valid MMIO register; callers bound `index`
        // by capacity() first.
        unsafe { write_reg(MPU_RNR, u32::from(index)) };
    }

    fn check_index(&self, index: u8) -> HalResult<()> {
        if index >= self.capacity() {
            return Err(HalError::RegionOutOfRange);
        }
        Ok(())
    }

    fn check_unlocked(&self) -> HalResult<()> {
        if self.is_locked() {
            Err(HalError::Locked)
        } else {
            Ok(())
        }
    }
}

impl HardwareRegionTable for MpuTable {
    fn unit(&self) -> Unit {
        Unit::Mpu
    }

    #[allow(clippy::cast_possible_truncation)]
    fn capacity(&self) -> u8 {
        // SAFETY: MPU_TYPE is a read-only MMIO register; DREGION is 15:8.
        unsafe { ((read_reg(MPU_TYPE) >> 8) & 0xFF) as u8 }
    }

    fn disable(&mut self) -> HalResult<()> {
        self.check_unlocked()?;
        barrier();
        // SAFETY: MPU_CTRL is a valid MMIO register; writing 0 disables the
        // MPU and every background-map option.
        unsafe { write_reg(MPU_CTRL, 0) };
        barrier();
        Ok(())
    }

    fn enable(&mut self) -> HalResult<()> {
        self.check_unlocked()?;
        // SAFETY: MAIR0 and MPU_CTRL are valid MMIO registers. PRIVDEFENA
        // stays clear so privileged code has no background map.
        unsafe {
            write_reg(MPU_MAIR0, MAIR0_VALUE);
            write_reg(MPU_CTRL, MPU_CTRL_ENABLE | MPU_CTRL_HFNMIENA);
        }
        barrier();
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        // SAFETY: MPU_CTRL read has no side effects.
        unsafe { (read_reg(MPU_CTRL) & MPU_CTRL_ENABLE) != 0 }
    }

    fn set_region(&mut self, region: &RegionDescriptor) -> HalResult<()> {
        self.check_index(region.index())?;
        self.check_unlocked()?;
        if region.attributes().security != SecurityAttribute::Secure {
            return Err(HalError::InvalidParameter);
        }
        let raw = region.encode();
        Self::select(region.index());
        // SAFETY: region selected above; RBAR/RLAR are valid MMIO registers.
        unsafe {
            if (read_reg(MPU_RLAR) & RawRegion::RLAR_ENABLE) != 0 {
                return Err(HalError::RegionInUse);
            }
            write_reg(MPU_RBAR, raw.rbar);
            write_reg(MPU_RLAR, raw.rlar);
        }
        Ok(())
    }

    fn get_region(&self, index: u8) -> HalResult<Option<RegionDescriptor>> {
        self.check_index(index)?;
        Self::select(index);
        // SAFETY: region selected above; reads have no side effects.
        let (rbar, rlar) = unsafe { (read_reg(MPU_RBAR), read_reg(MPU_RLAR)) };
        let raw = RawRegion {
            index,
            rbar,
            rlar,
            rsar: SecurityAttribute::Secure as u32,
        };
        if !raw.is_enabled() {
            return Ok(None);
        }
        raw.decode().map(Some)
    }

    fn clear_region(&mut self, index: u8) -> HalResult<()> {
        self.check_index(index)?;
        self.check_unlocked()?;
        Self::select(index);
        // SAFETY: region selected above; zeroing RLAR clears EN.
        unsafe {
            write_reg(MPU_RLAR, 0);
            write_reg(MPU_RBAR, 0);
        }
        barrier();
        Ok(())
    }

    fn lock(&mut self) -> HalResult<()> {
        // SAFETY: CSLCKR is a valid MMIO register; LOCKSMPU is set-only.
        unsafe { set_bits(cslckr::ADDR, cslckr::LOCKSMPU) };
        barrier();
        Ok(())
    }

    fn is_locked(&self) -> bool {
        // SAFETY: CSLCKR read has no side effects.
        unsafe { (read_reg(cslckr::ADDR) & cslckr::LOCKSMPU) != 0 }
    }
}
