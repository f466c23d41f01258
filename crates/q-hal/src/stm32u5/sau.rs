// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Security Attribution Unit (SAU) region table
//!
//! The SAU stores only base, limit and the NSC bit. A region not marked
//! NSC is non-secure; memory outside every region stays secure. Secure
//! descriptors therefore cannot be installed: the layout expresses secure
//! memory by leaving it uncovered.

use super::addresses::SAU_BASE;
use super::cslckr;
use super::registers::{barrier, read_reg, set_bits, write_reg};
use crate::error::{HalError, HalResult};
use crate::region::{RegionAttributes, RegionDescriptor, SecurityAttribute};
use crate::traits::{HardwareRegionTable, Unit};

// =============================================================================
// SAU Register Offsets
// =============================================================================

/// SAU Control Register
const SAU_CTRL: u32 = SAU_BASE;
/// SAU Type Register
const SAU_TYPE: u32 = SAU_BASE + 0x04;
/// SAU Region Number Register
const SAU_RNR: u32 = SAU_BASE + 0x08;
/// SAU Region Base Address Register
const SAU_RBAR: u32 = SAU_BASE + 0x0C;
/// SAU Region Limit Address Register
const SAU_RLAR: u32 = SAU_BASE + 0x10;

const SAU_CTRL_ENABLE: u32 = 1 << 0;
const SAU_RLAR_ENABLE: u32 = 1 << 0;
const SAU_RLAR_NSC: u32 = 1 << 1;
const ADDR_MASK: u32 = 0xFFFF_FFE0;

/// SAU region table
pub struct SauTable {
    _private: (),
}

impl SauTable {
    /// Take the SAU
    ///
    /// # Safety
    /// Only one instance may exist; the caller must run in secure
    /// privileged state.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn select(index: u8) {
        // SAFETY: SAU_RNR is a valid MMIO register; callers bound `index`
        // by capacity() first.
        unsafe { write_reg(SAU_RNR, u32::from(index)) };
    }

    fn check_index(&self, index: u8) -> HalResult<()> {
        if index >= self.capacity() {
            return Err(HalError::RegionOutOfRange);
        }
        Ok(())
    }
}

impl HardwareRegionTable for SauTable {
    fn unit(&self) -> Unit {
        Unit::Sau
    }

    #[allow(clippy::cast_possible_truncation)]
    fn capacity(&self) -> u8 {
        // SAFETY: SAU_TYPE is a read-only MMIO register.
        unsafe { (read_reg(SAU_TYPE) & 0xFF) as u8 }
    }

    fn disable(&mut self) -> HalResult<()> {
        if self.is_locked() {
            return Err(HalError::Locked);
        }
        // SAFETY: SAU_CTRL is a valid MMIO register; clearing ENABLE keeps
        // ALLNS untouched.
        unsafe {
            let ctrl = read_reg(SAU_CTRL);
            write_reg(SAU_CTRL, ctrl & !SAU_CTRL_ENABLE);
        }
        barrier();
        Ok(())
    }

    fn enable(&mut self) -> HalResult<()> {
        if self.is_locked() {
            return Err(HalError::Locked);
        }
        // SAFETY: SAU_CTRL is a valid MMIO register.
        unsafe { set_bits(SAU_CTRL, SAU_CTRL_ENABLE) };
        barrier();
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        // SAFETY: SAU_CTRL is a valid MMIO register; read has no side effects.
        unsafe { (read_reg(SAU_CTRL) & SAU_CTRL_ENABLE) != 0 }
    }

    fn set_region(&mut self, region: &RegionDescriptor) -> HalResult<()> {
        self.check_index(region.index())?;
        if self.is_locked() {
            return Err(HalError::Locked);
        }
        let attrs = region.attributes();
        let nsc = match attrs.security {
            SecurityAttribute::NonSecure => 0,
            SecurityAttribute::NonSecureCallable => SAU_RLAR_NSC,
            SecurityAttribute::Secure => return Err(HalError::InvalidParameter),
        };
        if attrs != RegionAttributes::attribution(attrs.security) {
            return Err(HalError::InvalidParameter);
        }
        Self::select(region.index());
        // SAFETY: region selected above; RBAR/RLAR are valid MMIO registers.
        unsafe {
            if (read_reg(SAU_RLAR) & SAU_RLAR_ENABLE) != 0 {
                return Err(HalError::RegionInUse);
            }
            write_reg(SAU_RBAR, region.base() & ADDR_MASK);
            write_reg(SAU_RLAR, (region.limit() & ADDR_MASK) | nsc | SAU_RLAR_ENABLE);
        }
        Ok(())
    }

    fn get_region(&self, index: u8) -> HalResult<Option<RegionDescriptor>> {
        self.check_index(index)?;
        Self::select(index);
        // SAFETY: region selected above; RBAR/RLAR reads have no side effects.
        let (rbar, rlar) = unsafe { (read_reg(SAU_RBAR), read_reg(SAU_RLAR)) };
        if (rlar & SAU_RLAR_ENABLE) == 0 {
            return Ok(None);
        }
        let security = if (rlar & SAU_RLAR_NSC) != 0 {
            SecurityAttribute::NonSecureCallable
        } else {
            SecurityAttribute::NonSecure
        };
        RegionDescriptor::new(
            index,
            rbar & ADDR_MASK,
            rlar | !ADDR_MASK,
            RegionAttributes::attribution(security),
        )
        .map(Some)
    }

    fn clear_region(&mut self, index: u8) -> HalResult<()> {
        self.check_index(index)?;
        if self.is_locked() {
            return Err(HalError::Locked);
        }
        Self::select(index);
        // SAFETY: region selected above; zeroing RBAR/RLAR disables it.
        unsafe {
            write_reg(SAU_RBAR, 0);
            write_reg(SAU_RLAR, 0);
        }
        Ok(())
    }

    fn lock(&mut self) -> HalResult<()> {
        // SAFETY: CSLCKR is a valid MMIO register; LOCKSAU is set-only.
        unsafe { set_bits(cslckr::ADDR, cslckr::LOCKSAU) };
        barrier();
        Ok(())
    }

    fn is_locked(&self) -> bool {
        // SAFETY: CSLCKR read has no side effects.
        unsafe { (read_reg(cslckr::ADDR) & cslckr::LOCKSAU) != 0 }
    }
}
