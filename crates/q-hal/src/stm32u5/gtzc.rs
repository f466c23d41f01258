// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! GTZC block-based memory protection controller (MPCBB)
//!
//! An MPCBB assigns a security bit and a privilege bit to every 512-byte
//! block of one SRAM. It has no region slots, so the table keeps a shadow
//! of the installed descriptors and programs the block bits they cover.
//! Read-back re-derives the attributes from the block registers, so a
//! block flipped after configuration is reported as a mismatch.
//!
//! Block security cannot be gated off: `disable`/`enable` only track
//! configuration state.

use super::registers::{barrier, read_reg, set_bits, write_reg};
use crate::error::{HalError, HalResult};
use crate::region::{RegionAttributes, RegionDescriptor, SecurityAttribute};
use crate::traits::{HardwareRegionTable, Unit};

// =============================================================================
// MPCBB Register Offsets (per controller)
// =============================================================================

/// MPCBB Control Register
const MPCBB_CR: u32 = 0x00;
/// MPCBB Super-block Lock Register 1
const MPCBB_SECCFG_LCKVTR1: u32 = 0x10;
/// Security configuration vector (one bit per block)
const MPCBB_SECCFGR_BASE: u32 = 0x100;
/// Privilege configuration vector (one bit per block)
const MPCBB_PRIVCFGR_BASE: u32 = 0x200;

/// Global lock of the controller configuration
const MPCBB_CR_GLOCK: u32 = 1 << 0;

/// Block size in bytes
pub const MPCBB_BLOCK_SIZE: u32 = 512;

/// Maximum descriptors tracked per controller
pub const MAX_MPCBB_REGIONS: usize = 8;

/// One MPCBB controller and the SRAM it guards
pub struct MpcbbTable {
    base: u32,
    sram_base_ns: u32,
    sram_size: u32,
    shadow: [Option<RegionDescriptor>; MAX_MPCBB_REGIONS],
    configuring: bool,
}

impl MpcbbTable {
    /// Take an MPCBB controller
    ///
    /// `sram_base_ns` is the non-secure alias of the guarded SRAM.
    ///
    /// # Safety
    /// `base` must be the secure alias of an MPCBB register block and only
    /// one instance may exist per controller.
    #[must_use]
    pub const unsafe fn new(base: u32, sram_base_ns: u32, sram_size: u32) -> Self {
        Self {
            base,
            sram_base_ns,
            sram_size,
            shadow: [None; MAX_MPCBB_REGIONS],
            configuring: false,
        }
    }

    /// Block range `[first, last]` covered by a descriptor
    fn blocks(&self, region: &RegionDescriptor) -> HalResult<(u32, u32)> {
        let offset = |addr: u32| (addr & 0x0FFF_FFFF).wrapping_sub(self.sram_base_ns & 0x0FFF_FFFF);
        let first = offset(region.base());
        let last = offset(region.limit());
        if first >= self.sram_size || last >= self.sram_size || first % MPCBB_BLOCK_SIZE != 0 {
            return Err(HalError::InvalidParameter);
        }
        Ok((first / MPCBB_BLOCK_SIZE, last / MPCBB_BLOCK_SIZE))
    }

    fn block_bits(&self, vector: u32, block: u32) -> bool {
        let reg = self.base + vector + 4 * (block / 32);
        // SAFETY: `block` is bounded by the SRAM size checked in blocks(),
        // so the vector register lies inside the controller.
        unsafe { (read_reg(reg) >> (block % 32)) & 1 != 0 }
    }

    fn write_block(&mut self, vector: u32, block: u32, value: bool) {
        let reg = self.base + vector + 4 * (block / 32);
        let bit = 1 << (block % 32);
        // SAFETY: as in block_bits(); read-modify-write keeps other blocks.
        unsafe {
            let current = read_reg(reg);
            write_reg(reg, if value { current | bit } else { current & !bit });
        }
    }

    fn shadow_slot(&self, index: u8) -> HalResult<&Option<RegionDescriptor>> {
        self.shadow
            .get(usize::from(index))
            .ok_or(HalError::RegionOutOfRange)
    }
}

impl HardwareRegionTable for MpcbbTable {
    fn unit(&self) -> Unit {
        Unit::Gtzc
    }

    #[allow(clippy::cast_possible_truncation)]
    fn capacity(&self) -> u8 {
        MAX_MPCBB_REGIONS as u8
    }

    fn disable(&mut self) -> HalResult<()> {
        if self.is_locked() {
            return Err(HalError::Locked);
        }
        self.configuring = true;
        Ok(())
    }

    fn enable(&mut self) -> HalResult<()> {
        if self.is_locked() {
            return Err(HalError::Locked);
        }
        self.configuring = false;
        barrier();
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        !self.configuring
    }

    fn set_region(&mut self, region: &RegionDescriptor) -> HalResult<()> {
        if self.is_locked() {
            return Err(HalError::Locked);
        }
        if self.shadow_slot(region.index())?.is_some() {
            return Err(HalError::RegionInUse);
        }
        let attrs = region.attributes();
        let privileged = !attrs.access.allows_unprivileged();
        if attrs != RegionAttributes::block(attrs.security, privileged)
            || attrs.security == SecurityAttribute::NonSecureCallable
        {
            return Err(HalError::InvalidParameter);
        }
        let (first, last) = self.blocks(region)?;
        let secure = attrs.security == SecurityAttribute::Secure;
        for block in first..=last {
            self.write_block(MPCBB_SECCFGR_BASE, block, secure);
            self.write_block(MPCBB_PRIVCFGR_BASE, block, privileged);
        }
        self.shadow[usize::from(region.index())] = Some(*region);
        Ok(())
    }

    fn get_region(&self, index: u8) -> HalResult<Option<RegionDescriptor>> {
        let Some(region) = *self.shadow_slot(index)? else {
            return Ok(None);
        };
        let (first, last) = self.blocks(&region)?;
        let secure = self.block_bits(MPCBB_SECCFGR_BASE, first);
        let privileged = self.block_bits(MPCBB_PRIVCFGR_BASE, first);
        let uniform = (first..=last).all(|b| {
            self.block_bits(MPCBB_SECCFGR_BASE, b) == secure
                && self.block_bits(MPCBB_PRIVCFGR_BASE, b) == privileged
        });
        if !uniform {
            return Err(HalError::HardwareFault);
        }
        let security = if secure {
            SecurityAttribute::Secure
        } else {
            SecurityAttribute::NonSecure
        };
        RegionDescriptor::new(
            index,
            region.base(),
            region.limit(),
            RegionAttributes::block(security, privileged),
        )
        .map(Some)
    }

    fn clear_region(&mut self, index: u8) -> HalResult<()> {
        if self.is_locked() {
            return Err(HalError::Locked);
        }
        if let Some(region) = *self.shadow_slot(index)? {
            let (first, last) = self.blocks(&region)?;
            for block in first..=last {
                self.write_block(MPCBB_SECCFGR_BASE, block, true);
                self.write_block(MPCBB_PRIVCFGR_BASE, block, false);
            }
        }
        self.shadow[usize::from(index)] = None;
        Ok(())
    }

    fn lock(&mut self) -> HalResult<()> {
        // SAFETY: CR and LCKVTR1 are valid registers of this controller;
        // both lock bits are set-only until reset.
        unsafe {
            write_reg(self.base + MPCBB_SECCFG_LCKVTR1, u32::MAX);
            set_bits(self.base + MPCBB_CR, MPCBB_CR_GLOCK);
        }
        barrier();
        Ok(())
    }

    fn is_locked(&self) -> bool {
        // SAFETY: CR read has no side effects.
        unsafe { (read_reg(self.base + MPCBB_CR) & MPCBB_CR_GLOCK) != 0 }
    }
}
