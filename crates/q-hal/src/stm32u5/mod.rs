// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! STM32U5 protection units
//!
//! Register-backed [`HardwareRegionTable`](crate::HardwareRegionTable)
//! drivers for the three units the isolation core programs at boot:
//!
//! - **GTZC MPCBB**: block-based SRAM security and privilege
//! - **SAU**: security attribution of the address map
//! - **MPU**: secure MPU (ARMv8-M PMSA)
//!
//! The SAU and secure MPU are locked through `SYSCFG_CSLCKR`; the MPCBB
//! carries its own global lock.
//!
//! # Memory Map (STM32U575/585)
//!
//! - Flash: 0x0800_0000 - 0x081F_FFFF (2MB, non-secure alias)
//! - SRAM1: 0x2000_0000 - 0x2002_FFFF (192KB, non-secure alias)
//! - SRAM2: 0x2003_0000 - 0x2003_FFFF (64KB, non-secure alias)

pub mod sau;
pub mod gtzc;
pub mod mpu;

pub use gtzc::MpcbbTable;
pub use mpu::MpuTable;
pub use sau::SauTable;

/// Memory-mapped register access utilities
pub(crate) mod registers {
    use core::ptr::{read_volatile, write_volatile};

    /// Read a 32-bit register
    ///
    /// # Safety
    /// The address must be a valid memory-mapped register.
    #[inline]
    pub unsafe fn read_reg(addr: u32) -> u32 {
        read_volatile(addr as *const u32)
    }

    /// Write a 32-bit register
    ///
    /// # Safety
    /// The address must be a valid memory-mapped register.
    #[inline]
    pub unsafe fn write_reg(addr: u32, value: u32) {
        write_volatile(addr as *mut u32, value);
    }

    /// Set bits in a 32-bit register (read-modify-write)
    ///
    /// # Safety
    /// The address must be a valid memory-mapped register.
    #[inline]
    pub unsafe fn set_bits(addr: u32, bits: u32) {
        let value = read_reg(addr);
        write_reg(addr, value | bits);
    }

    /// Data and instruction synchronization barrier
    #[inline]
    pub fn barrier() {
        // SAFETY: DSB/ISB only order memory accesses and flush the pipeline;
        // they touch no memory and no stack.
        unsafe {
            core::arch::asm!("dsb sy", "isb", options(nomem, nostack));
        }
    }
}

/// STM32U5 base addresses
pub mod addresses {
    /// SAU (system control space)
    pub const SAU_BASE: u32 = 0xE000_EDD0;
    /// Secure MPU (system control space)
    pub const MPU_BASE: u32 = 0xE000_ED90;
    /// GTZC1 MPCBB1 (SRAM1), secure alias
    pub const GTZC_MPCBB1_BASE: u32 = 0x5003_2C00;
    /// GTZC1 MPCBB2 (SRAM2), secure alias
    pub const GTZC_MPCBB2_BASE: u32 = 0x5003_3000;
    /// SYSCFG, secure alias
    pub const SYSCFG_BASE: u32 = 0x5600_0400;
    /// SRAM1 base, non-secure alias
    pub const SRAM1_BASE_NS: u32 = 0x2000_0000;
    /// SRAM1 size
    pub const SRAM1_SIZE: u32 = 0x0003_0000;
    /// SRAM2 base, non-secure alias
    pub const SRAM2_BASE_NS: u32 = 0x2003_0000;
    /// SRAM2 size
    pub const SRAM2_SIZE: u32 = 0x0001_0000;
    /// Offset between secure and non-secure aliases
    pub const SECURE_ALIAS_OFFSET: u32 = 0x1000_0000;
}

/// SYSCFG CPU secure lock register
pub(crate) mod cslckr {
    use super::addresses::SYSCFG_BASE;

    /// CSLCKR address
    pub const ADDR: u32 = SYSCFG_BASE + 0x10;
    /// Lock secure MPU registers
    pub const LOCKSMPU: u32 = 1 << 1;
    /// Lock SAU registers
    pub const LOCKSAU: u32 = 1 << 2;
}
