// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Protection unit abstraction
//!
//! Every unit that enforces memory boundaries (GTZC block controller, SAU,
//! MPU) is driven through [`HardwareRegionTable`]. The isolation core only
//! ever talks to this trait, so the same configure/verify protocol runs
//! against register-backed drivers on target and against
//! [`crate::sim::SimRegionTable`] on the host.

use core::fmt;

use crate::error::HalResult;
use crate::region::RegionDescriptor;

/// Hardware unit identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Unit {
    /// Global TrustZone controller (block-based SRAM security)
    Gtzc = 0,
    /// Security attribution unit
    Sau = 1,
    /// Secure memory protection unit
    Mpu = 2,
}

impl Unit {
    /// Short name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Gtzc => "gtzc",
            Self::Sau => "sau",
            Self::Mpu => "mpu",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Region table of one protection unit
///
/// Region writes are one-way with respect to an index: installing over an
/// index that is already populated fails with `HalError::RegionInUse`
/// until [`HardwareRegionTable::clear_region`] de-configures it. Once
/// [`HardwareRegionTable::lock`] succeeds, every mutating call fails with
/// `HalError::Locked` until reset.
pub trait HardwareRegionTable {
    /// Which unit this table drives
    fn unit(&self) -> Unit;

    /// Number of region slots
    fn capacity(&self) -> u8;

    /// Disable enforcement (gate closed for reconfiguration)
    fn disable(&mut self) -> HalResult<()>;

    /// Enable enforcement
    fn enable(&mut self) -> HalResult<()>;

    /// Check if enforcement is enabled
    fn is_enabled(&self) -> bool;

    /// Install a region at its index
    fn set_region(&mut self, region: &RegionDescriptor) -> HalResult<()>;

    /// Read back a region
    ///
    /// Returns `Ok(None)` for an empty slot. A slot holding an image that
    /// does not decode reports `HalError::InvalidEncoding`.
    fn get_region(&self, index: u8) -> HalResult<Option<RegionDescriptor>>;

    /// De-configure one region
    fn clear_region(&mut self, index: u8) -> HalResult<()>;

    /// Set the one-way configuration lock
    fn lock(&mut self) -> HalResult<()>;

    /// Check the configuration lock
    fn is_locked(&self) -> bool;

    /// De-configure every region
    fn clear_all(&mut self) -> HalResult<()> {
        for index in 0..self.capacity() {
            self.clear_region(index)?;
        }
        Ok(())
    }
}
