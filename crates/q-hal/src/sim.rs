// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Simulated protection unit
//!
//! An in-memory region table that stores the same [`RawRegion`] image a
//! real unit holds. Used on the host and in tests; fault-injection hooks
//! let tests corrupt the stored image or make the lock fail to stick.

use crate::error::{HalError, HalResult};
use crate::region::{RawRegion, RegionDescriptor};
use crate::traits::{HardwareRegionTable, Unit};

/// Faults a test can arm on a [`SimRegionTable`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimFaults {
    /// `lock()` reports success but the lock bit stays clear
    pub lock_ignored: bool,
    /// Writes to this index are accepted and silently discarded
    pub dropped_write: Option<u8>,
    /// `enable()` reports success but enforcement stays off
    pub enable_ignored: bool,
}

/// In-memory region table
#[derive(Debug, Clone)]
pub struct SimRegionTable<const N: usize = 16> {
    unit: Unit,
    slots: [Option<RawRegion>; N],
    enabled: bool,
    locked: bool,
    writes: usize,
    faults: SimFaults,
}

impl<const N: usize> SimRegionTable<N> {
    /// Create an empty, disabled, unlocked table
    #[must_use]
    pub const fn new(unit: Unit) -> Self {
        Self {
            unit,
            slots: [None; N],
            enabled: false,
            locked: false,
            writes: 0,
            faults: SimFaults {
                lock_ignored: false,
                dropped_write: None,
                enable_ignored: false,
            },
        }
    }

    /// Arm faults
    pub fn faults_mut(&mut self) -> &mut SimFaults {
        &mut self.faults
    }

    /// Stored image of a slot
    #[must_use]
    pub fn raw(&self, index: u8) -> Option<RawRegion> {
        self.slots.get(usize::from(index)).copied().flatten()
    }

    /// Mutable stored image, bypassing the lock (models a glitched register)
    pub fn raw_mut(&mut self, index: u8) -> Option<&mut RawRegion> {
        self.slots.get_mut(usize::from(index)).and_then(Option::as_mut)
    }

    /// Place an arbitrary image in a slot, bypassing every check
    pub fn inject(&mut self, raw: RawRegion) {
        if let Some(slot) = self.slots.get_mut(usize::from(raw.index)) {
            *slot = Some(raw);
        }
    }

    /// Copy of the whole table
    #[must_use]
    pub fn snapshot(&self) -> [Option<RawRegion>; N] {
        self.slots
    }

    /// Number of successful region writes since creation
    #[must_use]
    pub const fn write_count(&self) -> usize {
        self.writes
    }

    fn check_unlocked(&self) -> HalResult<()> {
        if self.locked {
            Err(HalError::Locked)
        } else {
            Ok(())
        }
    }

    fn slot_mut(&mut self, index: u8) -> HalResult<&mut Option<RawRegion>> {
        self.slots
            .get_mut(usize::from(index))
            .ok_or(HalError::RegionOutOfRange)
    }
}

impl<const N: usize> HardwareRegionTable for SimRegionTable<N> {
    fn unit(&self) -> Unit {
        self.unit
    }

    #[allow(clippy::cast_possible_truncation)]
    fn capacity(&self) -> u8 {
        N.min(usize::from(u8::MAX)) as u8
    }

    fn disable(&mut self) -> HalResult<()> {
        self.check_unlocked()?;
        self.enabled = false;
        Ok(())
    }

    fn enable(&mut self) -> HalResult<()> {
        self.check_unlocked()?;
        if !self.faults.enable_ignored {
            self.enabled = true;
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_region(&mut self, region: &RegionDescriptor) -> HalResult<()> {
        self.check_unlocked()?;
        let dropped = self.faults.dropped_write == Some(region.index());
        let slot = self.slot_mut(region.index())?;
        if slot.is_some() {
            return Err(HalError::RegionInUse);
        }
        if !dropped {
            *slot = Some(region.encode());
        }
        self.writes += 1;
        Ok(())
    }

    fn get_region(&self, index: u8) -> HalResult<Option<RegionDescriptor>> {
        let slot = self
            .slots
            .get(usize::from(index))
            .ok_or(HalError::RegionOutOfRange)?;
        match slot {
            Some(raw) if raw.is_enabled() => raw.decode().map(Some),
            _ => Ok(None),
        }
    }

    fn clear_region(&mut self, index: u8) -> HalResult<()> {
        self.check_unlocked()?;
        *self.slot_mut(index)? = None;
        Ok(())
    }

    fn lock(&mut self) -> HalResult<()> {
        if !self.faults.lock_ignored {
            self.locked = true;
        }
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionAttributes;

    fn region(index: u8) -> RegionDescriptor {
        RegionDescriptor::new(index, 0x2000_0000, 0x2000_0FFF, RegionAttributes::DATA_RW_ALL).unwrap()
    }

    #[test]
    fn test_set_and_get_region() {
        let mut table: SimRegionTable<4> = SimRegionTable::new(Unit::Mpu);
        table.set_region(&region(2)).unwrap();
        let back = table.get_region(2).unwrap().unwrap();
        assert!(back.same_settings(&region(2)));
        assert_eq!(table.get_region(1).unwrap(), None);
        assert_eq!(table.write_count(), 1);
    }

    #[test]
    fn test_reinstall_requires_clear() {
        let mut table: SimRegionTable<4> = SimRegionTable::new(Unit::Mpu);
        table.set_region(&region(0)).unwrap();
        assert_eq!(table.set_region(&region(0)), Err(HalError::RegionInUse));
        table.clear_region(0).unwrap();
        assert!(table.set_region(&region(0)).is_ok());
    }

    #[test]
    fn test_index_out_of_range() {
        let mut table: SimRegionTable<2> = SimRegionTable::new(Unit::Sau);
        assert_eq!(table.set_region(&region(2)), Err(HalError::RegionOutOfRange));
        assert_eq!(table.get_region(9), Err(HalError::RegionOutOfRange));
    }

    #[test]
    fn test_lock_blocks_mutation() {
        let mut table: SimRegionTable<4> = SimRegionTable::new(Unit::Gtzc);
        table.set_region(&region(0)).unwrap();
        table.enable().unwrap();
        table.lock().unwrap();
        assert!(table.is_locked());
        assert_eq!(table.disable(), Err(HalError::Locked));
        assert_eq!(table.clear_region(0), Err(HalError::Locked));
        assert_eq!(table.set_region(&region(1)), Err(HalError::Locked));
        assert!(table.is_enabled());
    }

    #[test]
    fn test_fault_hooks() {
        let mut table: SimRegionTable<4> = SimRegionTable::new(Unit::Mpu);
        table.faults_mut().lock_ignored = true;
        table.faults_mut().dropped_write = Some(1);
        table.set_region(&region(1)).unwrap();
        assert_eq!(table.get_region(1).unwrap(), None);
        table.lock().unwrap();
        assert!(!table.is_locked());
    }

    #[test]
    fn test_corrupted_image_reported() {
        let mut table: SimRegionTable<4> = SimRegionTable::new(Unit::Mpu);
        table.set_region(&region(0)).unwrap();
        if let Some(raw) = table.raw_mut(0) {
            raw.rsar = 3;
        }
        assert_eq!(table.get_region(0), Err(HalError::InvalidEncoding));
    }
}
