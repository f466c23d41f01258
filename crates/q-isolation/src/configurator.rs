// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Boundary Configurator
//!
//! Installs a [`UnitPlan`] on a protection unit in two stages:
//!
//! 1. **Configure**: gate the unit off, clear it, write every region, gate
//!    it back on. Each write is followed by its `enable` flow step.
//! 2. **Verify**: read every region back and compare it with its
//!    descriptor, check that no other slot is populated and that the unit
//!    is enabled. Each match is followed by its `check` flow step. The
//!    unit is then locked and the lock is read back.
//!
//! Every failure is a [`FatalError`].

use q_hal::{HalError, HardwareRegionTable, RegionDescriptor};

use crate::fatal::{hw, FatalError};
use crate::flow::{FlowControl, Stage};
use crate::layout::UnitPlan;

/// Two-stage region installer
#[derive(Debug, Clone)]
pub struct BoundaryConfigurator {
    flow: FlowControl,
    lock_boundaries: bool,
}

impl BoundaryConfigurator {
    /// Create a configurator
    ///
    /// With `lock_boundaries` cleared the lock is neither set nor checked;
    /// the lock flow steps are still taken.
    #[must_use]
    pub const fn new(lock_boundaries: bool) -> Self {
        Self {
            flow: FlowControl::new(),
            lock_boundaries,
        }
    }

    /// Flow-control accumulator
    #[must_use]
    pub const fn flow(&self) -> &FlowControl {
        &self.flow
    }

    /// Run one stage of `plan` on `table`
    ///
    /// # Errors
    ///
    /// Any configuration or verification failure.
    pub fn run<T>(&mut self, table: &mut T, plan: &UnitPlan, stage: Stage) -> Result<(), FatalError>
    where
        T: HardwareRegionTable + ?Sized,
    {
        if table.unit() != plan.unit() || plan.region_count() > table.capacity() {
            return Err(FatalError::InvalidLayout);
        }
        match stage {
            Stage::Configure => self.configure(table, plan),
            Stage::Verify => self.verify(table, plan),
        }
    }

    /// Configure then verify `plan` on `table`
    ///
    /// # Errors
    ///
    /// See [`BoundaryConfigurator::run`].
    pub fn apply_and_verify<T>(&mut self, table: &mut T, plan: &UnitPlan) -> Result<(), FatalError>
    where
        T: HardwareRegionTable + ?Sized,
    {
        self.run(table, plan, Stage::Configure)?;
        self.run(table, plan, Stage::Verify)
    }

    /// Replace one region without read-back or flow steps
    ///
    /// Used for the per-partition region, which changes on every switch.
    ///
    /// # Errors
    ///
    /// Whatever the unit reports.
    pub fn configure_region<T>(table: &mut T, region: &RegionDescriptor) -> Result<(), HalError>
    where
        T: HardwareRegionTable + ?Sized,
    {
        table.clear_region(region.index())?;
        table.set_region(region)
    }

    fn configure<T>(&mut self, table: &mut T, plan: &UnitPlan) -> Result<(), FatalError>
    where
        T: HardwareRegionTable + ?Sized,
    {
        let unit = plan.unit();
        table.disable().map_err(hw(unit))?;
        table.clear_all().map_err(hw(unit))?;

        for region in plan.regions() {
            table.set_region(region).map_err(hw(unit))?;
            self.flow.apply(region.flow().enable)?;
        }

        table.enable().map_err(hw(unit))?;
        self.flow.apply(plan.enable_step())
    }

    fn verify<T>(&mut self, table: &mut T, plan: &UnitPlan) -> Result<(), FatalError>
    where
        T: HardwareRegionTable + ?Sized,
    {
        let unit = plan.unit();

        for region in plan.regions() {
            let index = region.index();
            match table.get_region(index) {
                Ok(Some(back)) if back.same_settings(region) => {}
                Ok(_) | Err(HalError::InvalidEncoding | HalError::HardwareFault) => {
                    return Err(FatalError::RegionMismatch { unit, index });
                }
                Err(error) => return Err(FatalError::Hardware { unit, error }),
            }
            self.flow.apply(region.flow().check)?;
        }

        for index in plan.region_count()..table.capacity() {
            if !matches!(table.get_region(index), Ok(None)) {
                return Err(FatalError::UnexpectedRegion { unit, index });
            }
        }

        if !table.is_enabled() {
            return Err(FatalError::UnitNotEnabled(unit));
        }
        self.flow.apply(plan.check_step())?;

        if let Some(lock) = plan.lock_steps() {
            if self.lock_boundaries {
                table.lock().map_err(hw(unit))?;
            }
            self.flow.apply(lock.lock)?;
            if self.lock_boundaries && !table.is_locked() {
                return Err(FatalError::LockNotSet(unit));
            }
            self.flow.apply(lock.check)?;
        }
        Ok(())
    }
}

impl Default for BoundaryConfigurator {
    fn default() -> Self {
        Self::new(true)
    }
}
