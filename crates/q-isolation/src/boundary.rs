// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Partition Isolation Boundary Manager
//!
//! Owns the three protection units and drives them through the boot and
//! context-switch protocol:
//!
//! ```text
//! Uninitialized --set_up_static_boundaries--> StaticSet
//! StaticSet --update_partition_boundary--> Switching --update...--> Switching
//! ```
//!
//! Static setup runs the configure stage of GTZC and SAU, then their
//! verify stage, then configure and verify of the MPU. Every failure is
//! passed to the [`FatalHandler`] and never returns.
//!
//! At level 3 the running partition gets one MPU region at index
//! `static_count`, rewritten on every switch. That region is only
//! configured, not read back.

use q_common::config::{IsolationConfig, IsolationLevel};
use q_common::log::LogBuffer;
use q_common::{log_debug, log_error, log_info, log_warn, Error, Result};
use q_hal::{
    HardwareRegionTable, MemoryWindow, RegionAttributes, RegionDescriptor, SecurityAttribute,
};

use crate::access::{last_byte, AccessAttr, AccessPolicy};
use crate::configurator::BoundaryConfigurator;
use crate::fatal::{FatalError, FatalHandler, SystemReset};
use crate::flow::Stage;
use crate::layout::{ImageLayout, StaticLayout, UnitPlan};

const MODULE: &str = "isolation";

/// Boundary state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
    /// No boundary installed
    Uninitialized,
    /// Static regions installed and verified
    StaticSet,
    /// A partition region is installed
    Switching,
}

/// The protection units of the platform
#[derive(Debug)]
pub struct BoundaryUnits<G, S, M> {
    /// Block-based SRAM controller
    pub gtzc: G,
    /// Security attribution unit
    pub sau: S,
    /// Secure MPU
    pub mpu: M,
}

/// Partition isolation boundary manager
pub struct IsolationManager<G, S, M, H = SystemReset> {
    config: IsolationConfig,
    image: ImageLayout,
    units: BoundaryUnits<G, S, M>,
    handler: H,
    configurator: BoundaryConfigurator,
    state: BoundaryState,
    layout: Option<StaticLayout>,
    dynamic: Option<RegionDescriptor>,
    log: LogBuffer,
}

impl<G, S, M, H> IsolationManager<G, S, M, H>
where
    G: HardwareRegionTable,
    S: HardwareRegionTable,
    M: HardwareRegionTable,
    H: FatalHandler,
{
    /// Create a manager; nothing is written to hardware yet
    pub fn new(
        config: IsolationConfig,
        image: ImageLayout,
        units: BoundaryUnits<G, S, M>,
        handler: H,
    ) -> Self {
        Self {
            config,
            image,
            units,
            handler,
            configurator: BoundaryConfigurator::new(config.lock_boundaries),
            state: BoundaryState::Uninitialized,
            layout: None,
            dynamic: None,
            log: LogBuffer::new(),
        }
    }

    /// Install and verify the static boundaries of every unit
    ///
    /// Any configuration or verification failure halts the system through
    /// the fatal handler.
    ///
    /// # Errors
    ///
    /// `Error::BoundaryAlreadySet` if the boundaries are already set; the
    /// hardware is left untouched.
    pub fn set_up_static_boundaries(&mut self) -> Result<()> {
        if self.state != BoundaryState::Uninitialized {
            log_warn!(self.log, MODULE, "static boundaries already set");
            return Err(Error::BoundaryAlreadySet);
        }

        let layout = match StaticLayout::for_level(self.config.level, &self.image) {
            Ok(layout) => layout,
            Err(e) => self.fatal(e),
        };
        if let Err(e) = self.install(&layout) {
            self.fatal(e);
        }

        log_info!(
            self.log,
            MODULE,
            "level {} boundaries set: {} mpu regions, flow 0x{:08X}",
            self.config.level as u8,
            layout.static_count(),
            self.configurator.flow().value()
        );
        self.layout = Some(layout);
        self.state = BoundaryState::StaticSet;
        Ok(())
    }

    /// Install the memory window `[start, end)` of the partition about to run
    ///
    /// A no-op below level 3, where partitions share one static boundary.
    /// Calling this before static setup halts the system.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRegion` / `Error::RegionMisaligned` for a bad window
    /// - `Error::InvalidRegion` if the window overlaps a static MPU region
    /// - Any error the MPU reports
    pub fn update_partition_boundary(&mut self, start: u32, end: u32) -> Result<()> {
        let ready = matches!(self.state, BoundaryState::StaticSet | BoundaryState::Switching);
        let Some(static_count) = self
            .layout
            .as_ref()
            .filter(|_| ready)
            .map(StaticLayout::static_count)
        else {
            self.fatal(FatalError::BoundaryNotReady)
        };
        if !self.config.level.has_dynamic_boundary() {
            return Ok(());
        }

        let window = MemoryWindow::new(start, end);
        let region = RegionDescriptor::from_window(static_count, window, RegionAttributes::DATA_RW_ALL)?;
        let overlaps_static = self
            .layout
            .as_ref()
            .and_then(StaticLayout::mpu)
            .is_some_and(|plan| plan.regions().iter().any(|r| r.overlaps(&region)));
        if overlaps_static {
            log_warn!(self.log, MODULE, "partition window 0x{:08X} overlaps static region", start);
            return Err(Error::InvalidRegion);
        }

        if let Err(e) = BoundaryConfigurator::configure_region(&mut self.units.mpu, &region) {
            log_error!(self.log, MODULE, "partition region install failed: {}", e);
            self.dynamic = None;
            return Err(e.into());
        }
        log_debug!(self.log, MODULE, "partition window 0x{:08X}..0x{:08X}", start, end);
        self.dynamic = Some(region);
        self.state = BoundaryState::Switching;
        Ok(())
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> BoundaryState {
        self.state
    }

    /// Isolation level
    #[must_use]
    pub const fn level(&self) -> IsolationLevel {
        self.config.level
    }

    /// Installed static layout
    #[must_use]
    pub const fn layout(&self) -> Option<&StaticLayout> {
        self.layout.as_ref()
    }

    /// Installed partition region
    #[must_use]
    pub const fn partition_region(&self) -> Option<&RegionDescriptor> {
        self.dynamic.as_ref()
    }

    /// Protection units
    #[must_use]
    pub const fn units(&self) -> &BoundaryUnits<G, S, M> {
        &self.units
    }

    /// Event log
    #[must_use]
    pub const fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// Flow-control accumulator value
    #[must_use]
    pub const fn flow_value(&self) -> u32 {
        self.configurator.flow().value()
    }

    fn install(&mut self, layout: &StaticLayout) -> core::result::Result<(), FatalError> {
        // The partition region needs a free MPU slot after the static set.
        if self.config.level.has_dynamic_boundary() && layout.static_count() >= self.units.mpu.capacity() {
            return Err(FatalError::InvalidLayout);
        }

        let cfg = &mut self.configurator;
        for stage in [Stage::Configure, Stage::Verify] {
            cfg.run(&mut self.units.gtzc, layout.gtzc(), stage)?;
            cfg.run(&mut self.units.sau, layout.sau(), stage)?;
            log_debug!(self.log, MODULE, "gtzc/sau stage {} done", stage.name());
        }
        if let Some(plan) = layout.mpu() {
            cfg.apply_and_verify(&mut self.units.mpu, plan)?;
        }
        Ok(())
    }

    fn fatal(&mut self, reason: FatalError) -> ! {
        log_error!(self.log, MODULE, "fatal: {}", reason);
        self.handler.halt(reason)
    }
}

// =============================================================================
// Access Checks
// =============================================================================

fn plan_covers(plan: &UnitPlan, base: u32, last: u32, allowed: impl Fn(&RegionDescriptor) -> bool) -> bool {
    plan.regions().iter().any(|r| r.covers(base, last) && allowed(r))
}

impl<G, S, M, H> AccessPolicy for IsolationManager<G, S, M, H> {
    fn has_access(&self, base: u32, len: u32, attr: AccessAttr) -> bool {
        if len == 0 {
            return true;
        }
        let (Some(last), Some(layout)) = (last_byte(base, len), self.layout.as_ref()) else {
            return false;
        };

        let non_secure = |r: &RegionDescriptor| r.attributes().security == SecurityAttribute::NonSecure;
        if attr.contains(AccessAttr::NON_SECURE) {
            return plan_covers(layout.sau(), base, last, non_secure);
        }

        // Secure caller: the range must not be non-secure memory.
        if layout.sau().regions().iter().any(|r| {
            r.attributes().security != SecurityAttribute::Secure
                && r.base() <= last
                && base <= r.limit()
        }) {
            return false;
        }
        let Some(mpu) = layout.mpu() else {
            return true;
        };

        let permits = |r: &RegionDescriptor| {
            let access = r.attributes().access;
            (!attr.contains(AccessAttr::WRITE) || access.is_writable())
                && (!attr.contains(AccessAttr::UNPRIVILEGED) || access.allows_unprivileged())
        };
        plan_covers(mpu, base, last, permits)
            || self
                .dynamic
                .as_ref()
                .is_some_and(|r| r.covers(base, last) && permits(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use q_hal::sim::SimRegionTable;
    use q_hal::Unit;

    struct PanicHandler;

    impl FatalHandler for PanicHandler {
        fn halt(&self, reason: FatalError) -> ! {
            panic!("fatal: {reason}")
        }
    }

    type Manager = IsolationManager<SimRegionTable<8>, SimRegionTable<8>, SimRegionTable<8>, PanicHandler>;

    fn manager(level: IsolationLevel) -> Manager {
        let units = BoundaryUnits {
            gtzc: SimRegionTable::new(Unit::Gtzc),
            sau: SimRegionTable::new(Unit::Sau),
            mpu: SimRegionTable::new(Unit::Mpu),
        };
        let config = IsolationConfig {
            level,
            lock_boundaries: true,
        };
        IsolationManager::new(config, ImageLayout::default(), units, PanicHandler)
    }

    #[test]
    fn test_setup_installs_every_unit() {
        let mut m = manager(IsolationLevel::Level2);
        m.set_up_static_boundaries().unwrap();
        assert_eq!(m.state(), BoundaryState::StaticSet);
        assert!(m.units().gtzc.is_locked());
        assert!(m.units().sau.is_locked());
        assert!(m.units().mpu.is_locked());
        assert!(m.log().contains(MODULE, "boundaries set"));
    }

    #[test]
    fn test_second_setup_rejected() {
        let mut m = manager(IsolationLevel::Level2);
        m.set_up_static_boundaries().unwrap();
        let before = m.units().mpu.snapshot();
        assert_eq!(m.set_up_static_boundaries(), Err(Error::BoundaryAlreadySet));
        assert_eq!(m.units().mpu.snapshot(), before);
    }

    #[test]
    #[should_panic(expected = "boundary not ready")]
    fn test_update_before_setup_is_fatal() {
        let mut m = manager(IsolationLevel::Level3);
        let _ = m.update_partition_boundary(0x3001_0000, 0x3001_4000);
    }

    #[test]
    fn test_level3_partition_region_follows_static_set() {
        let mut m = manager(IsolationLevel::Level3);
        m.set_up_static_boundaries().unwrap();
        m.update_partition_boundary(0x3001_0000, 0x3001_4000).unwrap();
        let region = m.units().mpu.get_region(3).unwrap().unwrap();
        assert_eq!(region.base(), 0x3001_0000);
        assert_eq!(region.limit(), 0x3001_3FFF);
        assert_eq!(region.attributes(), RegionAttributes::DATA_RW_ALL);
        assert_eq!(m.state(), BoundaryState::Switching);

        m.update_partition_boundary(0x3001_4000, 0x3001_8000).unwrap();
        let region = m.units().mpu.get_region(3).unwrap().unwrap();
        assert_eq!(region.base(), 0x3001_4000);
        assert_eq!(m.units().mpu.get_region(4).unwrap(), None);
    }

    #[test]
    fn test_level2_update_is_noop() {
        let mut m = manager(IsolationLevel::Level2);
        m.set_up_static_boundaries().unwrap();
        let before = m.units().mpu.snapshot();
        m.update_partition_boundary(0x3001_0000, 0x3001_4000).unwrap();
        assert_eq!(m.units().mpu.snapshot(), before);
        assert!(m.partition_region().is_none());
    }

    #[test]
    fn test_bad_partition_window_rejected() {
        let mut m = manager(IsolationLevel::Level3);
        m.set_up_static_boundaries().unwrap();
        assert_eq!(
            m.update_partition_boundary(0x3001_0010, 0x3001_4000),
            Err(Error::RegionMisaligned)
        );
        // Privileged data of the partition manager.
        assert_eq!(
            m.update_partition_boundary(0x3000_0000, 0x3000_1000),
            Err(Error::InvalidRegion)
        );
    }

    #[test]
    fn test_access_policy_level2() {
        let mut m = manager(IsolationLevel::Level2);
        assert!(!m.has_access(0x3000_8000, 16, AccessAttr::READ));
        m.set_up_static_boundaries().unwrap();

        let unpriv_rw = AccessAttr::READ_WRITE | AccessAttr::UNPRIVILEGED;
        assert!(m.has_access(0x3000_8000, 16, unpriv_rw));
        assert!(!m.has_access(0x3000_0000, 16, unpriv_rw));
        assert!(m.has_access(0x3000_0000, 16, AccessAttr::READ_WRITE));
        assert!(!m.has_access(0x0C00_0000, 16, AccessAttr::READ_WRITE));
        assert!(m.has_access(0x0C00_0000, 16, AccessAttr::READ | AccessAttr::UNPRIVILEGED));

        let ns = AccessAttr::READ_WRITE | AccessAttr::NON_SECURE;
        assert!(m.has_access(0x2002_0000, 64, ns));
        assert!(!m.has_access(0x3000_8000, 64, ns));
        assert!(!m.has_access(0x2002_0000, 64, AccessAttr::READ));
        assert!(!m.has_access(0xFFFF_FFF0, 0x20, AccessAttr::READ));
        assert!(m.has_access(0xFFFF_FFF0, 0, AccessAttr::READ));
    }

    #[test]
    fn test_access_policy_level3_partition_window() {
        let mut m = manager(IsolationLevel::Level3);
        m.set_up_static_boundaries().unwrap();
        let unpriv_rw = AccessAttr::READ_WRITE | AccessAttr::UNPRIVILEGED;
        assert!(!m.has_access(0x3001_0000, 16, unpriv_rw));
        m.update_partition_boundary(0x3001_0000, 0x3001_4000).unwrap();
        assert!(m.has_access(0x3001_0000, 16, unpriv_rw));
        assert!(!m.has_access(0x3001_3FF0, 32, unpriv_rw));
    }
}
