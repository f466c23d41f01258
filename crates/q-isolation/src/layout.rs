// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Static boundary layouts
//!
//! Builds the fixed region list of every protection unit from the linker
//! windows of the secure image, and attaches the flow-control constants of
//! each step.
//!
//! # Step Chain
//!
//! Boot runs the units in this order, so the constants below chain in the
//! same order:
//!
//! 1. GTZC configure, SAU configure
//! 2. GTZC verify + lock, SAU verify + lock
//! 3. MPU configure, MPU verify (+ lock below level 3)
//!
//! Adding a region to any list needs a new step constant in both the
//! configure and the verify chain.

use heapless::Vec;
use q_common::config::IsolationLevel;
use q_common::constants::{FLOW_CTRL_INIT_VALUE, MAX_REGIONS_PER_UNIT};
use q_hal::{
    FlowStep, MemoryWindow, RegionAttributes, RegionDescriptor, RegionFlow, SecurityAttribute,
    Unit,
};

use crate::fatal::FatalError;

// =============================================================================
// Flow-Control Constants
// =============================================================================

/// Chain `steps` onto `prev`
const fn chain<const N: usize>(mut prev: FlowStep, steps: [u32; N]) -> [FlowStep; N] {
    let mut out = [FlowStep::NONE; N];
    let mut i = 0;
    while i < N {
        prev = FlowStep::after(prev, steps[i]);
        out[i] = prev;
        i += 1;
    }
    out
}

const fn last<const N: usize>(steps: &[FlowStep; N]) -> FlowStep {
    steps[N - 1]
}

/// Accumulator value before the first step
const START: FlowStep = FlowStep::first(FLOW_CTRL_INIT_VALUE, 0);

/// GTZC region writes
pub const GTZC_EN_R: [FlowStep; 2] = chain(START, [0x0001_3A5C, 0x0001_46E3]);
/// GTZC enable
pub const GTZC_EN: FlowStep = FlowStep::after(last(&GTZC_EN_R), 0x0001_5C19);
/// SAU region writes
pub const SAU_EN_R: [FlowStep; 4] =
    chain(GTZC_EN, [0x0001_6D27, 0x0001_7B92, 0x0001_84E5, 0x0001_9A3F]);
/// SAU enable
pub const SAU_EN: FlowStep = FlowStep::after(last(&SAU_EN_R), 0x0001_A5C8);

/// GTZC region read-backs
pub const GTZC_CH_R: [FlowStep; 2] = chain(SAU_EN, [0x0003_1E7B, 0x0003_2F94]);
/// GTZC enable read-back
pub const GTZC_CH: FlowStep = FlowStep::after(last(&GTZC_CH_R), 0x0003_3D06);
/// GTZC lock
pub const GTZC_LCK: FlowStep = FlowStep::after(GTZC_CH, 0x0053_1B6E);
/// GTZC lock read-back
pub const GTZC_LCK_CH: FlowStep = FlowStep::after(GTZC_LCK, 0x0053_8DA1);
/// SAU region read-backs
pub const SAU_CH_R: [FlowStep; 4] =
    chain(GTZC_LCK_CH, [0x0003_4C59, 0x0003_5B8A, 0x0003_6AE4, 0x0003_7937]);
/// SAU enable read-back
pub const SAU_CH: FlowStep = FlowStep::after(last(&SAU_CH_R), 0x0003_87C2);
/// SAU lock
pub const SAU_LCK: FlowStep = FlowStep::after(SAU_CH, 0x0052_2E5A);
/// SAU lock read-back
pub const SAU_LCK_CH: FlowStep = FlowStep::after(SAU_LCK, 0x0052_97AC);

/// MPU region writes, level 2
pub const MPU2_EN_R: [FlowStep; 6] = chain(
    SAU_LCK_CH,
    [0x0000_6A87, 0x0000_7C99, 0x0000_A3B5, 0x0000_B5AB, 0x0002_F1E5, 0x0002_FE8E],
);
/// MPU enable, level 2
pub const MPU2_EN: FlowStep = FlowStep::after(last(&MPU2_EN_R), 0x0000_E7DC);
/// MPU region read-backs, level 2
pub const MPU2_CH_R: [FlowStep; 6] = chain(
    MPU2_EN,
    [0x0001_D3EE, 0x0001_E4E1, 0x0001_F8FF, 0x0002_35D7, 0x0003_1AFB, 0x0003_67F6],
);
/// MPU enable read-back, level 2
pub const MPU2_CH: FlowStep = FlowStep::after(last(&MPU2_CH_R), 0x0002_4ADA);
/// MPU lock, level 2
pub const MPU2_LCK: FlowStep = FlowStep::after(MPU2_CH, 0x0051_73A3);
/// MPU lock read-back, level 2
pub const MPU2_LCK_CH: FlowStep = FlowStep::after(MPU2_LCK, 0x0051_E6EA);

/// MPU region writes, level 3
pub const MPU3_EN_R: [FlowStep; 3] = chain(SAU_LCK_CH, [0x0000_6C17, 0x0000_7E29, 0x0000_AD45]);
/// MPU enable, level 3
pub const MPU3_EN: FlowStep = FlowStep::after(last(&MPU3_EN_R), 0x0000_E96C);
/// MPU region read-backs, level 3
pub const MPU3_CH_R: [FlowStep; 3] = chain(MPU3_EN, [0x0001_D57E, 0x0001_E671, 0x0001_FA8F]);
/// MPU enable read-back, level 3
pub const MPU3_CH: FlowStep = FlowStep::after(last(&MPU3_CH_R), 0x0002_4C6A);

// =============================================================================
// Unit Plans
// =============================================================================

/// Flow steps around the lock of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSteps {
    /// Step after the lock is set
    pub lock: FlowStep,
    /// Step after the lock is read back
    pub check: FlowStep,
}

/// Everything the configurator installs on one unit
#[derive(Debug, Clone)]
pub struct UnitPlan {
    unit: Unit,
    regions: Vec<RegionDescriptor, MAX_REGIONS_PER_UNIT>,
    enable: FlowStep,
    check: FlowStep,
    lock: Option<LockSteps>,
}

impl UnitPlan {
    /// Empty plan
    ///
    /// `lock` is `None` for a unit that must stay writable after boot.
    #[must_use]
    pub const fn new(unit: Unit, enable: FlowStep, check: FlowStep, lock: Option<LockSteps>) -> Self {
        Self {
            unit,
            regions: Vec::new(),
            enable,
            check,
            lock,
        }
    }

    /// Append a region
    ///
    /// Indices must be contiguous from 0 and regions of one unit must not
    /// overlap.
    ///
    /// # Errors
    ///
    /// `FatalError::InvalidLayout` on a wrong index, an overlap or a full
    /// plan.
    pub fn push(&mut self, region: RegionDescriptor) -> Result<(), FatalError> {
        if usize::from(region.index()) != self.regions.len()
            || self.regions.iter().any(|r| r.overlaps(&region))
        {
            return Err(FatalError::InvalidLayout);
        }
        self.regions.push(region).map_err(|_| FatalError::InvalidLayout)
    }

    /// Target unit
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Regions in index order
    #[must_use]
    pub fn regions(&self) -> &[RegionDescriptor] {
        &self.regions
    }

    /// Number of regions
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn region_count(&self) -> u8 {
        self.regions.len() as u8
    }

    /// Step after the unit is enabled
    #[must_use]
    pub const fn enable_step(&self) -> FlowStep {
        self.enable
    }

    /// Step after the enable bit is read back
    #[must_use]
    pub const fn check_step(&self) -> FlowStep {
        self.check
    }

    /// Lock steps, if the unit is locked
    #[must_use]
    pub const fn lock_steps(&self) -> Option<LockSteps> {
        self.lock
    }

    /// Accumulator value once the plan is configured and verified
    #[must_use]
    pub fn final_step(&self) -> FlowStep {
        match self.lock {
            Some(lock) => lock.check,
            None => self.check,
        }
    }
}

// =============================================================================
// Image Layout
// =============================================================================

/// Linker windows of the secure image and the non-secure world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// Non-secure callable veneers
    pub veneer: MemoryWindow,
    /// Secure read-only code
    pub code: MemoryWindow,
    /// Privileged RW/ZI data of the partition manager
    pub priv_data: MemoryWindow,
    /// RW/ZI data of unprivileged partitions
    pub unpriv_data: MemoryWindow,
    /// Data handed over by the bootloader (read-only)
    pub shared_data: MemoryWindow,
    /// Secure peripherals
    pub peripherals: MemoryWindow,
    /// Secure part of the guarded SRAM
    pub secure_sram: MemoryWindow,
    /// Non-secure code
    pub ns_code: MemoryWindow,
    /// Non-secure data (non-secure part of the guarded SRAM)
    pub ns_data: MemoryWindow,
    /// Non-secure peripherals
    pub ns_peripherals: MemoryWindow,
}

impl ImageLayout {
    /// STM32U585 two-slot layout
    pub const STM32U585: Self = Self {
        veneer: MemoryWindow::new(0x0C03_E000, 0x0C04_0000),
        code: MemoryWindow::new(0x0C00_0000, 0x0C03_E000),
        priv_data: MemoryWindow::new(0x3000_0000, 0x3000_8000),
        unpriv_data: MemoryWindow::new(0x3000_8000, 0x3001_C000),
        shared_data: MemoryWindow::new(0x3001_C000, 0x3001_C400),
        peripherals: MemoryWindow::new(0x5000_0000, 0x6000_0000),
        secure_sram: MemoryWindow::new(0x3000_0000, 0x3002_0000),
        ns_code: MemoryWindow::new(0x0804_0000, 0x0810_0000),
        ns_data: MemoryWindow::new(0x2002_0000, 0x2003_0000),
        ns_peripherals: MemoryWindow::new(0x4000_0000, 0x5000_0000),
    };
}

impl Default for ImageLayout {
    fn default() -> Self {
        Self::STM32U585
    }
}

fn region(
    index: usize,
    window: MemoryWindow,
    attrs: RegionAttributes,
    en: &[FlowStep],
    ch: &[FlowStep],
) -> Result<RegionDescriptor, FatalError> {
    let (Some(&enable), Some(&check)) = (en.get(index), ch.get(index)) else {
        return Err(FatalError::InvalidLayout);
    };
    let index = u8::try_from(index).map_err(|_| FatalError::InvalidLayout)?;
    RegionDescriptor::from_window(index, window, attrs)
        .map(|r| r.with_flow(RegionFlow { enable, check }))
        .map_err(|_| FatalError::InvalidLayout)
}

fn plan(
    unit: Unit,
    windows: &[(MemoryWindow, RegionAttributes)],
    en: &[FlowStep],
    ch: &[FlowStep],
    steps: (FlowStep, FlowStep, Option<LockSteps>),
) -> Result<UnitPlan, FatalError> {
    let mut plan = UnitPlan::new(unit, steps.0, steps.1, steps.2);
    for (i, &(window, attrs)) in windows.iter().enumerate() {
        plan.push(region(i, window, attrs, en, ch)?)?;
    }
    Ok(plan)
}

// =============================================================================
// Static Layout
// =============================================================================

/// Fixed region lists of all units for one isolation level
#[derive(Debug, Clone)]
pub struct StaticLayout {
    level: IsolationLevel,
    gtzc: UnitPlan,
    sau: UnitPlan,
    mpu: Option<UnitPlan>,
}

impl StaticLayout {
    /// Build the layout of `level`
    ///
    /// Level 1 programs no secure MPU regions. Level 2 separates privileged
    /// and unprivileged data. Level 3 keeps only the regions every
    /// partition shares; the running partition gets one more region at
    /// index `static_count` on every switch.
    ///
    /// # Errors
    ///
    /// `FatalError::InvalidLayout` if a window is empty, misaligned or
    /// overlaps another window of the same unit.
    pub fn for_level(level: IsolationLevel, image: &ImageLayout) -> Result<Self, FatalError> {
        let gtzc = plan(
            Unit::Gtzc,
            &[
                (image.secure_sram, RegionAttributes::block(SecurityAttribute::Secure, true)),
                (image.ns_data, RegionAttributes::block(SecurityAttribute::NonSecure, false)),
            ],
            &GTZC_EN_R,
            &GTZC_CH_R,
            (GTZC_EN, GTZC_CH, Some(LockSteps { lock: GTZC_LCK, check: GTZC_LCK_CH })),
        )?;

        let sau = plan(
            Unit::Sau,
            &[
                (image.ns_code, RegionAttributes::attribution(SecurityAttribute::NonSecure)),
                (image.ns_data, RegionAttributes::attribution(SecurityAttribute::NonSecure)),
                (image.veneer, RegionAttributes::attribution(SecurityAttribute::NonSecureCallable)),
                (image.ns_peripherals, RegionAttributes::attribution(SecurityAttribute::NonSecure)),
            ],
            &SAU_EN_R,
            &SAU_CH_R,
            (SAU_EN, SAU_CH, Some(LockSteps { lock: SAU_LCK, check: SAU_LCK_CH })),
        )?;

        let mpu = match level {
            IsolationLevel::Level1 => None,
            IsolationLevel::Level2 => Some(plan(
                Unit::Mpu,
                &[
                    (image.veneer, RegionAttributes::CODE_RO_ALL),
                    (image.code, RegionAttributes::CODE_RO_ALL),
                    (image.priv_data, RegionAttributes::DATA_RW_PRIV),
                    (image.unpriv_data, RegionAttributes::DATA_RW_ALL),
                    (image.shared_data, RegionAttributes::DATA_RO_PRIV),
                    (image.peripherals, RegionAttributes::DEVICE_RW_ALL),
                ],
                &MPU2_EN_R,
                &MPU2_CH_R,
                (MPU2_EN, MPU2_CH, Some(LockSteps { lock: MPU2_LCK, check: MPU2_LCK_CH })),
            )?),
            // Not locked: the partition region is rewritten on every switch.
            IsolationLevel::Level3 => Some(plan(
                Unit::Mpu,
                &[
                    (image.veneer, RegionAttributes::CODE_RO_ALL),
                    (image.code, RegionAttributes::CODE_RO_ALL),
                    (image.priv_data, RegionAttributes::DATA_RW_PRIV),
                ],
                &MPU3_EN_R,
                &MPU3_CH_R,
                (MPU3_EN, MPU3_CH, None),
            )?),
        };

        Ok(Self { level, gtzc, sau, mpu })
    }

    /// Isolation level
    #[must_use]
    pub const fn level(&self) -> IsolationLevel {
        self.level
    }

    /// GTZC plan
    #[must_use]
    pub const fn gtzc(&self) -> &UnitPlan {
        &self.gtzc
    }

    /// SAU plan
    #[must_use]
    pub const fn sau(&self) -> &UnitPlan {
        &self.sau
    }

    /// MPU plan (absent at level 1)
    #[must_use]
    pub const fn mpu(&self) -> Option<&UnitPlan> {
        self.mpu.as_ref()
    }

    /// Number of static MPU regions
    #[must_use]
    pub fn static_count(&self) -> u8 {
        self.mpu.as_ref().map_or(0, UnitPlan::region_count)
    }

    /// Accumulator value once every unit is configured and verified
    #[must_use]
    pub fn final_step(&self) -> FlowStep {
        self.mpu.as_ref().map_or(SAU_LCK_CH, UnitPlan::final_step)
    }
}
