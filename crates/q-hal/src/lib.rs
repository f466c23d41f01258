// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Hardware Abstraction Layer for the Qbitel secure partition manager
//!
//! This crate describes protected memory regions and the units that
//! enforce them:
//!
//! - **Region model**: validated [`RegionDescriptor`] values and their
//!   hardware image ([`region`] module)
//! - **Unit trait**: [`HardwareRegionTable`], the set/get/enable/lock
//!   interface the isolation core drives
//! - **Backends**: register drivers for STM32U5 (`stm32u5` feature) and an
//!   in-memory [`sim::SimRegionTable`] for host builds and tests
//!
//! # Security
//!
//! - Descriptors are validated at construction; an invalid descriptor never
//!   reaches a unit
//! - Units refuse to overwrite an installed index without an explicit clear
//! - Every mutating call fails once a unit is locked

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod traits;
pub mod error;
pub mod region;
pub mod sim;

#[cfg(feature = "stm32u5")]
pub mod stm32u5;

// Re-export main traits
pub use traits::*;
pub use error::{HalError, HalResult};
pub use region::{
    AccessPermission, Execute, FlowStep, MemoryAttribute, MemoryWindow, RawRegion,
    RegionAttributes, RegionDescriptor, RegionFlow, SecurityAttribute, Shareability,
};
