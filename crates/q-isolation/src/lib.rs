// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Qbitel Partition Isolation
//!
//! Installs the memory boundaries between the secure and non-secure worlds
//! and between secure partitions, and keeps them verified:
//!
//! - [`BoundaryConfigurator`]: two-stage configure/verify of one unit
//! - [`IsolationManager`]: boot-time static boundaries and the per-partition
//!   region at isolation level 3
//! - [`FlowControl`]: XOR-chained step verification (`flow-control` feature)
//! - [`AccessPolicy`]: buffer access checks for the IPC router
//!
//! # Security
//!
//! A failed check is never retried. It reaches a [`FatalHandler`], which
//! resets the system on target.

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod boundary;
pub mod configurator;
pub mod fatal;
pub mod flow;
pub mod layout;

pub use access::{AccessAttr, AccessPolicy};
pub use boundary::{BoundaryState, BoundaryUnits, IsolationManager};
pub use configurator::BoundaryConfigurator;
pub use fatal::{FatalError, FatalHandler, FatalRecord, SystemReset};
pub use flow::{FlowControl, Stage};
pub use layout::{ImageLayout, LockSteps, StaticLayout, UnitPlan};
