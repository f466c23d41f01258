// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! System-wide constants for the secure partition manager
//!
//! All table sizes are compile-time bounds; runtime configuration may pick
//! smaller values but never larger ones.

// =============================================================================
// Table Bounds
// =============================================================================

/// Maximum number of secure partitions
pub const MAX_PARTITIONS: usize = 8;

/// Maximum number of registered services
pub const MAX_SERVICES: usize = 16;

/// Maximum number of regions per hardware protection unit
pub const MAX_REGIONS_PER_UNIT: usize = 16;

/// Maximum number of dependencies a partition may declare
pub const MAX_PARTITION_DEPS: usize = 8;

// =============================================================================
// IPC Constants
// =============================================================================

/// Total number of input and output vectors in one request
pub const MAX_IOVEC: usize = 4;

/// Upper bound on concurrently allocated connection handles
pub const CONN_HANDLE_MAX_NUM: usize = 16;

/// Lowest value a connection handle may take
pub const CLIENT_HANDLE_VALUE_MIN: u32 = 1;

/// Left shift applied to a pool offset when producing a handle
pub const CONVERSION_FACTOR_BITOFFSET: u32 = 3;

/// Number of salt values folded into a handle
pub const HANDLE_SALT_RANGE: u32 = 1 << CONVERSION_FACTOR_BITOFFSET;

/// Sentinel stored in every live message
pub const MSG_MAGIC: u32 = 0x1515_4343;

/// Bit marking a handle as a static (stateless) handle
pub const STATIC_HANDLE_INDICATOR: u32 = 1 << 30;

/// Maximum number of stateless services
pub const STATIC_HANDLE_NUM_LIMIT: usize = 32;

/// Shift of the version field in a static handle
pub const STATIC_HANDLE_VERSION_SHIFT: u32 = 8;

/// Version value reported for unknown or inaccessible services
pub const VERSION_NONE: u32 = 0;

/// Framework version reported to clients (major 1, minor 1)
pub const FRAMEWORK_VERSION: u32 = 0x0101;

// =============================================================================
// Signals
// =============================================================================

/// Doorbell signal raised by `notify`
pub const SIGNAL_DOORBELL: u32 = 1 << 3;

/// Signals reserved by the framework (bits 0..=3)
pub const SIGNAL_RESERVED_MASK: u32 = 0x0000_000F;

// =============================================================================
// Isolation Constants
// =============================================================================

/// Minimum region alignment granularity in bytes
pub const REGION_ALIGNMENT: u32 = 32;

/// Initial value of the flow-control accumulator
pub const FLOW_CTRL_INIT_VALUE: u32 = 0x0000_5776;
