// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Region Descriptor Model
//!
//! Value types describing one protected memory region independently of the
//! unit that enforces it. A descriptor is validated once at construction and
//! is immutable afterwards; verification passes compare descriptors with
//! what a unit reports back through [`RegionDescriptor::same_settings`].
//!
//! # Hardware Image
//!
//! [`RawRegion`] is the three-word image a unit stores per region. It
//! follows the ARMv8-M RBAR/RLAR split with the security attribute in a
//! third word:
//!
//! | Word | Bits     | Field                         |
//! |------|----------|-------------------------------|
//! | rbar | 31:5     | base address                  |
//! | rbar | 4:3      | shareability                  |
//! | rbar | 2:1      | access permission             |
//! | rbar | 0        | execute never                 |
//! | rlar | 31:5     | limit address                 |
//! | rlar | 3:1      | memory attribute class        |
//! | rlar | 0        | enable                        |
//! | rsar | 1:0      | security attribute            |

use q_common::constants::REGION_ALIGNMENT;

use crate::error::{HalError, HalResult};

const ALIGN_MASK: u32 = REGION_ALIGNMENT - 1;

// =============================================================================
// Attribute Sets
// =============================================================================

/// Memory attribute class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoryAttribute {
    /// Normal memory holding code, cacheable
    Code = 0,
    /// Normal memory holding data, cacheable
    Data = 1,
    /// Normal memory, non-cacheable
    DataNoCache = 2,
    /// Device memory (nGnRE)
    Device = 3,
}

impl MemoryAttribute {
    /// Decode from the hardware image
    #[must_use]
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Code),
            1 => Some(Self::Data),
            2 => Some(Self::DataNoCache),
            3 => Some(Self::Device),
            _ => None,
        }
    }
}

/// Execute permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Execute {
    /// Instruction fetch allowed
    Allow = 0,
    /// Instruction fetch faults
    Never = 1,
}

impl Execute {
    /// Decode from the hardware image
    #[must_use]
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Allow),
            1 => Some(Self::Never),
            _ => None,
        }
    }
}

/// Access permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessPermission {
    /// Read-write, privileged only
    RwPrivileged = 0,
    /// Read-write, any privilege
    RwAll = 1,
    /// Read-only, privileged only
    RoPrivileged = 2,
    /// Read-only, any privilege
    RoAll = 3,
}

impl AccessPermission {
    /// Decode from the hardware image
    #[must_use]
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::RwPrivileged),
            1 => Some(Self::RwAll),
            2 => Some(Self::RoPrivileged),
            3 => Some(Self::RoAll),
            _ => None,
        }
    }

    /// Check if writes are permitted
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::RwPrivileged | Self::RwAll)
    }

    /// Check if unprivileged code may access the region
    #[must_use]
    pub const fn allows_unprivileged(self) -> bool {
        matches!(self, Self::RwAll | Self::RoAll)
    }
}

/// Shareability domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Shareability {
    /// Not shareable
    None = 0,
    /// Outer shareable
    Outer = 2,
    /// Inner shareable
    Inner = 3,
}

impl Shareability {
    /// Decode from the hardware image (value 1 is reserved)
    #[must_use]
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            2 => Some(Self::Outer),
            3 => Some(Self::Inner),
            _ => None,
        }
    }
}

/// Security attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SecurityAttribute {
    /// Secure world only
    Secure = 0,
    /// Non-secure
    NonSecure = 1,
    /// Secure, with gateway entry points callable from non-secure
    NonSecureCallable = 2,
}

impl SecurityAttribute {
    /// Decode from the hardware image
    #[must_use]
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Secure),
            1 => Some(Self::NonSecure),
            2 => Some(Self::NonSecureCallable),
            _ => None,
        }
    }
}

/// Complete attribute set of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionAttributes {
    /// Memory attribute class
    pub memory: MemoryAttribute,
    /// Execute permission
    pub execute: Execute,
    /// Access permission
    pub access: AccessPermission,
    /// Shareability
    pub shareability: Shareability,
    /// Security attribute
    pub security: SecurityAttribute,
}

impl RegionAttributes {
    /// Executable code readable at any privilege (veneers, partition code)
    pub const CODE_RO_ALL: Self = Self::new(
        MemoryAttribute::Code,
        Execute::Allow,
        AccessPermission::RoAll,
    );
    /// Privileged read-write data
    pub const DATA_RW_PRIV: Self = Self::new(
        MemoryAttribute::Data,
        Execute::Never,
        AccessPermission::RwPrivileged,
    );
    /// Read-write data at any privilege
    pub const DATA_RW_ALL: Self = Self::new(
        MemoryAttribute::Data,
        Execute::Never,
        AccessPermission::RwAll,
    );
    /// Privileged read-only, non-cacheable, non-executable
    pub const DATA_RO_PRIV: Self = Self::new(
        MemoryAttribute::DataNoCache,
        Execute::Never,
        AccessPermission::RoPrivileged,
    );
    /// Device registers at any privilege
    pub const DEVICE_RW_ALL: Self = Self::new(
        MemoryAttribute::Device,
        Execute::Never,
        AccessPermission::RwAll,
    );

    /// Secure, non-shareable attribute set
    #[must_use]
    pub const fn new(memory: MemoryAttribute, execute: Execute, access: AccessPermission) -> Self {
        Self {
            memory,
            execute,
            access,
            shareability: Shareability::None,
            security: SecurityAttribute::Secure,
        }
    }

    /// Attribute set of a security attribution region (SAU)
    ///
    /// Attribution units store only the security attribute; every other
    /// field takes the value the unit reports back.
    #[must_use]
    pub const fn attribution(security: SecurityAttribute) -> Self {
        Self::new(MemoryAttribute::Data, Execute::Allow, AccessPermission::RwAll).with_security(security)
    }

    /// Attribute set of a block-based SRAM controller region (GTZC)
    #[must_use]
    pub const fn block(security: SecurityAttribute, privileged: bool) -> Self {
        let access = if privileged {
            AccessPermission::RwPrivileged
        } else {
            AccessPermission::RwAll
        };
        Self::new(MemoryAttribute::Data, Execute::Never, access).with_security(security)
    }

    /// Same attributes with another security attribute
    #[must_use]
    pub const fn with_security(mut self, security: SecurityAttribute) -> Self {
        self.security = security;
        self
    }

    /// Same attributes with another shareability
    #[must_use]
    pub const fn with_shareability(mut self, shareability: Shareability) -> Self {
        self.shareability = shareability;
        self
    }
}

// =============================================================================
// Flow-Control Steps
// =============================================================================

/// One flow-control step: the constant XORed into the accumulator and the
/// accumulator value expected afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStep {
    /// Step constant
    pub step: u32,
    /// Expected cumulative value after the step
    pub ctrl: u32,
}

impl FlowStep {
    /// Step without a checksum (used when a unit has no lock)
    pub const NONE: Self = Self { step: 0, ctrl: 0 };

    /// Step constant chained onto a previous step
    #[must_use]
    pub const fn after(prev: Self, step: u32) -> Self {
        Self {
            step,
            ctrl: prev.ctrl ^ step,
        }
    }

    /// First step of a chain starting at `init`
    #[must_use]
    pub const fn first(init: u32, step: u32) -> Self {
        Self {
            step,
            ctrl: init ^ step,
        }
    }
}

/// The two steps attached to a region: one per phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionFlow {
    /// Step taken after the region is written
    pub enable: FlowStep,
    /// Step taken after the region is read back and matched
    pub check: FlowStep,
}

impl RegionFlow {
    /// No flow-control steps (dynamic regions)
    pub const NONE: Self = Self {
        enable: FlowStep::NONE,
        check: FlowStep::NONE,
    };
}

// =============================================================================
// Region Descriptor
// =============================================================================

/// Validated region descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDescriptor {
    index: u8,
    base: u32,
    limit: u32,
    attrs: RegionAttributes,
    flow: RegionFlow,
}

impl RegionDescriptor {
    /// Create a descriptor
    ///
    /// `limit` is the address of the last byte in the region.
    ///
    /// # Errors
    ///
    /// - `HalError::InvalidRange` if `base >= limit`
    /// - `HalError::Misaligned` if `base` or `limit + 1` is not aligned to
    ///   [`REGION_ALIGNMENT`]
    pub const fn new(index: u8, base: u32, limit: u32, attrs: RegionAttributes) -> HalResult<Self> {
        if base >= limit {
            return Err(HalError::InvalidRange);
        }
        if (base & ALIGN_MASK) != 0 || (limit & ALIGN_MASK) != ALIGN_MASK {
            return Err(HalError::Misaligned);
        }
        Ok(Self {
            index,
            base,
            limit,
            attrs,
            flow: RegionFlow::NONE,
        })
    }

    /// Create a descriptor covering `[start, end)`
    ///
    /// # Errors
    ///
    /// Same as [`RegionDescriptor::new`]; an empty window is `InvalidRange`.
    pub const fn from_window(index: u8, window: MemoryWindow, attrs: RegionAttributes) -> HalResult<Self> {
        if window.end <= window.start {
            return Err(HalError::InvalidRange);
        }
        Self::new(index, window.start, window.end - 1, attrs)
    }

    /// Attach flow-control steps
    #[must_use]
    pub const fn with_flow(mut self, flow: RegionFlow) -> Self {
        self.flow = flow;
        self
    }

    /// Same region under another index
    #[must_use]
    pub const fn with_index(mut self, index: u8) -> Self {
        self.index = index;
        self
    }

    /// Region index within its unit
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    /// First byte
    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Last byte
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Attribute set
    #[must_use]
    pub const fn attributes(&self) -> RegionAttributes {
        self.attrs
    }

    /// Flow-control steps
    #[must_use]
    pub const fn flow(&self) -> RegionFlow {
        self.flow
    }

    /// Check if `[base, last]` lies inside the region
    #[must_use]
    pub const fn covers(&self, base: u32, last: u32) -> bool {
        base >= self.base && last <= self.limit && base <= last
    }

    /// Check if the region shares any byte with `other`
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.base <= other.limit && other.base <= self.limit
    }

    /// Compare everything a unit stores, ignoring flow-control steps
    #[must_use]
    pub fn same_settings(&self, other: &Self) -> bool {
        self.index == other.index
            && self.base == other.base
            && self.limit == other.limit
            && self.attrs == other.attrs
    }

    /// Hardware image of the region (enabled)
    #[must_use]
    pub const fn encode(&self) -> RawRegion {
        let a = self.attrs;
        RawRegion {
            index: self.index,
            rbar: self.base
                | ((a.shareability as u32) << 3)
                | ((a.access as u32) << 1)
                | (a.execute as u32),
            rlar: (self.limit & !ALIGN_MASK) | ((a.memory as u32) << 1) | RawRegion::RLAR_ENABLE,
            rsar: a.security as u32,
        }
    }
}

/// Hardware image of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRegion {
    /// Region index
    pub index: u8,
    /// Base word
    pub rbar: u32,
    /// Limit word
    pub rlar: u32,
    /// Security word
    pub rsar: u32,
}

impl RawRegion {
    /// Region enable bit in `rlar`
    pub const RLAR_ENABLE: u32 = 1 << 0;

    /// Check the enable bit
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        (self.rlar & Self::RLAR_ENABLE) != 0
    }

    /// Decode into a descriptor
    ///
    /// # Errors
    ///
    /// `HalError::InvalidEncoding` if any attribute field holds a value
    /// outside its closed set, or the range checks of
    /// [`RegionDescriptor::new`] fail.
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(&self) -> HalResult<RegionDescriptor> {
        let (Some(shareability), Some(access), Some(execute), Some(memory), Some(security)) = (
            Shareability::from_raw(((self.rbar >> 3) & 0x3) as u8),
            AccessPermission::from_raw(((self.rbar >> 1) & 0x3) as u8),
            Execute::from_raw((self.rbar & 0x1) as u8),
            MemoryAttribute::from_raw(((self.rlar >> 1) & 0x7) as u8),
            SecurityAttribute::from_raw(u8::try_from(self.rsar).unwrap_or(u8::MAX)),
        ) else {
            return Err(HalError::InvalidEncoding);
        };
        RegionDescriptor::new(
            self.index,
            self.rbar & !ALIGN_MASK,
            self.rlar | ALIGN_MASK,
            RegionAttributes {
                memory,
                execute,
                access,
                shareability,
                security,
            },
        )
    }
}

// =============================================================================
// Memory Window
// =============================================================================

/// Half-open address window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow {
    /// First byte
    pub start: u32,
    /// One past the last byte
    pub end: u32,
}

impl MemoryWindow {
    /// Create a window
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Window size in bytes
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Check for an empty window
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Check if `[base, last]` lies inside the window
    #[must_use]
    pub const fn covers(&self, base: u32, last: u32) -> bool {
        !self.is_empty() && base >= self.start && last < self.end && base <= last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_range() {
        let r = RegionDescriptor::new(0, 0x2000_0000, 0x2000_0000, RegionAttributes::DATA_RW_ALL);
        assert_eq!(r, Err(HalError::InvalidRange));
        let r = RegionDescriptor::new(0, 0x2000_1000, 0x2000_0FFF, RegionAttributes::DATA_RW_ALL);
        assert_eq!(r, Err(HalError::InvalidRange));
    }

    #[test]
    fn test_rejects_misaligned_bounds() {
        let r = RegionDescriptor::new(0, 0x2000_0004, 0x2000_0FFF, RegionAttributes::DATA_RW_ALL);
        assert_eq!(r, Err(HalError::Misaligned));
        let r = RegionDescriptor::new(0, 0x2000_0000, 0x2000_0FF0, RegionAttributes::DATA_RW_ALL);
        assert_eq!(r, Err(HalError::Misaligned));
    }

    #[test]
    fn test_encode_decode_preserves_settings() {
        let attrs = RegionAttributes::CODE_RO_ALL
            .with_shareability(Shareability::Inner)
            .with_security(SecurityAttribute::NonSecureCallable);
        let r = RegionDescriptor::new(3, 0x0C00_0000, 0x0C0F_FFFF, attrs).unwrap();
        let raw = r.encode();
        assert!(raw.is_enabled());
        let back = raw.decode().unwrap();
        assert!(back.same_settings(&r));
    }

    #[test]
    fn test_decode_rejects_reserved_values() {
        let r = RegionDescriptor::new(1, 0x2000_0000, 0x2000_0FFF, RegionAttributes::DATA_RW_ALL).unwrap();

        let mut raw = r.encode();
        raw.rbar = (raw.rbar & !0x18) | (1 << 3);
        assert_eq!(raw.decode(), Err(HalError::InvalidEncoding));

        let mut raw = r.encode();
        raw.rlar |= 0x7 << 1;
        assert_eq!(raw.decode(), Err(HalError::InvalidEncoding));

        let mut raw = r.encode();
        raw.rsar = 3;
        assert_eq!(raw.decode(), Err(HalError::InvalidEncoding));
    }

    #[test]
    fn test_flow_steps_ignored_by_comparison() {
        let r = RegionDescriptor::new(0, 0x2000_0000, 0x2000_001F, RegionAttributes::DATA_RW_PRIV).unwrap();
        let flow = RegionFlow {
            enable: FlowStep::first(0x5776, 0x10),
            check: FlowStep::first(0x5776, 0x20),
        };
        assert!(r.with_flow(flow).same_settings(&r));
        assert!(!r.with_index(1).same_settings(&r));
    }

    #[test]
    fn test_window_conversion() {
        let w = MemoryWindow::new(0x3000_0000, 0x3000_0400);
        let r = RegionDescriptor::from_window(4, w, RegionAttributes::DATA_RW_ALL).unwrap();
        assert_eq!(r.limit(), 0x3000_03FF);
        assert!(w.covers(0x3000_0000, 0x3000_03FF));
        assert!(!w.covers(0x3000_0000, 0x3000_0400));
        assert!(RegionDescriptor::from_window(4, MemoryWindow::new(8, 8), RegionAttributes::DATA_RW_ALL).is_err());
    }
}
