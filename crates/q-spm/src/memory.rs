// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Client memory access
//!
//! Buffers are named by client address and length. The router never
//! dereferences a client address itself; every byte moves through a
//! [`ClientMemory`] implementation after the [`AccessPolicy`] accepted the
//! range.
//!
//! [`AccessPolicy`]: q_isolation::AccessPolicy

use q_common::Result;
use zeroize::Zeroize;

/// Size of one serialized vector descriptor (base, len)
pub const IOVEC_SIZE: u32 = 8;

/// Buffer descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroize)]
pub struct IoVec {
    /// Client address of the first byte
    pub base: u32,
    /// Length in bytes
    pub len: u32,
}

impl IoVec {
    /// Create a descriptor
    #[must_use]
    pub const fn new(base: u32, len: u32) -> Self {
        Self { base, len }
    }

    /// Check if the byte ranges of two descriptors intersect
    ///
    /// An empty descriptor overlaps a range whose interior holds its base.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        let (a, la) = (self.base as u64, self.len as u64);
        let (b, lb) = (other.base as u64, other.len as u64);
        a < b + lb && b < a + la
    }

    /// Decode from the little-endian client layout
    #[must_use]
    pub fn from_le_bytes(raw: [u8; 8]) -> Self {
        let [b0, b1, b2, b3, l0, l1, l2, l3] = raw;
        Self {
            base: u32::from_le_bytes([b0, b1, b2, b3]),
            len: u32::from_le_bytes([l0, l1, l2, l3]),
        }
    }
}

/// Byte access to client memory
pub trait ClientMemory {
    /// Copy `buf.len()` bytes starting at `addr` into `buf`
    ///
    /// # Errors
    ///
    /// Implementation defined; the range was already checked.
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Copy `data` to client memory starting at `addr`
    ///
    /// # Errors
    ///
    /// Implementation defined; the range was already checked.
    fn write(&self, addr: u32, data: &[u8]) -> Result<()>;
}

impl<T: ClientMemory + ?Sized> ClientMemory for &T {
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn write(&self, addr: u32, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_symmetric() {
        let a = IoVec::new(0x100, 0x10);
        let b = IoVec::new(0x108, 0x10);
        let c = IoVec::new(0x110, 0x10);
        assert!(a.overlaps(&b) && b.overlaps(&a));
        assert!(!a.overlaps(&c) && !c.overlaps(&a));
        assert!(!a.overlaps(&IoVec::new(0x100, 0)));
    }

    #[test]
    fn test_empty_vector_inside_range_overlaps() {
        let a = IoVec::new(0x100, 0x10);
        let inside = IoVec::new(0x104, 0);
        assert!(a.overlaps(&inside) && inside.overlaps(&a));
        assert!(!a.overlaps(&IoVec::new(0x110, 0)));
        assert!(!inside.overlaps(&IoVec::new(0x104, 0)));
    }

    #[test]
    fn test_overlap_near_address_space_end() {
        let a = IoVec::new(0xFFFF_FFF0, 0x10);
        let b = IoVec::new(0xFFFF_FFFF, 1);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_descriptor_layout() {
        let v = IoVec::from_le_bytes([0x00, 0x10, 0x00, 0x20, 0x04, 0x00, 0x00, 0x00]);
        assert_eq!(v, IoVec::new(0x2000_1000, 4));
    }
}
