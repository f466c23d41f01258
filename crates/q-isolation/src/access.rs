// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Memory access checks
//!
//! The IPC router asks an [`AccessPolicy`] whether a caller-supplied buffer
//! may be touched on the caller's behalf before any byte of it is used.

use bitflags::bitflags;

bitflags! {
    /// Access requested on a client buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessAttr: u32 {
        /// Buffer is read
        const READ = 1 << 0;
        /// Buffer is written
        const WRITE = 1 << 1;
        /// Caller runs unprivileged
        const UNPRIVILEGED = 1 << 2;
        /// Caller is in the non-secure world
        const NON_SECURE = 1 << 3;
    }
}

impl AccessAttr {
    /// Read-write access
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);
}

/// Decides whether a caller may access a memory range
pub trait AccessPolicy {
    /// Check `[base, base + len)` against `attr`
    ///
    /// An empty range is always accessible. A range that wraps the address
    /// space never is.
    fn has_access(&self, base: u32, len: u32, attr: AccessAttr) -> bool;
}

impl<P: AccessPolicy + ?Sized> AccessPolicy for &P {
    fn has_access(&self, base: u32, len: u32, attr: AccessAttr) -> bool {
        (**self).has_access(base, len, attr)
    }
}

/// Inclusive last byte of a non-empty range
#[must_use]
pub const fn last_byte(base: u32, len: u32) -> Option<u32> {
    if len == 0 {
        return None;
    }
    base.checked_add(len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_byte() {
        assert_eq!(last_byte(0x1000, 0), None);
        assert_eq!(last_byte(0x1000, 1), Some(0x1000));
        assert_eq!(last_byte(0xFFFF_FFFF, 1), Some(0xFFFF_FFFF));
        assert_eq!(last_byte(0xFFFF_FFFF, 2), None);
    }

    #[test]
    fn test_attr_composition() {
        let a = AccessAttr::READ_WRITE | AccessAttr::NON_SECURE;
        assert!(a.contains(AccessAttr::WRITE));
        assert!(!a.contains(AccessAttr::UNPRIVILEGED));
    }
}
