// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Static handles for stateless services
//!
//! A static handle carries the service index and the service version
//! instead of a pool reference:
//!
//! ```text
//! bit 30      : STATIC_HANDLE_INDICATOR
//! bits 8..=15 : version
//! bits 0..=7  : index + 1
//! ```

use q_common::constants::{
    STATIC_HANDLE_INDICATOR, STATIC_HANDLE_NUM_LIMIT, STATIC_HANDLE_VERSION_SHIFT,
};
use q_common::Handle;

const INDEX_MASK: u32 = 0xFF;
const VERSION_MASK: u32 = 0xFF;

/// Encode a static handle
///
/// `None` if the index or version does not fit the encoding.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn encode(index: usize, version: u32) -> Option<Handle> {
    if index >= STATIC_HANDLE_NUM_LIMIT || version > VERSION_MASK {
        return None;
    }
    let raw = STATIC_HANDLE_INDICATOR | (version << STATIC_HANDLE_VERSION_SHIFT) | (index as u32 + 1);
    Some(Handle(raw as i32))
}

/// Decode a static handle into (index, version)
///
/// Rejects values with bits set outside the encoding.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn decode(handle: Handle) -> Option<(usize, u32)> {
    if !handle.is_static() {
        return None;
    }
    let raw = handle.0 as u32 & !STATIC_HANDLE_INDICATOR;
    let slot = raw & INDEX_MASK;
    let version = (raw >> STATIC_HANDLE_VERSION_SHIFT) & VERSION_MASK;
    let rest = raw & !(INDEX_MASK | (VERSION_MASK << STATIC_HANDLE_VERSION_SHIFT));
    if rest != 0 || slot == 0 || slot as usize > STATIC_HANDLE_NUM_LIMIT {
        return None;
    }
    Some((slot as usize - 1, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_layout() {
        assert_eq!(encode(0, 1), Some(Handle(0x4000_0101)));
        assert_eq!(decode(Handle(0x4000_0101)), Some((0, 1)));
        assert_eq!(decode(encode(31, 0xFF).unwrap()), Some((31, 0xFF)));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(encode(STATIC_HANDLE_NUM_LIMIT, 1), None);
        assert_eq!(encode(0, 0x100), None);
        assert_eq!(decode(Handle(0x4000_0000)), None);
        assert_eq!(decode(Handle(0x4001_0101)), None);
        assert_eq!(decode(Handle(0x4000_0121)), None);
        assert_eq!(decode(Handle(0x101)), None);
    }
}
