// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Connection/Message Pool
//!
//! A fixed-capacity allocator of equally sized chunks. The pool is laid out
//! as a header followed by `capacity` chunks, each a chunk header plus the
//! payload:
//!
//! ```text
//! | pool header | hdr | T | hdr | T | ... | hdr | T |
//!               ^ chunk 0   ^ chunk 1
//! ```
//!
//! Chunks are referenced internally by index. Callers outside the secure
//! world only ever see an external handle derived from the byte offset of
//! a chunk payload:
//!
//! ```text
//! handle = (offset << CONVERSION_FACTOR_BITOFFSET) + CLIENT_HANDLE_VALUE_MIN + salt
//! ```
//!
//! The salt rotates on every conversion and is discarded on the way back.
//! A handle converts back only if its offset lands exactly on a chunk
//! payload inside the pool.

use core::mem::size_of;

use heapless::Vec;
use q_common::constants::{
    CLIENT_HANDLE_VALUE_MIN, CONVERSION_FACTOR_BITOFFSET, HANDLE_SALT_RANGE, STATIC_HANDLE_INDICATOR,
};
use q_common::{Error, Handle, Result};
use zeroize::Zeroize;

/// Size of the pool header in bytes
pub const POOL_HEADER_SIZE: usize = 16;

/// Size of the per-chunk header in bytes
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Reference to one pool chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk(u8);

impl Chunk {
    /// Chunk index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Check that every offset below `pool_size` encodes to a connection handle
#[allow(clippy::cast_lossless)]
const fn handles_fit(pool_size: usize) -> bool {
    let highest = (pool_size as u64)
        .saturating_mul(1 << CONVERSION_FACTOR_BITOFFSET)
        .saturating_add(CLIENT_HANDLE_VALUE_MIN as u64 + HANDLE_SALT_RANGE as u64);
    highest <= STATIC_HANDLE_INDICATOR as u64
}

/// Fixed-capacity chunk pool
pub struct Pool<T, const N: usize> {
    chunks: Vec<T, N>,
    allocated: [bool; N],
    free: Vec<u8, N>,
    salt: u32,
}

impl<T: Default + Zeroize, const N: usize> Pool<T, N> {
    /// Size of one chunk (header + payload)
    #[must_use]
    pub const fn chunk_size() -> usize {
        CHUNK_HEADER_SIZE + size_of::<T>()
    }

    /// Pool size required for `capacity` chunks
    #[must_use]
    pub const fn required_size(capacity: usize) -> usize {
        POOL_HEADER_SIZE.saturating_add(capacity.saturating_mul(Self::chunk_size()))
    }

    /// Build a pool of `capacity` chunks
    ///
    /// `pool_size` must equal [`Pool::required_size`]`(capacity)`.
    ///
    /// # Errors
    ///
    /// `Error::PoolMisconfigured` if `capacity` is zero or above `N`, the
    /// size does not match, or the pool is too large for its handles to
    /// stay below the static handle range.
    pub fn new(capacity: usize, pool_size: usize) -> Result<Self> {
        if capacity == 0
            || capacity > N
            || capacity > usize::from(u8::MAX)
            || pool_size != Self::required_size(capacity)
            || !handles_fit(pool_size)
        {
            return Err(Error::PoolMisconfigured);
        }

        let mut chunks = Vec::new();
        let mut free = Vec::new();
        for i in 0..capacity {
            chunks.push(T::default()).map_err(|_| Error::PoolMisconfigured)?;
            // Lowest index on top
            let top = u8::try_from(capacity - 1 - i).map_err(|_| Error::PoolMisconfigured)?;
            free.push(top).map_err(|_| Error::PoolMisconfigured)?;
        }

        Ok(Self {
            chunks,
            allocated: [false; N],
            free,
            salt: 0,
        })
    }

    /// Number of chunks
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chunks.len()
    }

    /// Number of free chunks
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Take the chunk at the head of the free list
    ///
    /// `None` when the pool is exhausted.
    pub fn alloc(&mut self) -> Option<Chunk> {
        let index = self.free.pop()?;
        self.allocated[usize::from(index)] = true;
        Some(Chunk(index))
    }

    /// Return a chunk to the head of the free list
    ///
    /// The payload is zeroized first.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidChunk` if the chunk is not part of the pool
    /// - `Error::DoubleFree` if the chunk is not allocated
    pub fn free(&mut self, chunk: Chunk) -> Result<()> {
        let index = chunk.index();
        let payload = self.chunks.get_mut(index).ok_or(Error::InvalidChunk)?;
        if !self.allocated[index] {
            return Err(Error::DoubleFree);
        }
        payload.zeroize();
        self.allocated[index] = false;
        self.free.push(chunk.0).map_err(|_| Error::Internal)
    }

    /// Check if a chunk is allocated
    #[must_use]
    pub fn is_allocated(&self, chunk: Chunk) -> bool {
        self.allocated.get(chunk.index()).copied().unwrap_or(false)
    }

    /// Payload of an allocated chunk
    #[must_use]
    pub fn get(&self, chunk: Chunk) -> Option<&T> {
        if !self.is_allocated(chunk) {
            return None;
        }
        self.chunks.get(chunk.index())
    }

    /// Mutable payload of an allocated chunk
    pub fn get_mut(&mut self, chunk: Chunk) -> Option<&mut T> {
        if !self.is_allocated(chunk) {
            return None;
        }
        self.chunks.get_mut(chunk.index())
    }

    /// Byte offset of a chunk payload from the pool start
    #[must_use]
    pub const fn data_offset(chunk: Chunk) -> usize {
        POOL_HEADER_SIZE + chunk.index() * Self::chunk_size() + CHUNK_HEADER_SIZE
    }

    /// Check if `offset` is the payload offset of a chunk of this pool
    #[must_use]
    pub fn is_valid_member(&self, offset: usize) -> bool {
        let first = POOL_HEADER_SIZE + CHUNK_HEADER_SIZE;
        let span = self.capacity() * Self::chunk_size();
        offset >= first && offset - first < span && (offset - first) % Self::chunk_size() == 0
    }

    /// Caller-visible handle of a chunk
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn to_external_handle(&mut self, chunk: Chunk) -> Handle {
        self.salt = (self.salt + 1) % HANDLE_SALT_RANGE;
        let offset = Self::data_offset(chunk) as u32;
        Handle(((offset << CONVERSION_FACTOR_BITOFFSET) + CLIENT_HANDLE_VALUE_MIN + self.salt) as i32)
    }

    /// Chunk referenced by a caller-supplied handle
    ///
    /// `None` for anything that is not a connection-range value landing
    /// exactly on a chunk payload. The chunk may still be free.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn from_external_handle(&self, handle: Handle) -> Option<Chunk> {
        if !handle.is_connection() {
            return None;
        }
        let offset = ((handle.0 as u32 - CLIENT_HANDLE_VALUE_MIN) >> CONVERSION_FACTOR_BITOFFSET) as usize;
        if !self.is_valid_member(offset) {
            return None;
        }
        let index = (offset - POOL_HEADER_SIZE - CHUNK_HEADER_SIZE) / Self::chunk_size();
        u8::try_from(index).ok().map(Chunk)
    }
}
