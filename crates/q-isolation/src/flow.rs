// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Flow-Control Step Verifier
//!
//! Every boundary configuration step XORs a unique constant into an
//! accumulator and immediately compares the result with a precomputed
//! cumulative constant. A skipped, repeated or reordered step leaves the
//! accumulator off the expected chain and the next comparison fails.
//!
//! Built without the `flow-control` feature, [`FlowControl::step`] compiles
//! to nothing and always succeeds.

use q_common::constants::FLOW_CTRL_INIT_VALUE;

pub use q_hal::FlowStep;

use crate::fatal::FatalError;

/// Configuration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Write regions to hardware
    Configure,
    /// Read regions back and compare
    Verify,
}

impl Stage {
    /// Short name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure => "CFG",
            Self::Verify => "CHK",
        }
    }
}

/// Flow-control accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowControl {
    value: u32,
}

impl FlowControl {
    /// Accumulator at its boot value
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(FLOW_CTRL_INIT_VALUE)
    }

    /// Accumulator at an arbitrary value
    #[must_use]
    pub const fn starting_at(value: u32) -> Self {
        Self { value }
    }

    /// Check if step verification is compiled in
    #[must_use]
    pub const fn is_enabled() -> bool {
        cfg!(feature = "flow-control")
    }

    /// Current accumulator value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    cfg_if::cfg_if! {
        if #[cfg(feature = "flow-control")] {
            /// XOR `step` into the accumulator and compare with `expected`
            ///
            /// # Errors
            ///
            /// `FatalError::FlowControl` if the accumulator does not equal
            /// `expected` afterwards.
            #[inline]
            pub fn step(&mut self, step: u32, expected: u32) -> Result<(), FatalError> {
                self.value ^= step;
                if self.value != expected {
                    return Err(FatalError::FlowControl {
                        expected,
                        actual: self.value,
                    });
                }
                Ok(())
            }
        } else {
            /// Step verification is compiled out; always succeeds
            ///
            /// # Errors
            ///
            /// Never.
            #[inline]
            #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
            pub fn step(&mut self, _step: u32, _expected: u32) -> Result<(), FatalError> {
                Ok(())
            }
        }
    }

    /// Apply a precomputed step
    ///
    /// # Errors
    ///
    /// See [`FlowControl::step`].
    #[inline]
    pub fn apply(&mut self, step: FlowStep) -> Result<(), FatalError> {
        self.step(step.step, step.ctrl)
    }
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(all(test, not(feature = "flow-control")))]
mod disabled_tests {
    use super::*;

    #[test]
    fn test_steps_are_no_ops() {
        let mut flow = FlowControl::new();
        flow.step(0x1234, 0xDEAD).unwrap();
        assert_eq!(flow.value(), FLOW_CTRL_INIT_VALUE);
        assert!(!FlowControl::is_enabled());
    }
}
