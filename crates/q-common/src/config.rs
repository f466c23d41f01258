// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Secure partition manager configuration
//!
//! All configuration is compile-time or provisioned at factory - no runtime
//! configuration changes are allowed for security.

use crate::constants::CONN_HANDLE_MAX_NUM;
use crate::errors::{Error, Result};
use crate::log::LogLevel;

/// Isolation level between secure partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum IsolationLevel {
    /// Secure and non-secure worlds separated, partitions share privilege
    Level1 = 1,
    /// Application partitions run unprivileged
    Level2 = 2,
    /// Every partition is confined to its own memory window
    Level3 = 3,
}

impl IsolationLevel {
    /// Check if partition windows are reprogrammed on every switch
    #[must_use]
    pub const fn has_dynamic_boundary(self) -> bool {
        matches!(self, Self::Level3)
    }

    /// Check if application partitions run unprivileged
    #[must_use]
    pub const fn has_unprivileged_partitions(self) -> bool {
        !matches!(self, Self::Level1)
    }
}

/// Handling of programmer errors raised by non-secure clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgrammerErrorPolicy {
    /// Return `PROGRAMMER_ERROR` to the client
    ReturnStatus,
    /// Return the status and ask the scheduler to terminate the client context
    TerminateClient,
}

/// Isolation configuration
#[derive(Debug, Clone, Copy)]
pub struct IsolationConfig {
    /// Isolation level
    pub level: IsolationLevel,
    /// Set the one-way hardware lock after verification
    ///
    /// Cleared only in development builds so the tables stay inspectable.
    pub lock_boundaries: bool,
}

impl IsolationConfig {
    /// Production defaults
    pub const DEFAULT: Self = Self {
        level: IsolationLevel::Level2,
        lock_boundaries: true,
    };

    /// Development defaults (tables left unlocked)
    pub const DEVELOPMENT: Self = Self {
        level: IsolationLevel::Level2,
        lock_boundaries: false,
    };
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// IPC configuration
#[derive(Debug, Clone, Copy)]
pub struct IpcConfig {
    /// Number of connection handles in the pool
    pub connection_pool_size: usize,
    /// Policy applied to programmer errors from non-secure clients
    pub ns_programmer_error: ProgrammerErrorPolicy,
}

impl IpcConfig {
    /// Default IPC configuration
    pub const DEFAULT: Self = Self {
        connection_pool_size: CONN_HANDLE_MAX_NUM,
        ns_programmer_error: ProgrammerErrorPolicy::ReturnStatus,
    };
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Copy)]
pub struct SpmConfig {
    /// Isolation configuration
    pub isolation: IsolationConfig,
    /// IPC configuration
    pub ipc: IpcConfig,
    /// Minimum level kept in the event log
    pub log_level: LogLevel,
}

impl SpmConfig {
    /// Production configuration
    pub const DEFAULT: Self = Self {
        isolation: IsolationConfig::DEFAULT,
        ipc: IpcConfig::DEFAULT,
        log_level: LogLevel::Info,
    };

    /// Development configuration
    pub const DEVELOPMENT: Self = Self {
        isolation: IsolationConfig::DEVELOPMENT,
        ipc: IpcConfig::DEFAULT,
        log_level: LogLevel::Debug,
    };

    /// Same configuration at another isolation level
    #[must_use]
    pub const fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation.level = level;
        self
    }

    /// Validate bounds that the type system cannot express
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the pool size is zero or exceeds
    /// [`CONN_HANDLE_MAX_NUM`].
    pub const fn validate(&self) -> Result<()> {
        if self.ipc.connection_pool_size == 0
            || self.ipc.connection_pool_size > CONN_HANDLE_MAX_NUM
        {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for SpmConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SpmConfig::DEFAULT.validate().is_ok());
        assert!(SpmConfig::DEFAULT.isolation.lock_boundaries);
        assert!(!SpmConfig::DEVELOPMENT.isolation.lock_boundaries);
    }

    #[test]
    fn test_pool_size_bounds() {
        let mut cfg = SpmConfig::DEFAULT;
        cfg.ipc.connection_pool_size = 0;
        assert_eq!(cfg.validate(), Err(Error::InvalidConfig));
        cfg.ipc.connection_pool_size = CONN_HANDLE_MAX_NUM + 1;
        assert_eq!(cfg.validate(), Err(Error::InvalidConfig));
    }

    #[test]
    fn test_isolation_levels() {
        let cfg = SpmConfig::DEFAULT.with_isolation_level(IsolationLevel::Level3);
        assert!(cfg.isolation.level.has_dynamic_boundary());
        assert!(!IsolationLevel::Level1.has_unprivileged_partitions());
    }
}
