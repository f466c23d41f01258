// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Comprehensive tests for q-common
//!
//! Tests for common types, error handling, configuration and logging.

use q_common::config::{IpcConfig, IsolationConfig, ProgrammerErrorPolicy};
use q_common::log::{LogBuffer, LogLevel};
use q_common::{
    log_debug, log_info, log_warn, ClientId, Error, Handle, IsolationLevel, MessageType,
    PartitionId, SpmConfig, Status, Signal, VersionPolicy,
};

mod types_tests {
    use super::*;

    #[test]
    fn test_partition_acts_as_secure_client() {
        let id = PartitionId(5).client_id();
        assert_eq!(id, ClientId(5));
        assert!(!id.is_non_secure());
        assert!(ClientId(-1).is_non_secure());
    }

    #[test]
    fn test_signal_set_operations() {
        let a = Signal(1 << 4);
        let b = Signal(1 << 5);
        let both = a.union(b);

        assert!(a.is_single());
        assert!(!both.is_single());
        assert!(both.contains(a));
        assert!(both.intersects(b));
        assert_eq!(both.without(a), b);
        assert_eq!(a.intersection(b), Signal::NONE);
        assert!(Signal::NONE.is_empty());
    }

    #[test]
    fn test_version_policies() {
        assert!(VersionPolicy::Strict.accepts(2, 2));
        assert!(!VersionPolicy::Strict.accepts(1, 2));
        assert!(VersionPolicy::Relaxed.accepts(1, 2));
        assert!(VersionPolicy::Relaxed.accepts(2, 2));
        assert!(!VersionPolicy::Relaxed.accepts(3, 2));
    }

    #[test]
    fn test_handle_classes() {
        assert!(Handle::NULL.is_null());
        assert!(!Handle::NULL.is_connection());

        let stat = Handle(0x4000_0101);
        assert!(stat.is_static());
        assert!(!stat.is_connection());

        let conn = Handle(0x19);
        assert!(conn.is_connection());
        assert!(!conn.is_static());

        assert!(!Handle(-3).is_connection());
        assert!(!Handle(-3).is_static());
    }

    #[test]
    fn test_message_type_raw_values() {
        assert_eq!(MessageType::Connect.as_raw(), -1);
        assert_eq!(MessageType::Disconnect.as_raw(), -2);
        assert_eq!(MessageType::Call(7).as_raw(), 7);
    }

    #[test]
    fn test_status_success_range() {
        assert!(Status::SUCCESS.is_success());
        assert!(Status(12).is_success());
        assert!(!Status::PROGRAMMER_ERROR.is_success());
        assert!(!Status::CONNECTION_BUSY.is_success());
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_caller_visible_statuses() {
        assert_eq!(Error::ConnectionRefused.status(), Status::CONNECTION_REFUSED);
        assert_eq!(Error::ConnectionBusy.status(), Status::CONNECTION_BUSY);
        assert_eq!(Error::PoolExhausted.status(), Status::CONNECTION_BUSY);
        assert_eq!(Error::ProgrammerError.status(), Status::PROGRAMMER_ERROR);
        assert_eq!(Error::InvalidParameter.status(), Status::PROGRAMMER_ERROR);
    }

    #[test]
    fn test_error_classes() {
        assert!(Error::FlowControlViolation.is_fatal());
        assert!(Error::RegionMismatch.is_fatal());
        assert!(!Error::ConnectionBusy.is_fatal());

        assert!(Error::WriteOverflow.is_service_fault());
        assert!(Error::InvalidReplyStatus.is_service_fault());
        assert!(!Error::ProgrammerError.is_service_fault());
    }

    #[test]
    fn test_display_carries_code() {
        let text = std::format!("{}", Error::DoubleFree);
        assert!(text.starts_with("[0x0304]"));
    }

    #[test]
    fn test_codes_unique() {
        use std::collections::HashSet;

        let errors = [
            Error::BoundaryNotReady,
            Error::BoundaryAlreadySet,
            Error::FlowControlViolation,
            Error::RegionMismatch,
            Error::UnexpectedRegion,
            Error::UnitNotEnabled,
            Error::LockNotSet,
            Error::InvalidLayout,
            Error::InvalidRegion,
            Error::RegionMisaligned,
            Error::RegionTableLocked,
            Error::RegionInUse,
            Error::HardwareFault,
            Error::PoolMisconfigured,
            Error::PoolExhausted,
            Error::InvalidChunk,
            Error::DoubleFree,
            Error::ConnectionRefused,
            Error::ConnectionBusy,
            Error::ProgrammerError,
            Error::InvalidSignal,
            Error::NoMessage,
            Error::InvalidMessageHandle,
            Error::InvalidVectorIndex,
            Error::WriteOverflow,
            Error::InvalidReplyStatus,
            Error::MessageNotReceived,
            Error::InvalidPartition,
            Error::InvalidConfig,
            Error::DuplicateService,
            Error::RegistryFull,
            Error::InvalidVersion,
            Error::InvalidParameter,
            Error::InvalidState,
            Error::NotSupported,
            Error::Internal,
        ];
        let codes: HashSet<u16> = errors.iter().map(Error::code).collect();
        assert_eq!(codes.len(), errors.len());
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_production_defaults() {
        let cfg = SpmConfig::default();
        assert_eq!(cfg.isolation.level, IsolationLevel::Level2);
        assert!(cfg.isolation.lock_boundaries);
        assert_eq!(cfg.ipc.ns_programmer_error, ProgrammerErrorPolicy::ReturnStatus);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_development_leaves_tables_unlocked() {
        assert!(!IsolationConfig::DEVELOPMENT.lock_boundaries);
        assert_eq!(SpmConfig::DEVELOPMENT.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_pool_size_bounds() {
        let mut cfg = SpmConfig::DEFAULT;
        cfg.ipc = IpcConfig {
            connection_pool_size: 0,
            ..IpcConfig::DEFAULT
        };
        assert_eq!(cfg.validate(), Err(Error::InvalidConfig));

        cfg.ipc.connection_pool_size = IpcConfig::DEFAULT.connection_pool_size + 1;
        assert_eq!(cfg.validate(), Err(Error::InvalidConfig));
    }

    #[test]
    fn test_level_capabilities() {
        assert!(!IsolationLevel::Level1.has_dynamic_boundary());
        assert!(IsolationLevel::Level3.has_dynamic_boundary());
        assert!(IsolationLevel::Level2.has_unprivileged_partitions());
    }
}

mod log_tests {
    use super::*;

    #[test]
    fn test_filtering_and_search() {
        let mut log: LogBuffer<4> = LogBuffer::with_level(LogLevel::Info);
        log_debug!(log, "ipc", "dropped");
        log_info!(log, "ipc", "router up: {} services", 3);
        log_warn!(log, "isolation", "lock skipped");

        assert_eq!(log.len(), 2);
        assert!(log.contains("ipc", "3 services"));
        assert!(!log.contains("isolation", "router"));
        assert_eq!(log.count_at(LogLevel::Warn), 1);
    }

    #[test]
    fn test_oldest_entries_evicted() {
        let mut log: LogBuffer<2> = LogBuffer::new();
        for i in 0..5 {
            log_info!(log, "ipc", "entry {}", i);
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.recorded(), 5);
        assert!(log.contains("ipc", "entry 4"));
        assert!(!log.contains("ipc", "entry 0"));
    }
}
