// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Service registry
//!
//! Built once at init from static partition and service tables and never
//! modified afterwards.

use heapless::Vec;
use q_common::constants::{MAX_PARTITIONS, MAX_PARTITION_DEPS, MAX_SERVICES, SIGNAL_RESERVED_MASK};
use q_common::{ClientId, Error, Handle, PartitionId, Result, Sid, Signal, VersionPolicy};

use crate::handle;

/// Static description of a secure partition
#[derive(Debug, Clone, Copy)]
pub struct PartitionDesc {
    /// Partition identifier
    pub id: PartitionId,
    /// Partition runs unprivileged
    pub unprivileged: bool,
    /// Services this partition may call
    pub deps: &'static [Sid],
}

/// Static description of a service
#[derive(Debug, Clone, Copy)]
pub struct ServiceDesc {
    /// Service identifier
    pub sid: Sid,
    /// Owning partition
    pub partition: PartitionId,
    /// Signal asserted on the owning partition when a message arrives
    pub signal: Signal,
    /// Service version
    pub version: u32,
    /// Version compatibility policy
    pub policy: VersionPolicy,
    /// Clients connect before calling; otherwise called via a static handle
    pub connection_based: bool,
    /// Non-secure clients may use the service
    pub non_secure_clients: bool,
}

/// Validated partition and service tables
#[derive(Debug)]
pub struct ServiceRegistry {
    partitions: Vec<PartitionDesc, MAX_PARTITIONS>,
    services: Vec<ServiceDesc, MAX_SERVICES>,
}

impl ServiceRegistry {
    /// Validate and copy the static tables
    ///
    /// # Errors
    ///
    /// - `Error::RegistryFull` if a table exceeds its bound
    /// - `Error::DuplicateService` for a repeated partition id, SID or
    ///   per-partition signal
    /// - `Error::InvalidPartition` if a service names an unknown partition
    /// - `Error::InvalidSignal` for a signal that is not a single
    ///   non-reserved bit
    /// - `Error::InvalidVersion` for a stateless service whose version
    ///   does not fit a static handle
    pub fn new(partitions: &[PartitionDesc], services: &[ServiceDesc]) -> Result<Self> {
        let mut registry = Self {
            partitions: Vec::new(),
            services: Vec::new(),
        };

        for p in partitions {
            if p.deps.len() > MAX_PARTITION_DEPS {
                return Err(Error::RegistryFull);
            }
            if registry.partition(p.id).is_some() {
                return Err(Error::DuplicateService);
            }
            registry.partitions.push(*p).map_err(|_| Error::RegistryFull)?;
        }

        for s in services {
            if registry.partition(s.partition).is_none() {
                return Err(Error::InvalidPartition);
            }
            if !s.signal.is_single() || s.signal.intersects(Signal(SIGNAL_RESERVED_MASK)) {
                return Err(Error::InvalidSignal);
            }
            let clash = registry.services.iter().any(|o| {
                o.sid == s.sid || (o.partition == s.partition && o.signal == s.signal)
            });
            if clash {
                return Err(Error::DuplicateService);
            }
            if !s.connection_based && handle::encode(registry.services.len(), s.version).is_none() {
                return Err(Error::InvalidVersion);
            }
            registry.services.push(*s).map_err(|_| Error::RegistryFull)?;
        }

        Ok(registry)
    }

    /// All partitions
    #[must_use]
    pub fn partitions(&self) -> &[PartitionDesc] {
        &self.partitions
    }

    /// All services
    #[must_use]
    pub fn services(&self) -> &[ServiceDesc] {
        &self.services
    }

    /// Look up a partition
    #[must_use]
    pub fn partition(&self, id: PartitionId) -> Option<&PartitionDesc> {
        self.partitions.iter().find(|p| p.id == id)
    }

    /// Table position of a partition
    #[must_use]
    pub fn partition_index(&self, id: PartitionId) -> Option<usize> {
        self.partitions.iter().position(|p| p.id == id)
    }

    /// Look up a service by SID, with its table position
    #[must_use]
    pub fn find(&self, sid: Sid) -> Option<(usize, &ServiceDesc)> {
        self.services.iter().enumerate().find(|(_, s)| s.sid == sid)
    }

    /// Service at a table position
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ServiceDesc> {
        self.services.get(index)
    }

    /// Service of `partition` bound to `signal`
    #[must_use]
    pub fn by_signal(&self, partition: PartitionId, signal: Signal) -> Option<(usize, &ServiceDesc)> {
        self.services
            .iter()
            .enumerate()
            .find(|(_, s)| s.partition == partition && s.signal == signal)
    }

    /// Union of the service signals of a partition
    #[must_use]
    pub fn service_signals(&self, partition: PartitionId) -> Signal {
        self.services
            .iter()
            .filter(|s| s.partition == partition)
            .fold(Signal::NONE, |acc, s| acc.union(s.signal))
    }

    /// Static handle of a stateless service
    ///
    /// `None` for connection-based or unknown services.
    #[must_use]
    pub fn static_handle(&self, sid: Sid) -> Option<Handle> {
        let (index, s) = self.find(sid)?;
        if s.connection_based {
            return None;
        }
        handle::encode(index, s.version)
    }

    /// Resolve a static handle to its service and the version it carries
    #[must_use]
    pub fn resolve_static(&self, h: Handle) -> Option<(usize, &ServiceDesc, u32)> {
        let (index, version) = handle::decode(h)?;
        let s = self.get(index)?;
        if s.connection_based {
            return None;
        }
        Some((index, s, version))
    }

    /// Check if `client` may use `service`
    ///
    /// Non-secure clients need the service flag. Secure clients need the
    /// SID in their partition's dependency list.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn is_authorized(&self, client: ClientId, service: &ServiceDesc) -> bool {
        if client.is_non_secure() {
            return service.non_secure_clients;
        }
        self.partition(PartitionId(client.0 as u32))
            .is_some_and(|p| p.deps.contains(&service.sid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT: PartitionDesc = PartitionDesc {
        id: PartitionId(5),
        unprivileged: true,
        deps: &[Sid(7), Sid(9)],
    };

    const SERVER: PartitionDesc = PartitionDesc {
        id: PartitionId(1),
        unprivileged: false,
        deps: &[],
    };

    fn service(sid: u32, signal: u32, connection_based: bool) -> ServiceDesc {
        ServiceDesc {
            sid: Sid(sid),
            partition: PartitionId(1),
            signal: Signal(signal),
            version: 1,
            policy: VersionPolicy::Strict,
            connection_based,
            non_secure_clients: false,
        }
    }

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new(&[SERVER, CLIENT], &[service(7, 1 << 4, true), service(9, 1 << 5, false)])
            .unwrap()
    }

    #[test]
    fn test_lookup() {
        let r = registry();
        assert_eq!(r.find(Sid(9)).map(|(i, _)| i), Some(1));
        assert!(r.find(Sid(8)).is_none());
        assert_eq!(r.by_signal(PartitionId(1), Signal(1 << 4)).map(|(_, s)| s.sid), Some(Sid(7)));
        assert_eq!(r.service_signals(PartitionId(1)), Signal(0x30));
        assert_eq!(r.partition_index(PartitionId(5)), Some(1));
    }

    #[test]
    fn test_static_handles_only_for_stateless() {
        let r = registry();
        assert!(r.static_handle(Sid(7)).is_none());
        let h = r.static_handle(Sid(9)).unwrap();
        let (index, s, version) = r.resolve_static(h).unwrap();
        assert_eq!((index, s.sid, version), (1, Sid(9), 1));
        assert!(r.resolve_static(handle::encode(0, 1).unwrap()).is_none());
    }

    #[test]
    fn test_authorization() {
        let r = registry();
        let (_, s) = r.find(Sid(7)).unwrap();
        assert!(r.is_authorized(ClientId(5), s));
        assert!(!r.is_authorized(ClientId(1), s));
        assert!(!r.is_authorized(ClientId(-1), s));
        assert!(!r.is_authorized(ClientId(42), s));
    }

    #[test]
    fn test_invalid_tables_rejected() {
        assert_eq!(
            ServiceRegistry::new(&[SERVER], &[service(7, 1 << 4, true), service(7, 1 << 5, true)]).err(),
            Some(Error::DuplicateService)
        );
        assert_eq!(
            ServiceRegistry::new(&[SERVER], &[service(7, 1 << 4, true), service(8, 1 << 4, true)]).err(),
            Some(Error::DuplicateService)
        );
        assert_eq!(
            ServiceRegistry::new(&[SERVER], &[service(7, 0x30, true)]).err(),
            Some(Error::InvalidSignal)
        );
        assert_eq!(
            ServiceRegistry::new(&[SERVER], &[service(7, 1 << 3, true)]).err(),
            Some(Error::InvalidSignal)
        );
        assert_eq!(
            ServiceRegistry::new(&[CLIENT], &[service(7, 1 << 4, true)]).err(),
            Some(Error::InvalidPartition)
        );
        assert_eq!(ServiceRegistry::new(&[SERVER, SERVER], &[]).err(), Some(Error::DuplicateService));

        let wide = ServiceDesc {
            version: 0x100,
            ..service(9, 1 << 5, false)
        };
        assert_eq!(ServiceRegistry::new(&[SERVER], &[wide]).err(), Some(Error::InvalidVersion));
        let connected = ServiceDesc {
            connection_based: true,
            ..wide
        };
        assert!(ServiceRegistry::new(&[SERVER], &[connected]).is_ok());
    }
}
