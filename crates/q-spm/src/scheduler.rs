// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Scheduler interface
//!
//! The router never schedules anything itself. It asks the scheduler which
//! partition is running and blocks or wakes partitions on events.

use q_common::{ClientId, PartitionId};

use crate::pool::Chunk;

/// Something a partition can block on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    /// A signal of the partition was asserted
    Partition(PartitionId),
    /// The message held in a pool chunk was acknowledged
    Ack(Chunk),
}

/// Scheduler services consumed by the router
///
/// A `wake` that arrives before the matching `wait_on` must not be lost:
/// the next `wait_on` of that event returns immediately.
pub trait Scheduler {
    /// Partition currently running on behalf of a secure caller
    fn current_partition(&self) -> PartitionId;

    /// Block the running partition until `event` is woken
    fn wait_on(&self, event: EventId);

    /// Wake the partition blocked on `event`
    fn wake(&self, event: EventId);

    /// Terminate the context of an offending non-secure client
    fn terminate_client(&self, _client: ClientId) {}
}

impl<T: Scheduler + ?Sized> Scheduler for &T {
    fn current_partition(&self) -> PartitionId {
        (**self).current_partition()
    }

    fn wait_on(&self, event: EventId) {
        (**self).wait_on(event);
    }

    fn wake(&self, event: EventId) {
        (**self).wake(event);
    }

    fn terminate_client(&self, client: ClientId) {
        (**self).terminate_client(client);
    }
}
