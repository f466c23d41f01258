// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Qbitel Secure Partition Manager IPC
//!
//! Brokers requests between isolated partitions:
//!
//! - [`Pool`]: fixed-capacity connection/message pool with obfuscated
//!   external handles
//! - [`ServiceRegistry`]: static service and partition tables
//! - [`MessageRouter`]: client `connect`/`call`/`close`, their non-secure
//!   RPC variants, and the service-side `wait`/`get`/`read`/`write`/`reply`
//!
//! The router owns no thread and no memory of its own. The running
//! partition, blocking and wakes come from a [`Scheduler`]; client buffers
//! are checked by an [`AccessPolicy`] and moved through [`ClientMemory`].
//!
//! # Security
//!
//! - Client handles never expose pool addresses
//! - Vector descriptors are copied before any buffer they name is checked
//! - Freed chunks are zeroized
//!
//! [`AccessPolicy`]: q_isolation::AccessPolicy

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod handle;
pub mod memory;
pub mod message;
pub mod pool;
pub mod router;
pub mod rpc;
pub mod scheduler;
pub mod service;
pub mod service_api;

pub use memory::{ClientMemory, IoVec};
pub use message::ConnectionStatus;
pub use pool::{Chunk, Pool};
pub use router::{ConnectionPool, MessageRouter, RpcCaller, VecTable};
pub use rpc::{NoRpc, RpcClient};
pub use scheduler::{EventId, Scheduler};
pub use service::{PartitionDesc, ServiceDesc, ServiceRegistry};
pub use service_api::MessageInfo;
