// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! IPC Message Router
//!
//! Client entry points: `connect`, `call` and `close` for secure
//! partitions, plus their asynchronous `rpc_*` counterparts for requests
//! forwarded from the non-secure world.
//!
//! # Connection lifecycle
//!
//! ```text
//! IDLE --call--> ACTIVE --reply--> IDLE
//!   \                     \
//!    \--close--> ACTIVE    \--reply(PROGRAMMER_ERROR)--> CONNECT_ERROR
//! ```
//!
//! # Locking
//!
//! The pool, the per-partition message queues and the per-service open
//! connection lists live behind one lock. The lock is never held while a
//! partition blocks, and scheduler wakes and RPC completions are issued
//! after it is released.

use heapless::Vec;
use q_common::config::{IpcConfig, ProgrammerErrorPolicy};
use q_common::constants::{
    CONN_HANDLE_MAX_NUM, FRAMEWORK_VERSION, MAX_IOVEC, MAX_PARTITIONS, MAX_SERVICES, MSG_MAGIC,
    VERSION_NONE,
};
use q_common::log::LogBuffer;
use q_common::{
    log_debug, log_error, log_info, log_warn, ClientId, Error, Handle, MessageType, PartitionId, Result, Sid,
    Signal, Status,
};
use q_isolation::access::last_byte;
use q_isolation::{AccessAttr, AccessPolicy};
use spin::Mutex;

use crate::memory::{ClientMemory, IoVec, IOVEC_SIZE};
use crate::message::{Connection, ConnectionStatus, Message, ReplyTo};
use crate::pool::{Chunk, Pool};
use crate::rpc::{NoRpc, RpcClient};
use crate::scheduler::{EventId, Scheduler};
use crate::service::ServiceRegistry;

pub(crate) const MODULE: &str = "ipc";

/// Connection pool of the router
pub type ConnectionPool = Pool<Connection, CONN_HANDLE_MAX_NUM>;

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct PartitionState {
    /// Asserted signals
    pub(crate) asserted: Signal,
    /// Signals the partition is blocked on
    pub(crate) waiting: Signal,
    /// Messages in enqueue order
    pub(crate) queue: Vec<Chunk, CONN_HANDLE_MAX_NUM>,
}

impl PartitionState {
    /// Assert `signal`, returning the wake to issue if the partition waits on it
    pub(crate) fn assert_signal(&mut self, id: PartitionId, signal: Signal) -> Option<EventId> {
        self.asserted = self.asserted.union(signal);
        if self.waiting.intersects(signal) {
            self.waiting = Signal::NONE;
            return Some(EventId::Partition(id));
        }
        None
    }
}

pub(crate) struct State {
    pub(crate) pool: ConnectionPool,
    pub(crate) partitions: Vec<PartitionState, MAX_PARTITIONS>,
    pub(crate) open: Vec<Vec<Chunk, CONN_HANDLE_MAX_NUM>, MAX_SERVICES>,
    pub(crate) log: LogBuffer,
}

impl State {
    /// Return a chunk to the pool and drop it from its service's open list
    pub(crate) fn release(&mut self, chunk: Chunk) -> Result<()> {
        let service = self.pool.get(chunk).ok_or(Error::Internal)?.service;
        if let Some(open) = self.open.get_mut(service) {
            if let Some(pos) = open.iter().position(|c| *c == chunk) {
                open.remove(pos);
            }
        }
        self.pool.free(chunk)
    }

    /// Undo a prepared message that never reached its queue
    ///
    /// Chunks allocated for the request are released; an existing
    /// connection goes back to idle.
    pub(crate) fn abandon(&mut self, chunk: Chunk) {
        let Some(conn) = self.pool.get_mut(chunk) else {
            return;
        };
        if conn.stateless || conn.msg.msg_type == Some(MessageType::Connect) {
            let _ = self.release(chunk);
        } else {
            conn.status = ConnectionStatus::Idle;
            conn.msg = Message::default();
        }
    }

    /// Collect the outcome of an acknowledged message
    ///
    /// Frees the chunk for a finished stateless call, a refused connect
    /// and a disconnect.
    pub(crate) fn finish(&mut self, chunk: Chunk) -> Result<Outcome> {
        let conn = self.pool.get_mut(chunk).ok_or(Error::Internal)?;
        let status = conn.msg.ack.take().ok_or(Error::Internal)?;
        let msg_type = conn.msg.msg_type.ok_or(Error::Internal)?;

        let mut outcome = Outcome {
            status,
            out_len: conn.msg.written,
            out_count: conn.msg.out_count,
        };

        let release = match msg_type {
            MessageType::Connect => {
                if status == Status::SUCCESS {
                    conn.status = ConnectionStatus::Idle;
                    outcome.status = Status(conn.handle);
                    false
                } else {
                    true
                }
            }
            MessageType::Call(_) => {
                if conn.status == ConnectionStatus::Active {
                    conn.status = ConnectionStatus::Idle;
                }
                conn.stateless
            }
            MessageType::Disconnect => true,
        };

        if release {
            self.release(chunk)?;
        }
        Ok(outcome)
    }
}

/// Client-visible result of one request
#[derive(Debug, Clone, Copy)]
pub(crate) struct Outcome {
    pub(crate) status: Status,
    pub(crate) out_len: [u32; MAX_IOVEC],
    pub(crate) out_count: usize,
}

impl Outcome {
    pub(crate) fn out_len(&self) -> &[u32] {
        &self.out_len[..self.out_count]
    }
}

/// Identity and permissions of the requesting client
#[derive(Debug, Clone, Copy)]
struct Caller {
    client: ClientId,
    attrs: AccessAttr,
    reply_to: ReplyTo,
}

/// Non-secure request context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcCaller {
    /// Non-secure client identity (negative)
    pub client: ClientId,
    /// Token handed back with the completion
    pub token: u32,
}

/// Vector descriptor table in client memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VecTable {
    /// Client address of the first descriptor
    pub addr: u32,
    /// Number of descriptors
    pub count: usize,
}

impl VecTable {
    /// Descriptor table at `addr`
    #[must_use]
    pub const fn new(addr: u32, count: usize) -> Self {
        Self { addr, count }
    }
}

// =============================================================================
// Router
// =============================================================================

/// IPC message router
pub struct MessageRouter<S, P, M, R = NoRpc> {
    registry: ServiceRegistry,
    pub(crate) scheduler: S,
    policy: P,
    pub(crate) memory: M,
    pub(crate) rpc: R,
    ns_programmer_error: ProgrammerErrorPolicy,
    pub(crate) state: Mutex<State>,
}

impl<S, P, M, R> MessageRouter<S, P, M, R>
where
    S: Scheduler,
    P: AccessPolicy,
    M: ClientMemory,
    R: RpcClient,
{
    /// Create a router over a validated registry
    ///
    /// # Errors
    ///
    /// `Error::PoolMisconfigured` if the configured pool size is zero or
    /// above [`CONN_HANDLE_MAX_NUM`].
    pub fn new(
        config: &IpcConfig,
        registry: ServiceRegistry,
        scheduler: S,
        policy: P,
        memory: M,
        rpc: R,
    ) -> Result<Self> {
        let capacity = config.connection_pool_size;
        let pool = ConnectionPool::new(capacity, ConnectionPool::required_size(capacity))?;

        let mut partitions = Vec::new();
        for _ in registry.partitions() {
            partitions
                .push(PartitionState::default())
                .map_err(|_| Error::RegistryFull)?;
        }
        let mut open = Vec::new();
        for _ in registry.services() {
            open.push(Vec::new()).map_err(|_| Error::RegistryFull)?;
        }

        let mut log = LogBuffer::new();
        log_info!(
            log,
            MODULE,
            "router up: {} services, {} connections",
            registry.services().len(),
            capacity
        );

        Ok(Self {
            registry,
            scheduler,
            policy,
            memory,
            rpc,
            ns_programmer_error: config.ns_programmer_error,
            state: Mutex::new(State {
                pool,
                partitions,
                open,
                log,
            }),
        })
    }

    /// Service registry
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Number of free connection chunks
    pub fn free_connections(&self) -> usize {
        self.state.lock().pool.free_count()
    }

    /// Number of open connections of a service
    pub fn open_connections(&self, sid: Sid) -> Option<usize> {
        let (index, _) = self.registry.find(sid)?;
        self.state.lock().open.get(index).map(|v| v.len())
    }

    /// Inspect the router event log
    pub fn with_log<T>(&self, f: impl FnOnce(&LogBuffer) -> T) -> T {
        f(&self.state.lock().log)
    }

    // =========================================================================
    // Secure Client API
    // =========================================================================

    /// Framework version
    #[must_use]
    pub const fn framework_version(&self) -> u32 {
        FRAMEWORK_VERSION
    }

    /// Version of a service visible to the running partition
    ///
    /// `VERSION_NONE` for unknown or inaccessible services.
    pub fn version(&self, sid: Sid) -> u32 {
        match self.secure_caller() {
            Ok(caller) => self.visible_version(caller.client, sid),
            Err(_) => VERSION_NONE,
        }
    }

    /// Connect to a connection-based service
    ///
    /// Blocks until the service accepts or rejects the connection.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionRefused` for an unknown SID, a caller without
    ///   access, a version mismatch, or a service refusal
    /// - `Error::ProgrammerError` for a stateless service
    /// - `Error::ConnectionBusy` when the pool is exhausted or the service
    ///   reports busy
    pub fn connect(&self, sid: Sid, version: u32) -> Result<Handle> {
        let caller = self.secure_caller()?;
        let chunk = self.submit(|st| self.prepare_connect(st, &caller, sid, version))?;
        let outcome = self.wait_ack(chunk)?;
        match outcome.status {
            Status::CONNECTION_REFUSED => Err(Error::ConnectionRefused),
            Status::CONNECTION_BUSY => Err(Error::ConnectionBusy),
            status => Ok(Handle(status.0)),
        }
    }

    /// Send a request over a connection or a static handle
    ///
    /// Blocks until the service replies, then stores the written lengths
    /// in `out_vecs` and returns the service status.
    ///
    /// # Errors
    ///
    /// - `Error::ProgrammerError` for bad vectors, handles or states
    /// - `Error::ConnectionRefused` if the caller may not use a stateless
    ///   service
    /// - `Error::ConnectionBusy` if no chunk is free for a stateless call
    pub fn call(
        &self,
        handle: Handle,
        msg_type: i32,
        in_vecs: &[IoVec],
        out_vecs: &mut [IoVec],
    ) -> Result<Status> {
        let caller = self.secure_caller()?;
        let chunk = self.submit(|st| {
            self.prepare_call(st, &caller, handle, msg_type, in_vecs, out_vecs, None)
        })?;
        let outcome = self.wait_ack(chunk)?;
        for (v, len) in out_vecs.iter_mut().zip(outcome.out_len()) {
            v.len = *len;
        }
        Ok(outcome.status)
    }

    /// Close a connection
    ///
    /// The null handle is accepted and ignored. Blocks until the service
    /// has seen the disconnect.
    ///
    /// # Errors
    ///
    /// `Error::ProgrammerError` for static handles, handles not owned by
    /// the caller and connections with an outstanding call.
    pub fn close(&self, handle: Handle) -> Result<()> {
        if handle.is_null() {
            return Ok(());
        }
        let caller = self.secure_caller()?;
        let chunk = self.submit(|st| self.prepare_close(st, &caller, handle))?;
        self.wait_ack(chunk).map(|_| ())
    }

    // =========================================================================
    // Non-secure Client API
    // =========================================================================

    /// Version of a service visible to a non-secure client
    pub fn rpc_version(&self, client: ClientId, sid: Sid) -> u32 {
        if !client.is_non_secure() {
            return VERSION_NONE;
        }
        self.visible_version(client, sid)
    }

    /// Queue a connect on behalf of a non-secure client
    ///
    /// The outcome is delivered through the [`RpcClient`]; a successful
    /// connect reports the handle value as status.
    ///
    /// # Errors
    ///
    /// Same checks as [`MessageRouter::connect`], plus
    /// `Error::ProgrammerError` for a secure client identity.
    pub fn rpc_connect(&self, caller: RpcCaller, sid: Sid, version: u32) -> Result<()> {
        let result = self.rpc_caller(caller).and_then(|c| {
            self.submit(|st| self.prepare_connect(st, &c, sid, version))
        });
        self.ns_result(caller.client, result.map(|_| ()))
    }

    /// Queue a call on behalf of a non-secure client
    ///
    /// Both descriptor tables are read from client memory once, before any
    /// buffer they name is checked. The written lengths are stored back
    /// into the output table on completion.
    ///
    /// # Errors
    ///
    /// Same checks as [`MessageRouter::call`], plus `Error::ProgrammerError`
    /// for inaccessible descriptor tables.
    pub fn rpc_call(
        &self,
        caller: RpcCaller,
        handle: Handle,
        msg_type: i32,
        inputs: VecTable,
        outputs: VecTable,
    ) -> Result<()> {
        let result = self.rpc_caller(caller).and_then(|c| {
            if inputs.count > MAX_IOVEC
                || outputs.count > MAX_IOVEC
                || inputs.count + outputs.count > MAX_IOVEC
            {
                return Err(Error::ProgrammerError);
            }
            let in_vecs = self.read_table(inputs, AccessAttr::READ, &c)?;
            let out_vecs = self.read_table(outputs, AccessAttr::READ_WRITE, &c)?;
            self.submit(|st| {
                self.prepare_call(
                    st,
                    &c,
                    handle,
                    msg_type,
                    &in_vecs,
                    &out_vecs,
                    Some(outputs.addr),
                )
            })
        });
        self.ns_result(caller.client, result.map(|_| ()))
    }

    /// Queue a close on behalf of a non-secure client
    ///
    /// # Errors
    ///
    /// Same checks as [`MessageRouter::close`].
    pub fn rpc_close(&self, caller: RpcCaller, handle: Handle) -> Result<()> {
        if handle.is_null() {
            return Ok(());
        }
        let result = self
            .rpc_caller(caller)
            .and_then(|c| self.submit(|st| self.prepare_close(st, &c, handle)));
        self.ns_result(caller.client, result.map(|_| ()))
    }

    // =========================================================================
    // Request Preparation
    // =========================================================================

    fn secure_caller(&self) -> Result<Caller> {
        let id = self.scheduler.current_partition();
        let partition = self.registry.partition(id).ok_or(Error::InvalidPartition)?;
        let attrs = if partition.unprivileged {
            AccessAttr::UNPRIVILEGED
        } else {
            AccessAttr::empty()
        };
        Ok(Caller {
            client: id.client_id(),
            attrs,
            reply_to: ReplyTo::Blocking(id),
        })
    }

    #[allow(clippy::unused_self)]
    fn rpc_caller(&self, caller: RpcCaller) -> Result<Caller> {
        if !caller.client.is_non_secure() {
            return Err(Error::ProgrammerError);
        }
        Ok(Caller {
            client: caller.client,
            attrs: AccessAttr::NON_SECURE,
            reply_to: ReplyTo::Rpc(caller.token),
        })
    }

    fn ns_result(&self, client: ClientId, result: Result<()>) -> Result<()> {
        if result == Err(Error::ProgrammerError)
            && self.ns_programmer_error == ProgrammerErrorPolicy::TerminateClient
        {
            log_warn!(self.state.lock().log, MODULE, "terminating client {}", client.0);
            self.scheduler.terminate_client(client);
        }
        result
    }

    fn visible_version(&self, client: ClientId, sid: Sid) -> u32 {
        match self.registry.find(sid) {
            Some((_, service)) if self.registry.is_authorized(client, service) => service.version,
            _ => VERSION_NONE,
        }
    }

    fn check_buffer(&self, v: &IoVec, attr: AccessAttr) -> Result<()> {
        if v.len == 0 {
            return Ok(());
        }
        if last_byte(v.base, v.len).is_none() || !self.policy.has_access(v.base, v.len, attr) {
            return Err(Error::ProgrammerError);
        }
        Ok(())
    }

    fn read_table(&self, table: VecTable, attr: AccessAttr, caller: &Caller) -> Result<Vec<IoVec, MAX_IOVEC>> {
        let mut vecs = Vec::new();
        if table.count == 0 {
            return Ok(vecs);
        }
        let size = u32::try_from(table.count)
            .ok()
            .and_then(|n| n.checked_mul(IOVEC_SIZE))
            .ok_or(Error::ProgrammerError)?;
        self.check_buffer(&IoVec::new(table.addr, size), attr | caller.attrs)?;

        let mut raw = [0u8; MAX_IOVEC * IOVEC_SIZE as usize];
        let raw = raw.get_mut(..size as usize).ok_or(Error::ProgrammerError)?;
        self.memory
            .read(table.addr, raw)
            .map_err(|_| Error::ProgrammerError)?;
        for bytes in raw.chunks_exact(IOVEC_SIZE as usize) {
            let bytes: [u8; 8] = bytes.try_into().map_err(|_| Error::Internal)?;
            vecs.push(IoVec::from_le_bytes(bytes))
                .map_err(|_| Error::ProgrammerError)?;
        }
        Ok(vecs)
    }

    /// Run `prepare` under the lock, enqueue the message, then wake
    fn submit(&self, prepare: impl FnOnce(&mut State) -> Result<Chunk>) -> Result<Chunk> {
        let (chunk, wake) = {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            let chunk = match prepare(st) {
                Ok(chunk) => chunk,
                Err(e) => {
                    log_warn!(st.log, MODULE, "request rejected: {}", e);
                    return Err(e);
                }
            };
            match self.send(st, chunk) {
                Ok(wake) => (chunk, wake),
                Err(e) => {
                    log_error!(st.log, MODULE, "enqueue failed: {}", e);
                    st.abandon(chunk);
                    return Err(e);
                }
            }
        };
        if let Some(event) = wake {
            self.scheduler.wake(event);
        }
        Ok(chunk)
    }

    /// Append a prepared message to its partition queue and assert the signal
    fn send(&self, st: &mut State, chunk: Chunk) -> Result<Option<EventId>> {
        let index = st.pool.get(chunk).ok_or(Error::Internal)?.service;
        let service = self.registry.get(index).ok_or(Error::Internal)?;
        let partition = self
            .registry
            .partition_index(service.partition)
            .and_then(|i| st.partitions.get_mut(i))
            .ok_or(Error::Internal)?;
        partition.queue.push(chunk).map_err(|_| Error::Internal)?;
        log_debug!(st.log, MODULE, "queued to {} ({})", service.partition, service.sid);
        Ok(partition.assert_signal(service.partition, service.signal))
    }

    /// Block until the message in `chunk` is acknowledged
    fn wait_ack(&self, chunk: Chunk) -> Result<Outcome> {
        loop {
            self.scheduler.wait_on(EventId::Ack(chunk));
            let mut st = self.state.lock();
            let acked = st.pool.get(chunk).is_some_and(|c| c.msg.ack.is_some());
            if acked {
                return st.finish(chunk);
            }
        }
    }

    fn prepare_connect(&self, st: &mut State, caller: &Caller, sid: Sid, version: u32) -> Result<Chunk> {
        let (index, service) = self.registry.find(sid).ok_or(Error::ConnectionRefused)?;
        if !self.registry.is_authorized(caller.client, service) {
            return Err(Error::ConnectionRefused);
        }
        if !service.policy.accepts(version, service.version) {
            return Err(Error::ConnectionRefused);
        }
        if !service.connection_based {
            return Err(Error::ProgrammerError);
        }

        let chunk = st.pool.alloc().ok_or(Error::ConnectionBusy)?;
        let handle = st.pool.to_external_handle(chunk);
        let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;
        *conn = Connection {
            magic: MSG_MAGIC,
            service: index,
            client: caller.client.0,
            handle: handle.0,
            status: ConnectionStatus::Active,
            stateless: false,
            rhandle: 0,
            msg: Message::new(MessageType::Connect, caller.reply_to),
        };
        st.open
            .get_mut(index)
            .ok_or(Error::Internal)?
            .push(chunk)
            .map_err(|_| Error::Internal)?;
        Ok(chunk)
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare_call(
        &self,
        st: &mut State,
        caller: &Caller,
        handle: Handle,
        msg_type: i32,
        in_vecs: &[IoVec],
        out_vecs: &[IoVec],
        caller_outvec: Option<u32>,
    ) -> Result<Chunk> {
        if msg_type < 0
            || in_vecs.len() > MAX_IOVEC
            || out_vecs.len() > MAX_IOVEC
            || in_vecs.len() + out_vecs.len() > MAX_IOVEC
        {
            return Err(Error::ProgrammerError);
        }

        // Resolve the target before touching any buffer
        let stateless = if handle.is_static() {
            let (index, service, version) = self
                .registry
                .resolve_static(handle)
                .ok_or(Error::ProgrammerError)?;
            if !self.registry.is_authorized(caller.client, service) {
                return Err(Error::ConnectionRefused);
            }
            if !service.policy.accepts(version, service.version) {
                return Err(Error::ProgrammerError);
            }
            Some(index)
        } else {
            let chunk = Self::connection(st, handle, caller.client)?;
            let status = st.pool.get(chunk).map(|c| c.status);
            if status != Some(ConnectionStatus::Idle) {
                return Err(Error::ProgrammerError);
            }
            None
        };

        // Copies only from here on
        let mut invec = [IoVec::default(); MAX_IOVEC];
        let mut outvec = [IoVec::default(); MAX_IOVEC];
        invec[..in_vecs.len()].copy_from_slice(in_vecs);
        outvec[..out_vecs.len()].copy_from_slice(out_vecs);
        let invec = &invec[..in_vecs.len()];
        let outvec = &outvec[..out_vecs.len()];

        for v in invec {
            self.check_buffer(v, AccessAttr::READ | caller.attrs)?;
        }
        for (i, a) in invec.iter().enumerate() {
            if invec[i + 1..].iter().any(|b| a.overlaps(b)) {
                return Err(Error::ProgrammerError);
            }
        }
        for v in outvec {
            self.check_buffer(v, AccessAttr::READ_WRITE | caller.attrs)?;
        }

        let chunk = match stateless {
            Some(index) => {
                let chunk = st.pool.alloc().ok_or(Error::ConnectionBusy)?;
                let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;
                *conn = Connection {
                    magic: MSG_MAGIC,
                    service: index,
                    client: caller.client.0,
                    handle: handle.0,
                    stateless: true,
                    ..Connection::default()
                };
                chunk
            }
            None => Self::connection(st, handle, caller.client)?,
        };

        let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;
        let mut msg = Message::new(MessageType::Call(msg_type), caller.reply_to);
        msg.invec[..invec.len()].copy_from_slice(invec);
        msg.outvec[..outvec.len()].copy_from_slice(outvec);
        msg.in_count = invec.len();
        msg.out_count = outvec.len();
        msg.caller_outvec = caller_outvec;
        conn.msg = msg;
        conn.status = ConnectionStatus::Active;
        Ok(chunk)
    }

    fn prepare_close(&self, st: &mut State, caller: &Caller, handle: Handle) -> Result<Chunk> {
        if handle.is_static() {
            return Err(Error::ProgrammerError);
        }
        let chunk = Self::connection(st, handle, caller.client)?;
        let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;
        if conn.status == ConnectionStatus::Active {
            return Err(Error::ProgrammerError);
        }
        conn.status = ConnectionStatus::Active;
        conn.msg = Message::new(MessageType::Disconnect, caller.reply_to);
        log_debug!(st.log, MODULE, "close 0x{:08X}", handle.0);
        Ok(chunk)
    }

    /// Validate a connection handle presented by `client`
    fn connection(st: &State, handle: Handle, client: ClientId) -> Result<Chunk> {
        let chunk = st
            .pool
            .from_external_handle(handle)
            .ok_or(Error::ProgrammerError)?;
        let conn = st.pool.get(chunk).ok_or(Error::ProgrammerError)?;
        if conn.magic != MSG_MAGIC
            || conn.stateless
            || conn.handle != handle.0
            || conn.client != client.0
        {
            return Err(Error::ProgrammerError);
        }
        Ok(chunk)
    }
}
