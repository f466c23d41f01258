// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Service-side API
//!
//! Called by service partitions to wait for signals, retrieve messages,
//! move payload bytes and reply. The running partition is taken from the
//! scheduler; message handles are only valid for the partition that owns
//! the target service.

use q_common::constants::{MAX_IOVEC, MSG_MAGIC, SIGNAL_DOORBELL};
use q_common::{log_debug, ClientId, Error, Handle, MessageType, PartitionId, Result, Sid, Signal, Status};
use q_isolation::AccessPolicy;

use crate::memory::{ClientMemory, IOVEC_SIZE};
use crate::message::{ConnectionStatus, ReplyTo};
use crate::pool::Chunk;
use crate::router::{MessageRouter, State, MODULE};
use crate::rpc::RpcClient;
use crate::scheduler::{EventId, Scheduler};

const DOORBELL: Signal = Signal(SIGNAL_DOORBELL);

/// Message as seen by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    /// Message handle for the remaining service calls
    pub handle: Handle,
    /// Request type
    pub msg_type: MessageType,
    /// Requesting client
    pub client_id: ClientId,
    /// Target service
    pub sid: Sid,
    /// Sizes of the input vectors
    pub in_size: [u32; MAX_IOVEC],
    /// Sizes of the output vectors
    pub out_size: [u32; MAX_IOVEC],
    /// Reverse handle of the connection
    pub rhandle: usize,
}

impl<S, P, M, R> MessageRouter<S, P, M, R>
where
    S: Scheduler,
    P: AccessPolicy,
    M: ClientMemory,
    R: RpcClient,
{
    /// Wait for any signal in `mask`
    ///
    /// Returns the asserted subset of `mask`. Without `block`, an empty set
    /// is returned when nothing is asserted.
    ///
    /// # Errors
    ///
    /// `Error::InvalidSignal` if `mask` names no signal of the running
    /// partition.
    pub fn wait(&self, mask: Signal, block: bool) -> Result<Signal> {
        let id = self.scheduler.current_partition();
        let index = self.registry().partition_index(id).ok_or(Error::InvalidPartition)?;
        let mask = mask.intersection(self.registry().service_signals(id).union(DOORBELL));
        if mask.is_empty() {
            return Err(Error::InvalidSignal);
        }

        loop {
            {
                let mut st = self.state.lock();
                let partition = st.partitions.get_mut(index).ok_or(Error::Internal)?;
                let hit = partition.asserted.intersection(mask);
                if !hit.is_empty() || !block {
                    partition.waiting = Signal::NONE;
                    return Ok(hit);
                }
                partition.waiting = mask;
            }
            self.scheduler.wait_on(EventId::Partition(id));
        }
    }

    /// Retrieve the oldest message for a service signal
    ///
    /// The signal stays asserted while more messages for it are queued.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidSignal` if `signal` is not a single service signal
    ///   of the running partition
    /// - `Error::NoMessage` if the signal is not asserted
    pub fn get(&self, signal: Signal) -> Result<MessageInfo> {
        let id = self.scheduler.current_partition();
        let index = self.registry().partition_index(id).ok_or(Error::InvalidPartition)?;
        if !signal.is_single() {
            return Err(Error::InvalidSignal);
        }
        let (service_index, service) = self
            .registry()
            .by_signal(id, signal)
            .ok_or(Error::InvalidSignal)?;

        let mut guard = self.state.lock();
        let st = &mut *guard;
        let partition = st.partitions.get_mut(index).ok_or(Error::Internal)?;
        if !partition.asserted.contains(signal) {
            return Err(Error::NoMessage);
        }

        let for_service = |c: &Chunk| st.pool.get(*c).is_some_and(|conn| conn.service == service_index);
        let Some(pos) = partition.queue.iter().position(for_service) else {
            partition.asserted = partition.asserted.without(signal);
            return Err(Error::NoMessage);
        };
        let chunk = partition.queue.remove(pos);
        if !partition.queue.iter().any(for_service) {
            partition.asserted = partition.asserted.without(signal);
        }

        let handle = st.pool.to_external_handle(chunk);
        let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;
        conn.msg.received = true;
        let mut info = MessageInfo {
            handle,
            msg_type: conn.msg.msg_type.ok_or(Error::Internal)?,
            client_id: ClientId(conn.client),
            sid: service.sid,
            in_size: [0; MAX_IOVEC],
            out_size: [0; MAX_IOVEC],
            rhandle: conn.rhandle,
        };
        for (size, v) in info.in_size.iter_mut().zip(&conn.msg.invec[..conn.msg.in_count]) {
            *size = v.len;
        }
        for (size, v) in info.out_size.iter_mut().zip(&conn.msg.outvec[..conn.msg.out_count]) {
            *size = v.len;
        }
        log_debug!(st.log, MODULE, "{} got {:?} from {}", id, info.msg_type, conn.client);
        Ok(info)
    }

    /// Read from an input vector
    ///
    /// Continues where the previous read or skip stopped and returns the
    /// number of bytes copied.
    ///
    /// # Errors
    ///
    /// `Error::InvalidMessageHandle`, `Error::MessageNotReceived` or
    /// `Error::InvalidVectorIndex`.
    pub fn read(&self, msg: Handle, index: usize, buf: &mut [u8]) -> Result<usize> {
        let mut st = self.state.lock();
        let chunk = self.received(&st, msg)?;
        let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;
        if index >= conn.msg.in_count {
            return Err(Error::InvalidVectorIndex);
        }
        let v = conn.msg.invec[index];
        let done = conn.msg.consumed[index];
        let n = buf.len().min((v.len - done) as usize);
        if n > 0 {
            self.memory.read(v.base + done, &mut buf[..n])?;
        }
        conn.msg.consumed[index] += u32::try_from(n).map_err(|_| Error::Internal)?;
        Ok(n)
    }

    /// Skip bytes of an input vector
    ///
    /// # Errors
    ///
    /// Same as [`MessageRouter::read`].
    pub fn skip(&self, msg: Handle, index: usize, len: usize) -> Result<usize> {
        let mut st = self.state.lock();
        let chunk = self.received(&st, msg)?;
        let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;
        if index >= conn.msg.in_count {
            return Err(Error::InvalidVectorIndex);
        }
        let remaining = conn.msg.invec[index].len - conn.msg.consumed[index];
        let n = len.min(remaining as usize);
        conn.msg.consumed[index] += u32::try_from(n).map_err(|_| Error::Internal)?;
        Ok(n)
    }

    /// Append bytes to an output vector
    ///
    /// # Errors
    ///
    /// `Error::WriteOverflow` if the bytes do not fit the remaining space,
    /// otherwise as [`MessageRouter::read`].
    pub fn write(&self, msg: Handle, index: usize, data: &[u8]) -> Result<()> {
        let mut st = self.state.lock();
        let chunk = self.received(&st, msg)?;
        let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;
        if index >= conn.msg.out_count {
            return Err(Error::InvalidVectorIndex);
        }
        let v = conn.msg.outvec[index];
        let done = conn.msg.written[index];
        let len = u32::try_from(data.len()).map_err(|_| Error::WriteOverflow)?;
        if len > v.len - done {
            return Err(Error::WriteOverflow);
        }
        if len > 0 {
            self.memory.write(v.base + done, data)?;
        }
        conn.msg.written[index] = done + len;
        Ok(())
    }

    /// Store a reverse handle on the message's connection
    ///
    /// # Errors
    ///
    /// Same as [`MessageRouter::read`].
    pub fn set_rhandle(&self, msg: Handle, rhandle: usize) -> Result<()> {
        let mut st = self.state.lock();
        let chunk = self.received(&st, msg)?;
        st.pool.get_mut(chunk).ok_or(Error::Internal)?.rhandle = rhandle;
        Ok(())
    }

    /// Complete a message
    ///
    /// A connect accepts only `SUCCESS`, `CONNECTION_REFUSED` and
    /// `CONNECTION_BUSY`. A call answered with `PROGRAMMER_ERROR` moves the
    /// connection to `CONNECT_ERROR`. The status of a disconnect is
    /// ignored.
    ///
    /// # Errors
    ///
    /// `Error::InvalidReplyStatus` for a status the message type does not
    /// allow, otherwise as [`MessageRouter::read`].
    pub fn reply(&self, msg: Handle, status: Status) -> Result<()> {
        let (wake, completion) = {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            let chunk = self.received(st, msg)?;
            let conn = st.pool.get_mut(chunk).ok_or(Error::Internal)?;

            let status = match conn.msg.msg_type.ok_or(Error::Internal)? {
                MessageType::Connect => match status {
                    Status::SUCCESS | Status::CONNECTION_REFUSED | Status::CONNECTION_BUSY => status,
                    _ => return Err(Error::InvalidReplyStatus),
                },
                MessageType::Call(_) => {
                    if status == Status::PROGRAMMER_ERROR {
                        conn.status = ConnectionStatus::ConnectError;
                    }
                    status
                }
                MessageType::Disconnect => Status::SUCCESS,
            };
            conn.msg.received = false;
            conn.msg.ack = Some(status);
            log_debug!(st.log, MODULE, "reply {} to client {}", status, conn.client);

            match conn.msg.reply_to.ok_or(Error::Internal)? {
                ReplyTo::Blocking(_) => (Some(EventId::Ack(chunk)), None),
                ReplyTo::Rpc(token) => {
                    let outvec = conn.msg.caller_outvec;
                    let outcome = st.finish(chunk)?;
                    if let Some(addr) = outvec {
                        self.store_out_len(addr, outcome.out_len());
                    }
                    (None, Some((token, outcome)))
                }
            }
        };

        if let Some(event) = wake {
            self.scheduler.wake(event);
        }
        if let Some((token, outcome)) = completion {
            self.rpc.reply(token, outcome.status, outcome.out_len());
        }
        Ok(())
    }

    /// Raise the doorbell of a partition
    ///
    /// # Errors
    ///
    /// `Error::InvalidPartition` for an unknown partition.
    pub fn notify(&self, partition: PartitionId) -> Result<()> {
        let index = self
            .registry()
            .partition_index(partition)
            .ok_or(Error::InvalidPartition)?;
        let wake = {
            let mut st = self.state.lock();
            let target = st.partitions.get_mut(index).ok_or(Error::Internal)?;
            target.assert_signal(partition, DOORBELL)
        };
        if let Some(event) = wake {
            self.scheduler.wake(event);
        }
        Ok(())
    }

    /// Clear the doorbell of the running partition
    ///
    /// # Errors
    ///
    /// `Error::InvalidSignal` if the doorbell is not asserted.
    pub fn clear_doorbell(&self) -> Result<()> {
        let id = self.scheduler.current_partition();
        let index = self.registry().partition_index(id).ok_or(Error::InvalidPartition)?;
        let mut st = self.state.lock();
        let partition = st.partitions.get_mut(index).ok_or(Error::Internal)?;
        if !partition.asserted.contains(DOORBELL) {
            return Err(Error::InvalidSignal);
        }
        partition.asserted = partition.asserted.without(DOORBELL);
        Ok(())
    }

    /// Resolve a message handle retrieved by the running partition
    fn received(&self, st: &State, msg: Handle) -> Result<Chunk> {
        let chunk = st
            .pool
            .from_external_handle(msg)
            .ok_or(Error::InvalidMessageHandle)?;
        let conn = st.pool.get(chunk).ok_or(Error::InvalidMessageHandle)?;
        if conn.magic != MSG_MAGIC {
            return Err(Error::InvalidMessageHandle);
        }
        let owner = self.registry().get(conn.service).ok_or(Error::Internal)?.partition;
        if owner != self.scheduler.current_partition() {
            return Err(Error::InvalidMessageHandle);
        }
        if !conn.msg.received {
            return Err(Error::MessageNotReceived);
        }
        Ok(chunk)
    }

    /// Store written lengths into the `len` fields of a client output table
    fn store_out_len(&self, addr: u32, out_len: &[u32]) {
        for (i, len) in (0u32..).zip(out_len) {
            let at = addr
                .checked_add(i * IOVEC_SIZE + 4)
                .map(|at| self.memory.write(at, &len.to_le_bytes()));
            if !matches!(at, Some(Ok(()))) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::IoVec;
    use crate::router::{RpcCaller, VecTable};
    use crate::service::{PartitionDesc, ServiceDesc, ServiceRegistry};
    use core::cell::{Cell, RefCell};
    use q_common::config::IpcConfig;
    use q_common::VersionPolicy;
    use q_isolation::AccessAttr;

    const SERVER: PartitionId = PartitionId(1);
    const SIG_CONN: Signal = Signal(1 << 4);
    const SIG_STATELESS: Signal = Signal(1 << 5);
    const BASE: u32 = 0x2000_0000;

    struct Current(Cell<PartitionId>);

    impl Scheduler for Current {
        fn current_partition(&self) -> PartitionId {
            self.0.get()
        }
        fn wait_on(&self, _event: EventId) {}
        fn wake(&self, _event: EventId) {}
    }

    struct AnyAccess;

    impl AccessPolicy for AnyAccess {
        fn has_access(&self, _base: u32, _len: u32, _attr: AccessAttr) -> bool {
            true
        }
    }

    struct Flat(RefCell<[u8; 128]>);

    impl ClientMemory for Flat {
        fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
            let at = (addr - BASE) as usize;
            buf.copy_from_slice(&self.0.borrow()[at..at + buf.len()]);
            Ok(())
        }
        fn write(&self, addr: u32, data: &[u8]) -> Result<()> {
            let at = (addr - BASE) as usize;
            self.0.borrow_mut()[at..at + data.len()].copy_from_slice(data);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Replies(RefCell<heapless::Vec<(u32, Status, heapless::Vec<u32, 4>), 8>>);

    impl RpcClient for Replies {
        fn reply(&self, token: u32, status: Status, out_len: &[u32]) {
            let lens = out_len.iter().copied().collect();
            let _ = self.0.borrow_mut().push((token, status, lens));
        }
    }

    struct Fixture {
        sched: Current,
        mem: Flat,
        replies: Replies,
    }

    type TestRouter<'a> = MessageRouter<&'a Current, AnyAccess, &'a Flat, &'a Replies>;

    const NS: RpcCaller = RpcCaller {
        client: ClientId(-2),
        token: 40,
    };

    impl Fixture {
        fn new() -> Self {
            Self {
                sched: Current(Cell::new(SERVER)),
                mem: Flat(RefCell::new([0; 128])),
                replies: Replies::default(),
            }
        }

        fn router(&self) -> TestRouter<'_> {
            let registry = ServiceRegistry::new(
                &[PartitionDesc { id: SERVER, unprivileged: false, deps: &[] }],
                &[
                    ServiceDesc {
                        sid: Sid(7),
                        partition: SERVER,
                        signal: SIG_CONN,
                        version: 1,
                        policy: VersionPolicy::Strict,
                        connection_based: true,
                        non_secure_clients: true,
                    },
                    ServiceDesc {
                        sid: Sid(9),
                        partition: SERVER,
                        signal: SIG_STATELESS,
                        version: 1,
                        policy: VersionPolicy::Strict,
                        connection_based: false,
                        non_secure_clients: true,
                    },
                ],
            )
            .unwrap();
            MessageRouter::new(&IpcConfig::DEFAULT, registry, &self.sched, AnyAccess, &self.mem, &self.replies)
                .unwrap()
        }

        fn last_reply(&self) -> (u32, Status, heapless::Vec<u32, 4>) {
            self.replies.0.borrow().last().cloned().unwrap()
        }
    }

    /// Connect over RPC and accept, returning the client handle
    fn connected(f: &Fixture, r: &TestRouter<'_>) -> Handle {
        r.rpc_connect(NS, Sid(7), 1).unwrap();
        assert_eq!(r.wait(SIG_CONN, false), Ok(SIG_CONN));
        let msg = r.get(SIG_CONN).unwrap();
        assert_eq!(msg.msg_type, MessageType::Connect);
        assert_eq!(msg.client_id, ClientId(-2));
        r.reply(msg.handle, Status::SUCCESS).unwrap();
        let (token, status, _) = f.last_reply();
        assert_eq!(token, 40);
        Handle(status.0)
    }

    #[test]
    fn test_connect_accept_and_close() {
        let f = Fixture::new();
        let r = f.router();
        let h = connected(&f, &r);
        assert!(h.is_connection());
        assert_eq!(r.open_connections(Sid(7)), Some(1));

        r.rpc_close(NS, h).unwrap();
        let msg = r.get(SIG_CONN).unwrap();
        assert_eq!(msg.msg_type, MessageType::Disconnect);
        r.reply(msg.handle, Status::GENERIC_ERROR).unwrap();
        assert_eq!(f.last_reply().1, Status::SUCCESS);
        assert_eq!(r.open_connections(Sid(7)), Some(0));
        assert_eq!(r.rpc_close(NS, h), Err(Error::ProgrammerError));
    }

    #[test]
    fn test_refused_connect_frees_chunk() {
        let f = Fixture::new();
        let r = f.router();
        r.rpc_connect(NS, Sid(7), 1).unwrap();
        let msg = r.get(SIG_CONN).unwrap();
        assert_eq!(r.reply(msg.handle, Status(5)), Err(Error::InvalidReplyStatus));
        r.reply(msg.handle, Status::CONNECTION_REFUSED).unwrap();
        assert_eq!(f.last_reply().1, Status::CONNECTION_REFUSED);
        assert_eq!(r.free_connections(), IpcConfig::DEFAULT.connection_pool_size);
    }

    #[test]
    fn test_call_read_write_reply() {
        let f = Fixture::new();
        let r = f.router();
        let h = connected(&f, &r);

        // in: "ping" at +0x40, out: 8 bytes at +0x50, tables at +0x00/+0x10
        f.mem.write(BASE + 0x40, b"ping").unwrap();
        f.mem.write(BASE, &(BASE + 0x40).to_le_bytes()).unwrap();
        f.mem.write(BASE + 4, &4u32.to_le_bytes()).unwrap();
        f.mem.write(BASE + 0x10, &(BASE + 0x50).to_le_bytes()).unwrap();
        f.mem.write(BASE + 0x14, &8u32.to_le_bytes()).unwrap();
        r.rpc_call(NS, h, 3, VecTable::new(BASE, 1), VecTable::new(BASE + 0x10, 1))
            .unwrap();

        // A second call while ACTIVE is rejected
        assert_eq!(
            r.rpc_call(NS, h, 3, VecTable::default(), VecTable::default()),
            Err(Error::ProgrammerError)
        );

        let msg = r.get(SIG_CONN).unwrap();
        assert_eq!(msg.msg_type, MessageType::Call(3));
        assert_eq!((msg.in_size[0], msg.out_size[0]), (4, 8));

        let mut buf = [0u8; 3];
        assert_eq!(r.read(msg.handle, 0, &mut buf), Ok(3));
        assert_eq!(&buf, b"pin");
        assert_eq!(r.read(msg.handle, 0, &mut buf), Ok(1));
        assert_eq!(buf[0], b'g');
        assert_eq!(r.read(msg.handle, 0, &mut buf), Ok(0));
        assert_eq!(r.read(msg.handle, 1, &mut buf), Err(Error::InvalidVectorIndex));

        r.write(msg.handle, 0, b"po").unwrap();
        r.write(msg.handle, 0, b"ng").unwrap();
        assert_eq!(r.write(msg.handle, 0, b"!!!!!"), Err(Error::WriteOverflow));
        r.reply(msg.handle, Status(2)).unwrap();

        let (_, status, lens) = f.last_reply();
        assert_eq!(status, Status(2));
        assert_eq!(lens.as_slice(), &[4]);
        let mut out = [0u8; 4];
        f.mem.read(BASE + 0x50, &mut out).unwrap();
        assert_eq!(&out, b"pong");
        let mut len = [0u8; 4];
        f.mem.read(BASE + 0x14, &mut len).unwrap();
        assert_eq!(u32::from_le_bytes(len), 4);

        // Connection is IDLE again
        assert!(r.rpc_call(NS, h, 0, VecTable::default(), VecTable::default()).is_ok());
    }

    #[test]
    fn test_programmer_error_reply_sets_connect_error() {
        let f = Fixture::new();
        let r = f.router();
        let h = connected(&f, &r);
        r.rpc_call(NS, h, 0, VecTable::default(), VecTable::default()).unwrap();
        let msg = r.get(SIG_CONN).unwrap();
        r.reply(msg.handle, Status::PROGRAMMER_ERROR).unwrap();
        assert_eq!(
            r.rpc_call(NS, h, 0, VecTable::default(), VecTable::default()),
            Err(Error::ProgrammerError)
        );
        // Close is still accepted
        r.rpc_close(NS, h).unwrap();
    }

    #[test]
    fn test_stateless_call_frees_after_reply() {
        let f = Fixture::new();
        let r = f.router();
        let h = r.registry().static_handle(Sid(9)).unwrap();
        r.rpc_call(NS, h, 0, VecTable::default(), VecTable::default()).unwrap();
        assert_eq!(r.free_connections(), IpcConfig::DEFAULT.connection_pool_size - 1);
        let msg = r.get(SIG_STATELESS).unwrap();
        r.reply(msg.handle, Status::SUCCESS).unwrap();
        assert_eq!(r.free_connections(), IpcConfig::DEFAULT.connection_pool_size);
    }

    #[test]
    fn test_get_preserves_fifo_and_signal() {
        let f = Fixture::new();
        let r = f.router();
        let caller = |token| RpcCaller { client: ClientId(-2), token };
        r.rpc_connect(caller(1), Sid(7), 1).unwrap();
        r.rpc_connect(caller(2), Sid(7), 1).unwrap();

        let first = r.get(SIG_CONN).unwrap();
        assert_eq!(r.wait(SIG_CONN, false), Ok(SIG_CONN));
        let second = r.get(SIG_CONN).unwrap();
        assert_eq!(r.wait(SIG_CONN, false), Ok(Signal::NONE));
        assert_eq!(r.get(SIG_CONN), Err(Error::NoMessage));

        r.reply(first.handle, Status::SUCCESS).unwrap();
        assert_eq!(f.last_reply().0, 1);
        r.reply(second.handle, Status::SUCCESS).unwrap();
        assert_eq!(f.last_reply().0, 2);
    }

    #[test]
    fn test_signal_checks() {
        let f = Fixture::new();
        let r = f.router();
        assert_eq!(r.get(Signal(0x30)), Err(Error::InvalidSignal));
        assert_eq!(r.get(Signal(1 << 9)), Err(Error::InvalidSignal));
        assert_eq!(r.get(SIG_CONN), Err(Error::NoMessage));
        assert_eq!(r.wait(Signal(1 << 9), true), Err(Error::InvalidSignal));
    }

    #[test]
    fn test_message_handle_checks() {
        let f = Fixture::new();
        let r = f.router();
        r.rpc_connect(NS, Sid(7), 1).unwrap();
        let msg = r.get(SIG_CONN).unwrap();
        assert_eq!(r.reply(Handle(0x77), Status::SUCCESS), Err(Error::InvalidMessageHandle));

        f.sched.0.set(PartitionId(2));
        assert_eq!(r.reply(msg.handle, Status::SUCCESS), Err(Error::InvalidMessageHandle));
        f.sched.0.set(SERVER);

        r.set_rhandle(msg.handle, 0xABCD).unwrap();
        r.reply(msg.handle, Status::SUCCESS).unwrap();
        assert_eq!(r.reply(msg.handle, Status::SUCCESS), Err(Error::MessageNotReceived));

        let (_, status, _) = f.last_reply();
        let h = Handle(status.0);
        r.rpc_call(NS, h, 1, VecTable::default(), VecTable::default()).unwrap();
        assert_eq!(r.get(SIG_CONN).map(|m| m.rhandle), Ok(0xABCD));
    }

    #[test]
    fn test_doorbell() {
        let f = Fixture::new();
        let r = f.router();
        assert_eq!(r.clear_doorbell(), Err(Error::InvalidSignal));
        r.notify(SERVER).unwrap();
        assert_eq!(r.wait(DOORBELL, false), Ok(DOORBELL));
        r.clear_doorbell().unwrap();
        assert_eq!(r.wait(DOORBELL, false), Ok(Signal::NONE));
        assert_eq!(r.notify(PartitionId(9)), Err(Error::InvalidPartition));
    }

    #[test]
    fn test_written_lengths_reported_per_vector() {
        let f = Fixture::new();
        let r = f.router();
        let h = r.registry().static_handle(Sid(9)).unwrap();
        let outs = [IoVec::new(BASE + 0x40, 8), IoVec::new(BASE + 0x50, 8)];
        for (i, v) in outs.iter().enumerate() {
            let at = BASE + 8 * i as u32;
            f.mem.write(at, &v.base.to_le_bytes()).unwrap();
            f.mem.write(at + 4, &v.len.to_le_bytes()).unwrap();
        }
        r.rpc_call(NS, h, 0, VecTable::default(), VecTable::new(BASE, 2)).unwrap();
        let msg = r.get(SIG_STATELESS).unwrap();
        r.write(msg.handle, 1, b"abc").unwrap();
        r.reply(msg.handle, Status::SUCCESS).unwrap();
        assert_eq!(f.last_reply().2.as_slice(), &[0, 3]);
    }
}
