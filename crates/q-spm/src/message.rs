// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Connection and message bodies
//!
//! One [`Connection`] occupies one pool chunk and owns exactly one
//! [`Message`]. A stateless call gets a fresh connection per request.

use q_common::constants::MAX_IOVEC;
use q_common::{MessageType, PartitionId, Status};
use zeroize::Zeroize;

use crate::memory::IoVec;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No request outstanding
    #[default]
    Idle,
    /// A request is outstanding
    Active,
    /// The service terminated the connection; only close is accepted
    ConnectError,
}

/// Where the acknowledgement of a message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTo {
    /// A secure partition blocked on the message
    Blocking(PartitionId),
    /// A non-secure request carried over the RPC shim
    Rpc(u32),
}

/// Message delivered to a service
#[derive(Debug, Clone, Copy, Default)]
pub struct Message {
    /// Request type
    pub msg_type: Option<MessageType>,
    /// Input vectors (caller copies)
    pub invec: [IoVec; MAX_IOVEC],
    /// Output vectors (caller copies)
    pub outvec: [IoVec; MAX_IOVEC],
    /// Number of valid input vectors
    pub in_count: usize,
    /// Number of valid output vectors
    pub out_count: usize,
    /// Bytes of each input vector already read or skipped
    pub consumed: [u32; MAX_IOVEC],
    /// Bytes written to each output vector
    pub written: [u32; MAX_IOVEC],
    /// Client address of the output descriptor table, if it lives in
    /// client memory
    pub caller_outvec: Option<u32>,
    /// Acknowledgement target
    pub reply_to: Option<ReplyTo>,
    /// Retrieved by the service and not yet replied to
    pub received: bool,
    /// Reply status, set once the service replied
    pub ack: Option<Status>,
}

impl Message {
    /// Fresh message without vectors
    #[must_use]
    pub fn new(msg_type: MessageType, reply_to: ReplyTo) -> Self {
        Self {
            msg_type: Some(msg_type),
            reply_to: Some(reply_to),
            ..Self::default()
        }
    }

    /// Lengths written to the output vectors
    #[must_use]
    pub fn out_len(&self) -> &[u32] {
        &self.written[..self.out_count]
    }
}

impl Zeroize for Message {
    fn zeroize(&mut self) {
        self.invec.zeroize();
        self.outvec.zeroize();
        self.in_count.zeroize();
        self.out_count.zeroize();
        self.consumed.zeroize();
        self.written.zeroize();
        self.caller_outvec = None;
        self.msg_type = None;
        self.reply_to = None;
        self.received = false;
        self.ack = None;
    }
}

/// Pool payload: one connection with its message
#[derive(Debug, Default)]
pub struct Connection {
    /// `MSG_MAGIC` while allocated
    pub magic: u32,
    /// Registry position of the target service
    pub service: usize,
    /// Raw client identity
    pub client: i32,
    /// Caller-visible handle value
    pub handle: i32,
    /// Connection status
    pub status: ConnectionStatus,
    /// Created for a single stateless call
    pub stateless: bool,
    /// Reverse handle set by the service
    pub rhandle: usize,
    /// Message body
    pub msg: Message,
}

impl Zeroize for Connection {
    fn zeroize(&mut self) {
        self.magic.zeroize();
        self.service.zeroize();
        self.client.zeroize();
        self.handle.zeroize();
        self.rhandle.zeroize();
        self.status = ConnectionStatus::Idle;
        self.stateless = false;
        self.msg.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroize_clears_everything() {
        let mut c = Connection {
            magic: 0x1515_4343,
            service: 3,
            client: -4,
            handle: 0x99,
            status: ConnectionStatus::Active,
            stateless: true,
            rhandle: 0x2000_0000,
            msg: Message::new(MessageType::Call(1), ReplyTo::Rpc(5)),
        };
        c.msg.invec[0] = IoVec::new(0x2000_0000, 4);
        c.msg.written[0] = 4;
        c.zeroize();
        assert_eq!(c.magic, 0);
        assert_eq!(c.status, ConnectionStatus::Idle);
        assert!(c.msg.msg_type.is_none());
        assert_eq!(c.msg.invec[0], IoVec::default());
        assert_eq!(c.msg.written, [0; MAX_IOVEC]);
    }
}
