// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Non-secure RPC completion
//!
//! Requests from the non-secure world do not block the secure side. The
//! router enqueues the message and returns; the reply travels back through
//! an [`RpcClient`] once the service acknowledges.

use q_common::Status;

/// Receiver of asynchronous completions
pub trait RpcClient {
    /// Deliver the outcome of the request identified by `token`
    ///
    /// A successful connect reports the new handle value as the status.
    /// `out_len` holds the bytes written to each output vector of a call.
    fn reply(&self, token: u32, status: Status, out_len: &[u32]);
}

impl<T: RpcClient + ?Sized> RpcClient for &T {
    fn reply(&self, token: u32, status: Status, out_len: &[u32]) {
        (**self).reply(token, status, out_len);
    }
}

/// RPC sink for systems without a non-secure world
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRpc;

impl RpcClient for NoRpc {
    fn reply(&self, _token: u32, _status: Status, _out_len: &[u32]) {}
}
