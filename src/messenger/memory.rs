//! In-process transport for tests, demos and benchmarks.
//!
//! [`MemoryTransport`] records every outbound message and inbound response so
//! callers can inspect the traffic, and plays the engine side through
//! [`deliver`](MemoryTransport::deliver) and
//! [`complete_reply`](MemoryTransport::complete_reply). In loopback mode an
//! outbound message is routed straight back to this side's receiver for that
//! channel, and the response completes the original send.
//!
//! No internal borrow is held while a receiver or reply callback runs, so
//! callbacks may call back into the transport.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;

use bytes::Bytes;
use tracing::trace;

use super::error::TransportError;
use super::transport::{Receiver, ReplyCallback, ReplyHandle, ResponseToken, Transport};

/// Outbound message captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination channel
    pub channel: String,
    /// Payload
    pub message: Bytes,
    /// Reply handle id, `None` for fire-and-forget sends
    pub reply_handle: Option<u64>,
}

/// Response captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResponse {
    /// Token id the response answered
    pub token: u64,
    /// Payload (empty for not implemented)
    pub message: Bytes,
}

#[derive(Default)]
struct State {
    next_handle: u64,
    next_token: u64,
    callbacks: HashMap<u64, ReplyCallback>,
    live_handles: HashSet<u64>,
    released: Vec<u64>,
    double_releases: usize,
    open_tokens: HashMap<u64, Option<u64>>,
    receivers: HashMap<String, Receiver>,
    sent: Vec<SentMessage>,
    responses: Vec<RecordedResponse>,
}

impl State {
    fn allocate_token(&mut self, linked_handle: Option<u64>) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.open_tokens.insert(token, linked_handle);
        token
    }
}

/// Recording, optionally looping-back, in-memory [`Transport`].
#[derive(Default)]
pub struct MemoryTransport {
    state: RefCell<State>,
    loopback: bool,
    fail_next_handle: Cell<bool>,
    fail_sends: Cell<bool>,
    inline_reply: RefCell<Option<Bytes>>,
}

impl MemoryTransport {
    /// Create a recording transport; replies are driven by the caller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that routes sends back to local receivers.
    #[must_use]
    pub fn loopback() -> Self {
        Self {
            loopback: true,
            ..Self::default()
        }
    }

    /// Make the next [`Transport::create_reply_handle`] call fail.
    pub fn fail_next_handle(&self) {
        self.fail_next_handle.set(true);
    }

    /// Make every [`Transport::send`] fail until switched off.
    pub fn fail_sends(&self, enabled: bool) {
        self.fail_sends.set(enabled);
    }

    /// Reply to the next send with `reply` from inside [`Transport::send`].
    pub fn reply_during_send(&self, reply: Bytes) {
        *self.inline_reply.borrow_mut() = Some(reply);
    }

    /// Deliver an inbound message from the engine side and return its token
    /// id. Channels with no receiver are answered with an empty response.
    pub fn deliver(&self, channel: &str, message: &[u8]) -> u64 {
        let (token, receiver) = {
            let mut state = self.state.borrow_mut();
            let token = state.allocate_token(None);
            (token, state.receivers.get(channel).cloned())
        };
        trace!(channel, token, "delivering inbound message");
        match receiver {
            Some(receiver) => receiver(channel, Bytes::copy_from_slice(message), ResponseToken::new(token)),
            None => {
                let _ = self.respond(ResponseToken::new(token), &[]);
            }
        }
        token
    }

    /// Complete the send bound to `handle` with `reply`.
    ///
    /// Returns `false` if the handle has no pending callback.
    pub fn complete_reply(&self, handle: u64, reply: &[u8]) -> bool {
        let callback = self.state.borrow_mut().callbacks.remove(&handle);
        match callback {
            Some(callback) => {
                callback(Bytes::copy_from_slice(reply));
                true
            }
            None => false,
        }
    }

    /// Drop the callback bound to `handle` without invoking it.
    pub fn discard_reply(&self, handle: u64) {
        let callback = self.state.borrow_mut().callbacks.remove(&handle);
        drop(callback);
    }

    /// Check if a receiver is armed for `channel`
    #[must_use]
    pub fn has_receiver(&self, channel: &str) -> bool {
        self.state.borrow().receivers.contains_key(channel)
    }

    /// Outbound messages in send order
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.borrow().sent.clone()
    }

    /// Drain the recorded outbound messages
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    /// Responses in the order they were sent
    #[must_use]
    pub fn responses(&self) -> Vec<RecordedResponse> {
        self.state.borrow().responses.clone()
    }

    /// Response recorded for `token`, if any
    #[must_use]
    pub fn response_for(&self, token: u64) -> Option<Bytes> {
        self.state
            .borrow()
            .responses
            .iter()
            .find(|response| response.token == token)
            .map(|response| response.message.clone())
    }

    /// Handles released so far, in release order
    #[must_use]
    pub fn released_handles(&self) -> Vec<u64> {
        self.state.borrow().released.clone()
    }

    /// Handles created but not yet released
    #[must_use]
    pub fn outstanding_handles(&self) -> usize {
        self.state.borrow().live_handles.len()
    }

    /// Releases of handles that were not live
    #[must_use]
    pub fn double_releases(&self) -> usize {
        self.state.borrow().double_releases
    }

    fn route_loopback(&self, channel: &str, message: &[u8], reply: Option<&ReplyHandle>) {
        let (token, receiver) = {
            let mut state = self.state.borrow_mut();
            let token = state.allocate_token(reply.map(ReplyHandle::id));
            (token, state.receivers.get(channel).cloned())
        };
        match receiver {
            Some(receiver) => receiver(channel, Bytes::copy_from_slice(message), ResponseToken::new(token)),
            None => {
                trace!(channel, "loopback send with no receiver");
                // engine answers unknown channels with an empty reply
                let _ = self.respond(ResponseToken::new(token), &[]);
            }
        }
    }
}

impl Transport for MemoryTransport {
    fn create_reply_handle(&self, on_reply: ReplyCallback) -> Result<ReplyHandle, TransportError> {
        let mut state = self.state.borrow_mut();
        if self.fail_next_handle.replace(false) {
            return Err(TransportError::HandlesExhausted {
                outstanding: state.live_handles.len(),
            });
        }
        state.next_handle += 1;
        let id = state.next_handle;
        state.live_handles.insert(id);
        state.callbacks.insert(id, on_reply);
        Ok(ReplyHandle::new(id))
    }

    fn release_reply_handle(&self, handle: ReplyHandle) {
        let callback = {
            let mut state = self.state.borrow_mut();
            if !state.live_handles.remove(&handle.id()) {
                state.double_releases += 1;
            }
            state.released.push(handle.id());
            state.callbacks.remove(&handle.id())
        };
        drop(callback);
    }

    fn send(&self, channel: &str, message: &[u8], reply: Option<&ReplyHandle>) -> Result<(), TransportError> {
        if let Some(handle) = reply {
            let inline = self.inline_reply.borrow_mut().take();
            if let Some(inline) = inline {
                self.complete_reply(handle.id(), &inline);
            }
        }
        if self.fail_sends.get() {
            return Err(TransportError::Rejected {
                channel: channel.to_owned(),
                reason: "send failure injected".into(),
            });
        }
        self.state.borrow_mut().sent.push(SentMessage {
            channel: channel.to_owned(),
            message: Bytes::copy_from_slice(message),
            reply_handle: reply.map(ReplyHandle::id),
        });
        if self.loopback {
            self.route_loopback(channel, message, reply);
        }
        Ok(())
    }

    fn respond(&self, token: ResponseToken, message: &[u8]) -> Result<(), TransportError> {
        let callback = {
            let mut state = self.state.borrow_mut();
            let Some(linked) = state.open_tokens.remove(&token.id()) else {
                return Err(TransportError::UnknownToken { id: token.id() });
            };
            state.responses.push(RecordedResponse {
                token: token.id(),
                message: Bytes::copy_from_slice(message),
            });
            linked.and_then(|handle| state.callbacks.remove(&handle))
        };
        if let Some(callback) = callback {
            callback(Bytes::copy_from_slice(message));
        }
        Ok(())
    }

    fn set_receiver(&self, channel: &str, receiver: Option<Receiver>) {
        let previous = {
            let mut state = self.state.borrow_mut();
            match receiver {
                Some(receiver) => state.receivers.insert(channel.to_owned(), receiver),
                None => state.receivers.remove(channel),
            }
        };
        drop(previous);
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryTransport")
            .field("loopback", &self.loopback)
            .field("sent", &state.sent.len())
            .field("responses", &state.responses.len())
            .field("outstanding_handles", &state.live_handles.len())
            .finish_non_exhaustive()
    }
}
