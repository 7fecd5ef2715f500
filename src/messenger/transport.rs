//! Transport contract between the messenger and the engine.
//!
//! A transport moves opaque byte messages between this side and the engine.
//! It hands out two kinds of handles:
//!
//! - [`ReplyHandle`]: created for each outbound message that expects a reply.
//!   The messenger releases it exactly once, after the reply or after a
//!   synchronous failure.
//! - [`ResponseToken`]: attached to each inbound message. Exactly one
//!   [`Transport::respond`] call consumes it.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;

use super::error::TransportError;

/// Default upper bound for a single outbound message (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Inbound message sink installed per channel.
pub type Receiver = Rc<dyn Fn(&str, Bytes, ResponseToken)>;

/// Callback fired by the transport when a reply arrives.
pub type ReplyCallback = Box<dyn FnOnce(Bytes)>;

/// Outbound reply handle issued by [`Transport::create_reply_handle`].
///
/// Not `Clone`: releasing it consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ReplyHandle(u64);

impl ReplyHandle {
    /// Wrap a transport-specific handle id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Transport-specific handle id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

/// Inbound response token issued by the transport with each message.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ResponseToken(u64);

impl ResponseToken {
    /// Wrap a transport-specific token id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Transport-specific token id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

/// Engine-facing message transport.
///
/// All methods are called on the event-loop thread. Implementations may
/// invoke receivers and reply callbacks re-entrantly from inside
/// [`send`](Self::send).
pub trait Transport {
    /// Allocate a reply handle whose reply is delivered to `on_reply`.
    fn create_reply_handle(&self, on_reply: ReplyCallback) -> Result<ReplyHandle, TransportError>;

    /// Return a reply handle to the transport.
    fn release_reply_handle(&self, handle: ReplyHandle);

    /// Send a message, optionally bound to a reply handle.
    fn send(&self, channel: &str, message: &[u8], reply: Option<&ReplyHandle>) -> Result<(), TransportError>;

    /// Answer an inbound message. An empty message means not implemented.
    fn respond(&self, token: ResponseToken, message: &[u8]) -> Result<(), TransportError>;

    /// Route inbound messages on `channel` to `receiver`, or stop routing.
    fn set_receiver(&self, channel: &str, receiver: Option<Receiver>);
}

/// Messenger tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerConfig {
    /// Outbound messages larger than this fail synchronously.
    pub max_message_size: usize,
    /// Answer dropped [`ResponseHandle`](super::ResponseHandle)s with an
    /// empty (not-implemented) reply.
    pub reply_on_drop: bool,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            reply_on_drop: true,
        }
    }
}

impl MessengerConfig {
    /// Set the outbound size limit.
    #[must_use]
    pub const fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Enable or disable replying on drop.
    #[must_use]
    pub const fn with_reply_on_drop(mut self, enabled: bool) -> Self {
        self.reply_on_drop = enabled;
        self
    }
}

/// Advisory cancellation flag for outbound sends.
///
/// A cancelled send still completes when the transport replies.
#[derive(Clone, Default)]
pub struct Cancellable(Rc<Cell<bool>>);

impl Cancellable {
    /// Create an uncancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.set(true);
    }

    /// Check whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

impl fmt::Debug for Cancellable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cancellable").field(&self.is_cancelled()).finish()
    }
}
