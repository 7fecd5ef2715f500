//! Binary messenger
//!
//! The messenger keeps one handler per channel name, routes inbound
//! messages from a [`Transport`] to those handlers and forwards outbound
//! messages to the transport, matching replies to their senders.
//!
//! Everything runs on one event-loop thread; the types here are `!Send`.

pub mod binary_messenger;
pub mod error;
#[cfg(any(test, feature = "debug-tools"))]
pub mod memory;
mod metrics;
pub mod response_handle;
pub mod transport;

pub use binary_messenger::{BinaryMessenger, Completion, MessageHandler, WeakMessenger};
pub use error::{MessengerError, Result, TransportError};
#[cfg(any(test, feature = "debug-tools"))]
pub use memory::{MemoryTransport, RecordedResponse, SentMessage};
pub use metrics::MetricsSnapshot;
pub use response_handle::ResponseHandle;
pub use transport::{
    Cancellable, MAX_MESSAGE_SIZE, MessengerConfig, Receiver, ReplyCallback, ReplyHandle, ResponseToken, Transport,
};
