//! Typed channels on top of the binary messenger
//!
//! - [`MethodChannel`]: request/response method calls
//! - [`EventChannel`]: listen/cancel event streams

pub mod error;
pub mod event_channel;
pub mod method_call;
pub mod method_channel;

pub use error::{ChannelError, Result};
pub use event_channel::{EventChannel, EventSink};
pub use method_call::MethodCall;
pub use method_channel::MethodChannel;
