//! platch - platform-channel messaging between a UI engine and native plugins
//!
//! This library implements the plugin side of an embedder's platform channels:
//! a binary messenger routing named channels over an engine transport, method
//! and event channels layered on top, the standard message codec, and plugin
//! registration.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use platch::{BinaryMessenger, MethodChannel, Transport, Value};
//!
//! # fn transport() -> Rc<dyn Transport> { unimplemented!() }
//! let messenger = BinaryMessenger::with_transport(transport());
//! let channel = MethodChannel::with_standard_codec(&messenger, "samples/echo");
//!
//! // Answer calls from the engine
//! channel.set_method_call_handler(|call| {
//!     let args = call.args().clone();
//!     let _ = call.respond_success(args);
//! });
//!
//! // Call into the engine
//! channel.invoke_method("ping", &Value::from("hello"), None, |outcome| {
//!     println!("ping -> {outcome:?}");
//! });
//! ```
//!
//! # Features
//!
//! - **Exactly-once replies** - response handles are consumed by value
//! - **Pluggable codecs** - [`StandardMethodCodec`] over any [`WireFormat`],
//!   plus `JsonMethodCodec` with the `json` feature
//! - **Event streams** - listen/cancel subscriptions with typed contexts
//! - **In-memory transport** - `MemoryTransport` with the `debug-tools` feature

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod channel;
pub mod codec;
pub mod messenger;
pub mod plugin;

pub use channel::{ChannelError, EventChannel, EventSink, MethodCall, MethodChannel};
#[cfg(feature = "json")]
pub use codec::JsonMethodCodec;
pub use codec::{
    CodecError, MethodCodec, MethodError, MethodResponse, StandardMethodCodec, StandardWire, Value, ValueType,
    WireFormat,
};
#[cfg(any(test, feature = "debug-tools"))]
pub use messenger::MemoryTransport;
pub use messenger::{
    BinaryMessenger, Cancellable, MessengerConfig, MessengerError, ResponseHandle, Transport, TransportError,
};
pub use plugin::{Embedder, Plugin, PluginRegistrar, TextureRegistrar};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
