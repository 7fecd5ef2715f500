//! Message codecs
//!
//! A [`MethodCodec`] turns method calls and response envelopes into bytes
//! and back. [`StandardMethodCodec`] does this in two steps: the [`Value`]
//! tree is converted into a [`WireValue`] tree, and a [`WireFormat`]
//! adapter serializes that tree. [`StandardWire`] is the default adapter.

pub mod error;
#[cfg(feature = "json")]
pub mod json;
pub mod method_codec;
pub mod response;
pub mod standard;
pub mod standard_wire;
pub mod value;
pub mod wire;

pub use error::{CodecError, Result, ValueError, WireError};
#[cfg(feature = "json")]
pub use json::JsonMethodCodec;
pub use method_codec::MethodCodec;
pub use response::{MethodError, MethodResponse};
pub use standard::StandardMethodCodec;
pub use standard_wire::StandardWire;
pub use value::{Value, ValueType};
pub use wire::{WireFormat, WireKind, WireMessage, WireValue};

/// Maximum container nesting accepted when decoding
pub const MAX_NESTING_DEPTH: usize = 128;
