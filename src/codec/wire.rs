//! Intermediate tree handed to wire-format adapters
//!
//! [`StandardMethodCodec`](super::StandardMethodCodec) never touches bytes
//! itself: it converts [`Value`](super::Value) trees into [`WireValue`]
//! trees and lets a [`WireFormat`] produce or consume the actual bytes.

use super::error::WireError;

/// Value tree in the vocabulary of the wire format.
///
/// Unlike [`Value`](super::Value) this keeps the narrower encodings the wire
/// can carry (`Int32`, `Float32Array`) so adapters can round-trip exactly
/// what they read.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Null
    Null,
    /// Boolean true
    True,
    /// Boolean false
    False,
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
    /// 64-bit float
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// Byte buffer
    Uint8Array(Vec<u8>),
    /// Packed 32-bit integers
    Int32Array(Vec<i32>),
    /// Packed 64-bit integers
    Int64Array(Vec<i64>),
    /// Packed 32-bit floats
    Float32Array(Vec<f32>),
    /// Packed 64-bit floats
    Float64Array(Vec<f64>),
    /// Ordered children
    List(Vec<WireValue>),
    /// Ordered key/value pairs
    Map(Vec<(WireValue, WireValue)>),
}

/// A complete message in wire-tree form.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// Method invocation
    MethodCall {
        /// Method name
        method: String,
        /// Arguments
        args: WireValue,
    },
    /// Successful response envelope
    Success(WireValue),
    /// Error response envelope
    Error {
        /// Error code
        code: String,
        /// Human readable message, absent on the wire when null
        message: Option<String>,
        /// Structured details
        details: WireValue,
    },
}

/// Which message shape the decoder should expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    /// Method call (name + args)
    MethodCall,
    /// Response envelope (success or error)
    Response,
}

/// Tree-to-wire adapter: the byte-level half of a codec.
pub trait WireFormat {
    /// Serialize a message tree to bytes.
    fn tree_encode(&self, message: &WireMessage) -> Result<Vec<u8>, WireError>;

    /// Parse bytes into a message tree of the given kind.
    fn tree_decode(&self, bytes: &[u8], kind: WireKind) -> Result<WireMessage, WireError>;
}
