//! Codec error types

use std::collections::TryReserveError;

use thiserror::Error;

use super::value::ValueType;

/// Errors raised by a [`MethodCodec`](super::MethodCodec)
#[derive(Error, Debug)]
pub enum CodecError {
    /// Storage for a converted tree could not be reserved
    #[error("allocation failed while converting {context}")]
    Allocation {
        /// Which part of the tree was being converted
        context: &'static str,
        /// Underlying reservation failure
        #[source]
        source: TryReserveError,
    },

    /// The wire adapter rejected the tree or the bytes
    #[error("wire format error: {0}")]
    Wire(#[from] WireError),

    /// Decoded message does not have the shape the codec expects
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Value tree nests containers deeper than the decoder accepts
    #[error("value nests deeper than {max} levels")]
    NestingTooDeep {
        /// Maximum accepted depth
        max: usize,
    },
}

/// Errors raised by a [`WireFormat`](super::WireFormat) adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Input ended before a complete value was read
    #[error("unexpected end of input: need {needed} bytes at offset {offset}, have {available}")]
    UnexpectedEnd {
        /// Bytes required by the next read
        needed: usize,
        /// Offset of the read
        offset: usize,
        /// Bytes remaining at that offset
        available: usize,
    },

    /// Unknown value type tag
    #[error("unknown value type {tag:#x} at offset {offset}")]
    UnknownType {
        /// Tag byte
        tag: u8,
        /// Offset of the tag
        offset: usize,
    },

    /// String payload is not valid UTF-8
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string payload
        offset: usize,
    },

    /// A string was required but another value was found
    #[error("expected string for {field}, found type {tag:#x}")]
    ExpectedString {
        /// Which field required a string
        field: &'static str,
        /// Tag that was found instead
        tag: u8,
    },

    /// Unknown response envelope discriminator
    #[error("invalid envelope tag {tag:#x}")]
    InvalidEnvelope {
        /// Envelope tag byte
        tag: u8,
    },

    /// Bytes left over after a complete message
    #[error("{remaining} trailing bytes after message")]
    TrailingBytes {
        /// Number of unread bytes
        remaining: usize,
    },

    /// Containers nested deeper than the decoder accepts
    #[error("nesting deeper than {max} levels")]
    NestingTooDeep {
        /// Maximum accepted depth
        max: usize,
    },

    /// Collection too large to be size-prefixed
    #[error("collection of {size} elements exceeds wire limit {max}")]
    TooLarge {
        /// Element count
        size: usize,
        /// Largest encodable count
        max: usize,
    },

    /// Tree shape does not match the message kind
    #[error("message kind mismatch: {0}")]
    KindMismatch(&'static str),
}

/// Errors raised while building a [`Value`](super::Value)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueError {
    /// Operation applied to the wrong variant
    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        /// Variant the operation requires
        expected: ValueType,
        /// Variant it was applied to
        found: ValueType,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CodecError>;
