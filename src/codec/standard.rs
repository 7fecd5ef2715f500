//! Standard method codec
//!
//! Converts [`Value`] trees to and from [`WireValue`] trees and leaves the
//! byte layout to a [`WireFormat`] adapter ([`StandardWire`] by default).

use bytes::Bytes;

use super::error::{CodecError, Result};
use super::standard_wire::StandardWire;
use super::wire::{WireFormat, WireKind, WireMessage, WireValue};
use super::{MAX_NESTING_DEPTH, MethodCodec, MethodError, MethodResponse, Value};

/// Method codec backed by a tree-to-wire adapter.
#[derive(Debug, Clone, Default)]
pub struct StandardMethodCodec<W = StandardWire> {
    wire: W,
}

impl StandardMethodCodec {
    /// Create a codec using the standard byte layout
    #[must_use]
    pub const fn new() -> Self {
        Self { wire: StandardWire }
    }
}

impl<W: WireFormat> StandardMethodCodec<W> {
    /// Create a codec over a custom wire adapter
    pub const fn with_wire(wire: W) -> Self {
        Self { wire }
    }

    /// Access the wire adapter
    pub const fn wire(&self) -> &W {
        &self.wire
    }

    fn encode_message(&self, message: &WireMessage) -> Result<Bytes> {
        let bytes = self.wire.tree_encode(message)?;
        Ok(Bytes::from(bytes))
    }
}

impl<W: WireFormat> MethodCodec for StandardMethodCodec<W> {
    fn encode_method_call(&self, method: &str, args: &Value) -> Result<Bytes> {
        let message = WireMessage::MethodCall {
            method: copy_str(method, "method name")?,
            args: to_wire(args)?,
        };
        self.encode_message(&message)
    }

    fn decode_method_call(&self, message: &[u8]) -> Result<(String, Value)> {
        match self.wire.tree_decode(message, WireKind::MethodCall)? {
            WireMessage::MethodCall { method, args } => Ok((method, from_wire(args)?)),
            _ => Err(CodecError::Malformed(
                "wire adapter returned a response for a method call".into(),
            )),
        }
    }

    fn encode_success_envelope(&self, result: &Value) -> Result<Bytes> {
        self.encode_message(&WireMessage::Success(to_wire(result)?))
    }

    fn encode_error_envelope(&self, code: &str, message: &str, details: &Value) -> Result<Bytes> {
        self.encode_message(&WireMessage::Error {
            code: copy_str(code, "error code")?,
            message: Some(copy_str(message, "error message")?),
            details: to_wire(details)?,
        })
    }

    fn decode_response_envelope(&self, message: &[u8]) -> Result<MethodResponse> {
        match self.wire.tree_decode(message, WireKind::Response)? {
            WireMessage::Success(result) => Ok(MethodResponse::Success(from_wire(result)?)),
            WireMessage::Error {
                code,
                message,
                details,
            } => Ok(MethodResponse::Error(MethodError {
                code,
                message: message.unwrap_or_default(),
                details: from_wire(details)?,
            })),
            WireMessage::MethodCall { .. } => Err(CodecError::Malformed(
                "wire adapter returned a method call for a response".into(),
            )),
        }
    }
}

fn allocation(context: &'static str) -> impl FnOnce(std::collections::TryReserveError) -> CodecError {
    move |source| CodecError::Allocation { context, source }
}

fn copy_str(value: &str, context: &'static str) -> Result<String> {
    let mut out = String::new();
    out.try_reserve_exact(value.len()).map_err(allocation(context))?;
    out.push_str(value);
    Ok(out)
}

fn copy_slice<T: Copy>(values: &[T], context: &'static str) -> Result<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(values.len()).map_err(allocation(context))?;
    out.extend_from_slice(values);
    Ok(out)
}

/// Convert a value tree into the wire vocabulary.
///
/// Integers that fit in 32 bits are narrowed to `Int32`. Trees the decoder
/// would reject for depth are refused here as well.
pub(crate) fn to_wire(value: &Value) -> Result<WireValue> {
    to_wire_at(value, 0)
}

fn to_wire_at(value: &Value, depth: usize) -> Result<WireValue> {
    if matches!(value, Value::List(_) | Value::Map(_)) && depth >= MAX_NESTING_DEPTH {
        return Err(CodecError::NestingTooDeep {
            max: MAX_NESTING_DEPTH,
        });
    }
    let wire = match value {
        Value::Null => WireValue::Null,
        Value::Bool(true) => WireValue::True,
        Value::Bool(false) => WireValue::False,
        Value::Int(value) => match i32::try_from(*value) {
            Ok(narrow) => WireValue::Int32(narrow),
            Err(_) => WireValue::Int64(*value),
        },
        Value::Float(value) => WireValue::Float64(*value),
        Value::String(value) => WireValue::String(copy_str(value, "string")?),
        Value::Uint8List(values) => WireValue::Uint8Array(copy_slice(values, "uint8 list")?),
        Value::Int32List(values) => WireValue::Int32Array(copy_slice(values, "int32 list")?),
        Value::Int64List(values) => WireValue::Int64Array(copy_slice(values, "int64 list")?),
        Value::FloatList(values) => WireValue::Float64Array(copy_slice(values, "float list")?),
        Value::List(values) => {
            let mut out = Vec::new();
            out.try_reserve_exact(values.len()).map_err(allocation("list"))?;
            for child in values {
                out.push(to_wire_at(child, depth + 1)?);
            }
            WireValue::List(out)
        }
        Value::Map(entries) => {
            let mut out = Vec::new();
            out.try_reserve_exact(entries.len()).map_err(allocation("map"))?;
            for (key, child) in entries {
                out.push((to_wire_at(key, depth + 1)?, to_wire_at(child, depth + 1)?));
            }
            WireValue::Map(out)
        }
    };
    Ok(wire)
}

/// Convert a wire tree into a value tree, widening narrow encodings.
pub(crate) fn from_wire(wire: WireValue) -> Result<Value> {
    let value = match wire {
        WireValue::Null => Value::Null,
        WireValue::True => Value::Bool(true),
        WireValue::False => Value::Bool(false),
        WireValue::Int32(value) => Value::Int(i64::from(value)),
        WireValue::Int64(value) => Value::Int(value),
        WireValue::Float64(value) => Value::Float(value),
        WireValue::String(value) => Value::String(value),
        WireValue::Uint8Array(values) => Value::Uint8List(values),
        WireValue::Int32Array(values) => Value::Int32List(values),
        WireValue::Int64Array(values) => Value::Int64List(values),
        WireValue::Float32Array(values) => {
            let mut out = Vec::new();
            out.try_reserve_exact(values.len()).map_err(allocation("float32 list"))?;
            out.extend(values.into_iter().map(f64::from));
            Value::FloatList(out)
        }
        WireValue::Float64Array(values) => Value::FloatList(values),
        WireValue::List(values) => {
            let mut out = Vec::new();
            out.try_reserve_exact(values.len()).map_err(allocation("list"))?;
            for child in values {
                out.push(from_wire(child)?);
            }
            Value::List(out)
        }
        WireValue::Map(entries) => {
            let mut out = Vec::new();
            out.try_reserve_exact(entries.len()).map_err(allocation("map"))?;
            for (key, child) in entries {
                out.push((from_wire(key)?, from_wire(child)?));
            }
            Value::Map(out)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireError;

    fn echo_args() -> Value {
        [("value", Value::Int(42))].into_iter().collect()
    }

    #[test]
    fn test_method_call_roundtrip() {
        let codec = StandardMethodCodec::new();
        let bytes = codec.encode_method_call("echo", &echo_args()).unwrap();
        let (method, args) = codec.decode_method_call(&bytes).unwrap();
        assert_eq!(method, "echo");
        assert_eq!(args, echo_args());
    }

    #[test]
    fn test_success_roundtrip() {
        let codec = StandardMethodCodec::new();
        let bytes = codec.encode_success_envelope(&echo_args()).unwrap();
        assert_eq!(
            codec.decode_response(&bytes).unwrap(),
            MethodResponse::Success(echo_args())
        );
    }

    #[test]
    fn test_error_roundtrip() {
        let codec = StandardMethodCodec::new();
        let details = Value::List(vec![Value::from("trace"), Value::Int(1)]);
        let bytes = codec
            .encode_error_envelope("E_IO", "disk on fire", &details)
            .unwrap();
        assert_eq!(
            codec.decode_response(&bytes).unwrap(),
            MethodResponse::error("E_IO", "disk on fire", details)
        );
    }

    #[test]
    fn test_empty_reply_is_not_implemented() {
        let codec = StandardMethodCodec::new();
        assert_eq!(
            codec.decode_response(&[]).unwrap(),
            MethodResponse::NotImplemented
        );
        assert!(codec.encode_response(&MethodResponse::NotImplemented).unwrap().is_empty());
    }

    #[test]
    fn test_integer_narrowing_and_widening() {
        let small = to_wire(&Value::Int(-5)).unwrap();
        assert_eq!(small, WireValue::Int32(-5));
        let large = to_wire(&Value::Int(i64::from(i32::MAX) + 1)).unwrap();
        assert_eq!(large, WireValue::Int64(i64::from(i32::MAX) + 1));
        assert_eq!(from_wire(WireValue::Int32(-5)).unwrap(), Value::Int(-5));
    }

    #[test]
    fn test_float32_list_widens() {
        let value = from_wire(WireValue::Float32Array(vec![0.5, 2.0])).unwrap();
        assert_eq!(value, Value::FloatList(vec![0.5, 2.0]));
    }

    #[test]
    fn test_error_with_null_message_decodes_to_empty() {
        let codec = StandardMethodCodec::new();
        let bytes = StandardWire
            .tree_encode(&WireMessage::Error {
                code: "E".into(),
                message: None,
                details: WireValue::Null,
            })
            .unwrap();
        assert_eq!(
            codec.decode_response(&bytes).unwrap(),
            MethodResponse::Error(MethodError::new("E", ""))
        );
    }

    #[test]
    fn test_malformed_call_is_rejected() {
        let codec = StandardMethodCodec::new();
        let err = codec.decode_method_call(&[0x42]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Wire(WireError::ExpectedString { .. })
        ));
    }

    /// Adapter that always fails, used to check error propagation.
    struct BrokenWire;

    impl WireFormat for BrokenWire {
        fn tree_encode(&self, _message: &WireMessage) -> std::result::Result<Vec<u8>, WireError> {
            Err(WireError::TooLarge { size: 1, max: 0 })
        }

        fn tree_decode(&self, _bytes: &[u8], _kind: WireKind) -> std::result::Result<WireMessage, WireError> {
            Ok(WireMessage::Success(WireValue::Null))
        }
    }

    fn nested_list(depth: usize) -> Value {
        (0..depth).fold(Value::Null, |inner, _| Value::List(vec![inner]))
    }

    #[test]
    fn test_nesting_limit_matches_decoder() {
        let codec = StandardMethodCodec::new();

        let deepest = nested_list(MAX_NESTING_DEPTH);
        let encoded = codec.encode_method_call("deep", &deepest).unwrap();
        let (method, args) = codec.decode_method_call(&encoded).unwrap();
        assert_eq!(method, "deep");
        assert_eq!(args, deepest);

        let too_deep = nested_list(MAX_NESTING_DEPTH + 1);
        assert!(matches!(
            codec.encode_method_call("deep", &too_deep),
            Err(CodecError::NestingTooDeep { max: MAX_NESTING_DEPTH })
        ));
        assert!(matches!(
            codec.encode_success_envelope(&too_deep),
            Err(CodecError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_custom_wire_errors_propagate() {
        let codec = StandardMethodCodec::with_wire(BrokenWire);
        assert!(matches!(
            codec.encode_success_envelope(&Value::Null),
            Err(CodecError::Wire(WireError::TooLarge { .. }))
        ));
        // a response where a call was expected is malformed
        assert!(matches!(
            codec.decode_method_call(&[1]),
            Err(CodecError::Malformed(_))
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn value_strategy() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::Int),
                (-1.0e9f64..1.0e9).prop_map(Value::Float),
                "[ -~]{0,16}".prop_map(Value::String),
                prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Uint8List),
                prop::collection::vec(any::<i32>(), 0..8).prop_map(Value::Int32List),
                prop::collection::vec(any::<i64>(), 0..8).prop_map(Value::Int64List),
                prop::collection::vec(-1.0e9f64..1.0e9, 0..8).prop_map(Value::FloatList),
            ];
            leaf.prop_recursive(4, 48, 6, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
                    prop::collection::vec((inner.clone(), inner), 0..6).prop_map(Value::Map),
                ]
            })
        }

        proptest! {
            /// Property: decode_call(encode_call(m, v)) == (m, v)
            #[test]
            fn prop_call_roundtrip(method in "[a-z/._]{1,20}", args in value_strategy()) {
                let codec = StandardMethodCodec::new();
                let bytes = codec.encode_method_call(&method, &args).unwrap();
                let (decoded_method, decoded_args) = codec.decode_method_call(&bytes).unwrap();
                prop_assert_eq!(decoded_method, method);
                prop_assert_eq!(decoded_args, args);
            }

            /// Property: success envelopes decode to the encoded value
            #[test]
            fn prop_success_roundtrip(result in value_strategy()) {
                let codec = StandardMethodCodec::new();
                let bytes = codec.encode_success_envelope(&result).unwrap();
                prop_assert_eq!(codec.decode_response(&bytes).unwrap(), MethodResponse::Success(result));
            }

            /// Property: error envelopes decode to the encoded triple
            #[test]
            fn prop_error_roundtrip(code in "[A-Z_]{1,12}", message in "[ -~]{0,24}", details in value_strategy()) {
                let codec = StandardMethodCodec::new();
                let bytes = codec.encode_error_envelope(&code, &message, &details).unwrap();
                prop_assert_eq!(
                    codec.decode_response(&bytes).unwrap(),
                    MethodResponse::error(code, message, details)
                );
            }
        }
    }
}
